// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The read-execute loop.
//!
//! A line is split on `&&` and every part runs, whatever happened to the
//! parts before it. Within a part, stages run left to right; the first
//! failing stage abandons the rest of that part.

use anyhow::Context;
use std::io::{BufRead, Write};
use tracing::debug;
use vos_kernel::{Actor, ErrorKind, Kernel, KernelError};

use crate::alias::AliasTable;
use crate::command::{CommandOutcome, CommandRegistry, ExecContext, Invocation};
use crate::pipeline::{Arg, Link, flatten, parse_pipeline, tokenize, unquote};

pub struct Shell<W: Write> {
    aliases: AliasTable,
    registry: CommandRegistry,
    out: W,
}

impl<W: Write> Shell<W> {
    /// Shell with the reference coreutils, printing to `out`.
    pub fn new(out: W) -> Self {
        Self::with_registry(CommandRegistry::with_coreutils(), out)
    }

    pub fn with_registry(registry: CommandRegistry, out: W) -> Self {
        Self {
            aliases: AliasTable::new(),
            registry,
            out,
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// `user@host:cwd$ `, with `#` for root and `~` for the home directory.
    pub fn prompt(&self, kernel: &Kernel) -> String {
        let euid = kernel.session_credentials().map(|c| c.euid).ok();
        let user = euid
            .and_then(|uid| kernel.users().user(uid))
            .map(|u| u.username.clone())
            .unwrap_or_else(|| "?".to_string());
        let cwd = kernel.cwd_path().unwrap_or_else(|_| "/".to_string());
        let shown = match kernel.getenv("HOME") {
            Some(home) if cwd == home => "~".to_string(),
            Some(home) if cwd.starts_with(&format!("{}/", home)) => {
                format!("~{}", &cwd[home.len()..])
            }
            _ => cwd,
        };
        let sigil = if euid == Some(0) { '#' } else { '$' };
        format!("{}@{}:{}{} ", user, kernel.hostname(), shown, sigil)
    }

    /// Run every line of `input` until it ends or the last session exits.
    pub async fn run_script(&mut self, kernel: &mut Kernel, input: impl BufRead) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line.context("failed to read shell input")?;
            if kernel.sessions().is_empty() {
                debug!("no session left, stopping script");
                break;
            }
            self.execute_line(kernel, &line).await?;
        }
        Ok(())
    }

    /// Execute `~/.shellrc` if the session can read it.
    pub async fn source_rc(&mut self, kernel: &mut Kernel) -> anyhow::Result<()> {
        let Some(home) = kernel.getenv("HOME") else {
            return Ok(());
        };
        let path = format!("{}/.shellrc", home.trim_end_matches('/'));
        let rc = ExecContext::new(kernel).with_actor(|k, a| k.read_to_string(a, &path));
        let text = match rc {
            Ok(text) => text,
            Err(err) => {
                debug!(%path, %err, "no shell rc");
                return Ok(());
            }
        };
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.execute_line(kernel, line).await?;
        }
        Ok(())
    }

    pub async fn execute_line(&mut self, kernel: &mut Kernel, line: &str) -> anyhow::Result<()> {
        for part in line.split("&&") {
            self.execute_command(kernel, part).await?;
        }
        Ok(())
    }

    async fn execute_command(&mut self, kernel: &mut Kernel, text: &str) -> anyhow::Result<()> {
        let tokens = tokenize(text, kernel.getenv("HOME").as_deref());
        if tokens.is_empty() {
            return Ok(());
        }
        let stages = match parse_pipeline(&tokens) {
            Ok(stages) => stages,
            Err(err) => {
                writeln!(self.out, "shell: {}", err)?;
                return Ok(());
            }
        };

        let mut carried: Option<Vec<String>> = None;
        for stage in stages {
            let pipe = stage.pipes();
            let mut words = stage.argv.into_iter();
            let Some(name) = words.next() else {
                continue;
            };
            let mut args: Vec<Arg> = words.map(Arg::Word).collect();
            let piped = carried.as_ref().map_or(0, Vec::len);
            if let Some(list) = carried.take() {
                args.push(Arg::List(list));
            }

            let outcome = self.dispatch(kernel, &name, flatten(args), piped, pipe).await;
            if !pipe || !outcome.success {
                self.emit(&outcome)?;
            }
            if !outcome.success {
                debug!(command = %name, error = ?outcome.error, "stage failed, abandoning command");
                break;
            }

            match stage.link {
                Link::End => {}
                Link::Pipe => {
                    carried = Some(
                        outcome
                            .data
                            .as_deref()
                            .unwrap_or_default()
                            .split_whitespace()
                            .map(str::to_string)
                            .collect(),
                    );
                }
                Link::Redirect { target, append } => {
                    if !self.redirect(kernel, &target, append, outcome.data.as_deref())? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// builtin, alias, `./program`, registered command, then `$PATH`.
    async fn dispatch(
        &mut self,
        kernel: &mut Kernel,
        name: &str,
        args: Vec<String>,
        piped: usize,
        pipe: bool,
    ) -> CommandOutcome {
        debug!(command = name, piped, pipe, "dispatch");
        match name {
            "alias" => return self.aliases.alias_builtin(&args),
            "unalias" => return self.aliases.unalias_builtin(&args),
            _ => {}
        }

        let (name, argv) = self.aliases.expand(name, args);
        let inv = Invocation { argv, piped, pipe };

        if name.starts_with("./") || name.starts_with('/') {
            return run_program(kernel, &name, &name, inv).await;
        }
        if let Some(command) = self.registry.get(&name) {
            return command.run(&mut ExecContext::new(kernel), &inv);
        }
        match search_path(kernel, &name) {
            Some(path) => run_program(kernel, &path, &name, inv).await,
            None => CommandOutcome::fail(
                ErrorKind::PathNotFound,
                format!("{}: command not found", name),
            ),
        }
    }

    /// Send a stage's result to `target`. Returns false when the rest of
    /// the command should be abandoned.
    fn redirect(
        &mut self,
        kernel: &mut Kernel,
        target: &str,
        append: bool,
        data: Option<&str>,
    ) -> anyhow::Result<bool> {
        let existing = ExecContext::new(kernel).with_actor(|k, a| k.stat(a, target));
        match existing {
            Ok(stat) if stat.is_dir => {
                writeln!(self.out, "shell: {}: Is a directory", target)?;
                return Ok(false);
            }
            Ok(_) => {}
            Err(KernelError::PathNotFound) => {
                let parent = parent_of(target);
                if ExecContext::new(kernel)
                    .with_actor(|k, a| k.stat(a, parent))
                    .is_err()
                {
                    writeln!(self.out, "shell: no such file or directory: {}", target)?;
                    return Ok(false);
                }
                if !self.create_target(kernel, target) {
                    writeln!(self.out, "shell: unable to create file: {}", target)?;
                    return Ok(false);
                }
            }
            Err(err) => {
                writeln!(self.out, "shell: {}: {}", target, err.kind())?;
                return Ok(false);
            }
        }

        let payload = unquote(data.unwrap_or_default().trim());
        let written = ExecContext::new(kernel).with_actor(|k, a| {
            if append {
                k.append(a, target, payload.as_bytes())
            } else {
                k.write(a, target, payload.as_bytes())
            }
        });
        if let Err(err) = written {
            writeln!(self.out, "shell: {}: {}", target, err.kind())?;
            return Ok(false);
        }
        debug!(target, append, bytes = payload.len(), "redirected output");
        Ok(true)
    }

    /// Create a redirect target through the `touch` command so the usual
    /// permission checks apply.
    fn create_target(&self, kernel: &mut Kernel, target: &str) -> bool {
        let mut ctx = ExecContext::new(kernel);
        match self.registry.get("touch") {
            Some(touch) => {
                let inv = Invocation {
                    argv: vec![target.to_string()],
                    piped: 0,
                    pipe: true,
                };
                touch.run(&mut ctx, &inv).success
            }
            None => ctx.with_actor(|k, a| k.touch(a, target)).is_ok(),
        }
    }

    fn emit(&mut self, outcome: &CommandOutcome) -> std::io::Result<()> {
        if let Some(text) = outcome.data.as_deref() {
            let text = text.trim_end_matches('\n');
            if !text.is_empty() {
                writeln!(self.out, "{}", text)?;
            }
        }
        Ok(())
    }
}

fn parent_of(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => ".",
    }
}

/// First `$PATH` entry holding a file called `name`.
fn search_path(kernel: &Kernel, name: &str) -> Option<String> {
    let session = kernel.session().ok()?;
    session
        .search_path()
        .into_iter()
        .map(|dir| format!("{}/{}", dir.trim_end_matches('/'), name))
        .find(|candidate| {
            kernel
                .vfs()
                .find(candidate)
                .and_then(|node| kernel.vfs().node(node))
                .is_ok_and(|inode| inode.is_file())
        })
}

/// Load `path` as a child of the session's shell process and wait for it.
async fn run_program(
    kernel: &mut Kernel,
    path: &str,
    name: &str,
    inv: Invocation,
) -> CommandOutcome {
    let argv: Vec<String> = std::iter::once(name.to_string()).chain(inv.argv).collect();
    let request = kernel.session_credentials().and_then(|creds| {
        let session = kernel.session()?;
        kernel.prepare_exec(
            Actor::new(&creds, session.cwd),
            path,
            argv,
            session.env.clone(),
            session.pid,
        )
    });
    let request = match request {
        Ok(request) => request,
        Err(err) => return CommandOutcome::from_error("shell", name, &err),
    };
    match kernel.execve(request).await {
        Ok(outcome) => {
            debug!(pid = outcome.pid.0, exit_code = outcome.exit_code, "program finished");
            if outcome.success() {
                CommandOutcome::ok(outcome.output)
            } else {
                CommandOutcome {
                    success: false,
                    error: Some(ErrorKind::Generic),
                    data: (!outcome.output.is_empty()).then_some(outcome.output),
                }
            }
        }
        Err(err) => CommandOutcome::from_error("shell", name, &err),
    }
}
