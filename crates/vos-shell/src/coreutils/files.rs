// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use vos_kernel::{Actor, Kernel, KernelError, KernelResult, NewNode, Stat};

use crate::command::{Command, CommandOutcome, ExecContext, Invocation};

use super::{Report, group_name, join_path, user_name};

fn file_operands(inv: &Invocation) -> Vec<String> {
    inv.operands().map(str::to_string).collect()
}

/// `cat [FILE]...`; with only piped input, passes it through.
pub struct Cat;

impl Command for Cat {
    fn name(&self) -> &'static str {
        "cat"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        if inv.own_args().is_empty() {
            if inv.piped == 0 {
                return CommandOutcome::usage("cat", "FILE...");
            }
            return CommandOutcome::ok(inv.piped_args().join(" "));
        }
        let mut text = String::new();
        let mut report = Report::default();
        for file in inv.own_args() {
            match ctx.with_actor(|kernel, actor| kernel.read_to_string(actor, file)) {
                Ok(content) => text.push_str(&content),
                Err(err) => report.fail("cat", file, &err),
            }
        }
        if report.error.is_some() {
            return report.finish();
        }
        CommandOutcome::ok(text)
    }
}

/// `touch FILE...`
pub struct Touch;

impl Command for Touch {
    fn name(&self) -> &'static str {
        "touch"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let files = file_operands(inv);
        if files.is_empty() {
            return CommandOutcome::usage("touch", "FILE...");
        }
        let mut report = Report::default();
        for file in &files {
            if let Err(err) = ctx.with_actor(|kernel, actor| kernel.touch(actor, file)) {
                report.fail("touch", file, &err);
            }
        }
        report.finish()
    }
}

/// `mkdir [-p] DIR...`
pub struct Mkdir;

fn make_parents(kernel: &mut Kernel, actor: Actor<'_>, path: &str) -> KernelResult<()> {
    let absolute = path.starts_with('/');
    let mut prefix = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        prefix = if prefix.is_empty() && !absolute {
            part.to_string()
        } else {
            format!("{}/{}", prefix, part)
        };
        match kernel.stat(actor, &prefix) {
            Ok(stat) if stat.is_dir => continue,
            Ok(_) => return Err(KernelError::IsFile),
            Err(KernelError::PathNotFound) => {
                kernel.create(actor, &prefix, NewNode::Directory, None)?;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

impl Command for Mkdir {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let dirs = file_operands(inv);
        if dirs.is_empty() {
            return CommandOutcome::usage("mkdir", "[-p] DIRECTORY...");
        }
        let parents = inv.has_flag('p');
        let mut report = Report::default();
        for dir in &dirs {
            let result = ctx.with_actor(|kernel, actor| {
                if parents {
                    make_parents(kernel, actor, dir)
                } else {
                    kernel.create(actor, dir, NewNode::Directory, None).map(|_| ())
                }
            });
            if let Err(err) = result {
                report.fail("mkdir", dir, &err);
            }
        }
        report.finish()
    }
}

/// Delete `path` and, for directories, everything below it first.
fn remove_tree(kernel: &mut Kernel, actor: Actor<'_>, path: &str) -> KernelResult<()> {
    if kernel.stat(actor, path)?.is_dir {
        for entry in kernel.readdir(actor, path)? {
            remove_tree(kernel, actor, &join_path(path, &entry.name))?;
        }
    }
    kernel.delete(actor, path)
}

/// `rm [-rf] FILE...`
pub struct Rm;

impl Command for Rm {
    fn name(&self) -> &'static str {
        "rm"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let files = file_operands(inv);
        let force = inv.has_flag('f');
        if files.is_empty() && !force {
            return CommandOutcome::usage("rm", "[-rf] FILE...");
        }
        let recursive = inv.has_flag('r') || inv.has_flag('R');
        let mut report = Report::default();
        for file in &files {
            let result = ctx.with_actor(|kernel, actor| {
                if kernel.stat(actor, file)?.is_dir {
                    if !recursive {
                        return Err(KernelError::IsDirectory);
                    }
                    return remove_tree(kernel, actor, file);
                }
                kernel.delete(actor, file)
            });
            match result {
                Err(KernelError::PathNotFound) if force => {}
                Err(err) => report.fail("rm", file, &err),
                Ok(()) => {}
            }
        }
        report.finish()
    }
}

/// `rmdir DIR...`, empty directories only
pub struct Rmdir;

impl Command for Rmdir {
    fn name(&self) -> &'static str {
        "rmdir"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let dirs = file_operands(inv);
        if dirs.is_empty() {
            return CommandOutcome::usage("rmdir", "DIRECTORY...");
        }
        let mut report = Report::default();
        for dir in &dirs {
            let result = ctx.with_actor(|kernel, actor| {
                if !kernel.stat(actor, dir)?.is_dir {
                    return Err(KernelError::IsFile);
                }
                kernel.delete(actor, dir)
            });
            if let Err(err) = result {
                report.fail("rmdir", dir, &err);
            }
        }
        report.finish()
    }
}

/// `mv SOURCE DEST`
pub struct Mv;

impl Command for Mv {
    fn name(&self) -> &'static str {
        "mv"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let [source, dest] = file_operands(inv).try_into().unwrap_or_default();
        if source.is_empty() || dest.is_empty() {
            return CommandOutcome::usage("mv", "SOURCE DEST");
        }
        match ctx.with_actor(|kernel, actor| kernel.rename(actor, &source, &dest)) {
            Ok(_) => CommandOutcome::empty(),
            Err(err) => CommandOutcome::from_error("mv", &source, &err),
        }
    }
}

fn long_line(kernel: &Kernel, stat: &Stat, label: &str) -> String {
    format!(
        "{} {} {} {} {} {} {}",
        stat.mode_string(),
        stat.nlink,
        user_name(kernel, stat.uid),
        group_name(kernel, stat.gid),
        stat.size,
        stat.times.mtime.format("%b %e %H:%M"),
        label
    )
}

/// `ls [-la] [PATH]...`
pub struct Ls;

impl Ls {
    fn list(&self, ctx: &mut ExecContext<'_>, inv: &Invocation, path: &str) -> KernelResult<String> {
        let long = inv.has_flag('l');
        let all = inv.has_flag('a');
        ctx.with_actor(|kernel, actor| {
            let stat = kernel.stat(actor, path)?;
            if !stat.is_dir {
                return Ok(if long {
                    long_line(kernel, &stat, path)
                } else {
                    path.to_string()
                });
            }
            let mut entries = kernel.readdir(actor, path)?;
            entries.retain(|e| all || !e.name.starts_with('.'));
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            let mut lines = Vec::with_capacity(entries.len());
            for entry in entries {
                let label = if entry.is_dir {
                    format!("{}/", entry.name)
                } else {
                    entry.name.clone()
                };
                if long {
                    let child = kernel.stat(actor, &join_path(path, &entry.name))?;
                    lines.push(long_line(kernel, &child, &label));
                } else {
                    lines.push(label);
                }
            }
            Ok(lines.join("\n"))
        })
    }
}

impl Command for Ls {
    fn name(&self) -> &'static str {
        "ls"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let mut paths = file_operands(inv);
        if paths.is_empty() {
            paths.push(".".to_string());
        }
        let headed = paths.len() > 1;
        let mut report = Report::default();
        for path in &paths {
            match self.list(ctx, inv, path) {
                Ok(text) if headed => report.line(format!("{}:\n{}", path, text)),
                Ok(text) => report.line(text),
                Err(err) => report.fail("ls", path, &err),
            }
        }
        report.finish()
    }
}

/// `stat FILE...`
pub struct StatCmd;

impl Command for StatCmd {
    fn name(&self) -> &'static str {
        "stat"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let files = file_operands(inv);
        if files.is_empty() {
            return CommandOutcome::usage("stat", "FILE...");
        }
        let mut report = Report::default();
        for file in &files {
            match ctx.with_actor(|kernel, actor| kernel.stat(actor, file)) {
                Ok(stat) => {
                    let kernel = ctx.kernel();
                    report.line(format!(
                        "  File: {}\n  Size: {}\tInode: {}\tLinks: {}\t{}\n\
                         Access: ({:04o}/{})  Uid: ({}/{})  Gid: ({}/{})\n\
                         Access: {}\nModify: {}\nChange: {}\n Birth: {}",
                        file,
                        stat.size,
                        stat.ino,
                        stat.nlink,
                        if stat.is_dir { "directory" } else { "regular file" },
                        stat.perms.to_mode(),
                        stat.mode_string(),
                        stat.uid,
                        user_name(kernel, stat.uid),
                        stat.gid,
                        group_name(kernel, stat.gid),
                        stat.times.atime,
                        stat.times.mtime,
                        stat.times.ctime,
                        stat.times.crtime,
                    ));
                }
                Err(err) => report.fail("stat", file, &err),
            }
        }
        report.finish()
    }
}
