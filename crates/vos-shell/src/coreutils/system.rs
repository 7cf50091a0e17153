// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use vos_kernel::ErrorKind;
use vos_kernel::layout::UPTIME_PATH;

use crate::command::{Command, CommandOutcome, ExecContext, Invocation};

/// `cd [DIR]`, home when no directory is given
pub struct Cd;

impl Command for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let target = match inv.operands().next() {
            Some(dir) => ctx.expand_home(dir),
            None => ctx.kernel().getenv("HOME").unwrap_or_else(|| "/".to_string()),
        };
        match ctx.kernel_mut().change_directory(&target) {
            Ok(_) => CommandOutcome::empty(),
            Err(err) => CommandOutcome::from_error("cd", &target, &err),
        }
    }
}

pub struct Pwd;

impl Command for Pwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, _inv: &Invocation) -> CommandOutcome {
        match ctx.kernel().cwd_path() {
            Ok(path) => CommandOutcome::ok(path),
            Err(err) => CommandOutcome::from_error("pwd", "", &err),
        }
    }
}

/// `export [NAME=VALUE]...`; without arguments lists the environment.
pub struct Export;

impl Command for Export {
    fn name(&self) -> &'static str {
        "export"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        if inv.argv.is_empty() {
            let listing: Vec<String> = ctx
                .kernel()
                .session()
                .map(|s| s.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect())
                .unwrap_or_default();
            return CommandOutcome::ok(listing.join("\n"));
        }
        for assignment in &inv.argv {
            let Some((name, value)) = assignment.split_once('=').filter(|(n, _)| !n.is_empty())
            else {
                return CommandOutcome::fail(
                    ErrorKind::InvalidArgument,
                    format!("export: '{}': not a valid identifier", assignment),
                );
            };
            if let Err(err) = ctx.kernel_mut().setenv(name, value) {
                return CommandOutcome::from_error("export", name, &err);
            }
        }
        CommandOutcome::empty()
    }
}

/// `hostname [NAME]`; setting goes through `/etc/hostname` permissions.
pub struct Hostname;

impl Command for Hostname {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let Some(name) = inv.operands().next() else {
            return CommandOutcome::ok(ctx.kernel().hostname());
        };
        match ctx.with_actor(|kernel, actor| kernel.set_hostname(actor, name)) {
            Ok(()) => CommandOutcome::empty(),
            Err(err) => CommandOutcome::from_error("hostname", name, &err),
        }
    }
}

/// `uname [-a|-n|-r|-m]`
pub struct Uname;

const KERNEL_NAME: &str = "VOS";
const MACHINE: &str = "x86_64";

impl Command for Uname {
    fn name(&self) -> &'static str {
        "uname"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let hostname = ctx.kernel().hostname().to_string();
        let release = env!("CARGO_PKG_VERSION");
        if inv.has_flag('a') {
            return CommandOutcome::ok(format!(
                "{} {} {} {}",
                KERNEL_NAME, hostname, release, MACHINE
            ));
        }
        let mut fields = Vec::new();
        if inv.has_flag('s') || inv.argv.is_empty() {
            fields.push(KERNEL_NAME.to_string());
        }
        if inv.has_flag('n') {
            fields.push(hostname);
        }
        if inv.has_flag('r') {
            fields.push(release.to_string());
        }
        if inv.has_flag('m') {
            fields.push(MACHINE.to_string());
        }
        CommandOutcome::ok(fields.join(" "))
    }
}

/// `uptime`, from the procfs uptime file
pub struct Uptime;

impl Command for Uptime {
    fn name(&self) -> &'static str {
        "uptime"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, _inv: &Invocation) -> CommandOutcome {
        let text = match ctx.with_actor(|kernel, actor| kernel.read_to_string(actor, UPTIME_PATH))
        {
            Ok(text) => text,
            Err(err) => return CommandOutcome::from_error("uptime", "", &err),
        };
        let secs = text
            .split_whitespace()
            .next()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or_default() as u64;
        CommandOutcome::ok(format!(
            "up {:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        ))
    }
}
