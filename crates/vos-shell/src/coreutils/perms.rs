// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::command::{Command, CommandOutcome, ExecContext, Invocation};

use super::Report;

/// `chmod MODE FILE...`, octal (`750`) or symbolic (`u+x,o-r`)
pub struct Chmod;

impl Command for Chmod {
    fn name(&self) -> &'static str {
        "chmod"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        // Symbolic modes like `-w` look like flags, so take argv verbatim.
        let Some((mode, files)) = inv.argv.split_first().filter(|(_, f)| !f.is_empty()) else {
            return CommandOutcome::usage("chmod", "MODE FILE...");
        };
        let mut report = Report::default();
        for file in files {
            if let Err(err) = ctx.with_actor(|kernel, actor| kernel.chmod(actor, file, mode)) {
                report.fail("chmod", file, &err);
            }
        }
        report.finish()
    }
}

/// `chown OWNER[:GROUP] FILE...`; `:GROUP` alone changes only the group.
pub struct Chown;

fn split_owner(spec: &str) -> (Option<&str>, Option<&str>) {
    let (user, group) = match spec.split_once(':') {
        Some((user, group)) => (user, Some(group)),
        None => (spec, None),
    };
    (
        Some(user).filter(|u| !u.is_empty()),
        group.filter(|g| !g.is_empty()),
    )
}

impl Command for Chown {
    fn name(&self) -> &'static str {
        "chown"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let operands: Vec<&str> = inv.operands().collect();
        let Some((spec, files)) = operands.split_first().filter(|(_, f)| !f.is_empty()) else {
            return CommandOutcome::usage("chown", "OWNER[:GROUP] FILE...");
        };
        let (user, group) = split_owner(spec);
        let mut report = Report::default();
        for file in files {
            if let Err(err) = ctx.with_actor(|kernel, actor| kernel.chown(actor, file, user, group))
            {
                report.fail("chown", file, &err);
            }
        }
        report.finish()
    }
}
