// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Identity and session commands.

use vos_kernel::{Access, ErrorKind, KernelError};

use crate::command::{Command, CommandOutcome, ExecContext, Invocation};

use super::{group_name, user_name};

/// `whoami`: the effective user
pub struct Whoami;

impl Command for Whoami {
    fn name(&self) -> &'static str {
        "whoami"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, _inv: &Invocation) -> CommandOutcome {
        match ctx.credentials() {
            Ok(creds) => CommandOutcome::ok(user_name(ctx.kernel(), creds.euid)),
            Err(err) => CommandOutcome::from_error("whoami", "", &err),
        }
    }
}

/// `id [USER]`
pub struct Id;

impl Command for Id {
    fn name(&self) -> &'static str {
        "id"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let kernel = ctx.kernel();
        let (uid, gid, groups) = match inv.operands().next() {
            Some(name) => match kernel.users().user_by_name(name) {
                Some(user) => (user.uid, user.gid, user.all_groups()),
                None => {
                    return CommandOutcome::fail(
                        ErrorKind::InvalidArgument,
                        format!("id: '{}': no such user", name),
                    );
                }
            },
            None => match kernel.session_credentials() {
                Ok(creds) => (creds.euid, creds.egid, creds.groups.clone()),
                Err(err) => return CommandOutcome::from_error("id", "", &err),
            },
        };
        let groups: Vec<String> = groups
            .iter()
            .map(|gid| format!("{}({})", gid, group_name(kernel, *gid)))
            .collect();
        CommandOutcome::ok(format!(
            "uid={}({}) gid={}({}) groups={}",
            uid,
            user_name(kernel, uid),
            gid,
            group_name(kernel, gid),
            groups.join(",")
        ))
    }
}

/// `su [USER] [PASSWORD]`: open a nested session, root by default
pub struct Su;

impl Command for Su {
    fn name(&self) -> &'static str {
        "su"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let mut operands = inv.operands();
        let user = operands.next().unwrap_or("root");
        let password = operands.next();
        match ctx.kernel_mut().su(user, password) {
            Ok(_) => CommandOutcome::empty(),
            Err(KernelError::AuthenticationFailed) => CommandOutcome::fail(
                ErrorKind::PermissionDenied(Access::Execute),
                "su: Authentication failure",
            ),
            Err(err) => CommandOutcome::from_error("su", user, &err),
        }
    }
}

/// `exit`: close the current session
pub struct Exit;

impl Command for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, _inv: &Invocation) -> CommandOutcome {
        match ctx.kernel_mut().exit() {
            Ok(_) => CommandOutcome::empty(),
            Err(err) => CommandOutcome::from_error("exit", "", &err),
        }
    }
}

fn require_root(ctx: &ExecContext<'_>, name: &str) -> Option<CommandOutcome> {
    match ctx.credentials() {
        Ok(creds) if creds.is_privileged() => None,
        Ok(_) => Some(CommandOutcome::fail(
            ErrorKind::PermissionDenied(Access::Write),
            format!("{}: Permission denied", name),
        )),
        Err(err) => Some(CommandOutcome::from_error(name, "", &err)),
    }
}

/// `adduser USER [PASSWORD]`, root only
pub struct AddUser;

impl Command for AddUser {
    fn name(&self) -> &'static str {
        "adduser"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        if let Some(denied) = require_root(ctx, "adduser") {
            return denied;
        }
        let mut operands = inv.operands();
        let Some(user) = operands.next() else {
            return CommandOutcome::usage("adduser", "USER [PASSWORD]");
        };
        match ctx.kernel_mut().add_user(user, operands.next()) {
            Ok(uid) => CommandOutcome::ok(format!("Adding user '{}' ({}) ...", user, uid)),
            Err(err) => CommandOutcome::from_error("adduser", user, &err),
        }
    }
}

/// `passwd [USER] PASSWORD`; only root may name another user.
pub struct Passwd;

impl Command for Passwd {
    fn name(&self) -> &'static str {
        "passwd"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let operands: Vec<&str> = inv.operands().collect();
        let creds = match ctx.credentials() {
            Ok(creds) => creds,
            Err(err) => return CommandOutcome::from_error("passwd", "", &err),
        };
        let own = user_name(ctx.kernel(), creds.uid);
        let (user, password) = match operands.as_slice() {
            [password] => (own.as_str(), *password),
            [user, password] => (*user, *password),
            _ => return CommandOutcome::usage("passwd", "[USER] PASSWORD"),
        };
        if user != own && !creds.is_privileged() {
            return CommandOutcome::fail(
                ErrorKind::PermissionDenied(Access::Write),
                format!("passwd: You may not view or modify password information for {}.", user),
            );
        }
        match ctx.kernel_mut().set_password(user, Some(password)) {
            Ok(()) => CommandOutcome::ok("passwd: password updated successfully"),
            Err(err) => CommandOutcome::from_error("passwd", user, &err),
        }
    }
}
