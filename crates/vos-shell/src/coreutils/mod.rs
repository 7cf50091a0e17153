// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Reference coreutils built on the kernel syscall surface.

mod account;
mod files;
mod perms;
mod system;
mod text;

use std::sync::Arc;

use vos_kernel::{ErrorKind, Gid, Kernel, KernelError, Uid};

use crate::command::{CommandOutcome, CommandRegistry};

pub use account::{AddUser, Exit, Id, Passwd, Su, Whoami};
pub use files::{Cat, Ls, Mkdir, Mv, Rm, Rmdir, StatCmd, Touch};
pub use perms::{Chmod, Chown};
pub use system::{Cd, Export, Hostname, Pwd, Uname, Uptime};
pub use text::{Echo, Wc};

pub(crate) fn register_all(registry: &mut CommandRegistry) {
    registry.register(Arc::new(AddUser));
    registry.register(Arc::new(Cat));
    registry.register(Arc::new(Cd));
    registry.register(Arc::new(Chmod));
    registry.register(Arc::new(Chown));
    registry.register(Arc::new(Echo));
    registry.register(Arc::new(Exit));
    registry.register(Arc::new(Export));
    registry.register(Arc::new(Hostname));
    registry.register(Arc::new(Id));
    registry.register(Arc::new(Ls));
    registry.register(Arc::new(Mkdir));
    registry.register(Arc::new(Mv));
    registry.register(Arc::new(Passwd));
    registry.register(Arc::new(Pwd));
    registry.register(Arc::new(Rm));
    registry.register(Arc::new(Rmdir));
    registry.register(Arc::new(StatCmd));
    registry.register(Arc::new(Su));
    registry.register(Arc::new(Touch));
    registry.register(Arc::new(Uname));
    registry.register(Arc::new(Uptime));
    registry.register(Arc::new(Wc));
    registry.register(Arc::new(Whoami));
}

/// `name` for `uid`, or the number when the account is gone
fn user_name(kernel: &Kernel, uid: Uid) -> String {
    kernel
        .users()
        .user(uid)
        .map(|u| u.username.clone())
        .unwrap_or_else(|| uid.to_string())
}

fn group_name(kernel: &Kernel, gid: Gid) -> String {
    kernel
        .users()
        .group(gid)
        .map(|g| g.name.clone())
        .unwrap_or_else(|| gid.to_string())
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Collect per-operand failures into one message, one line each.
#[derive(Default)]
struct Report {
    lines: Vec<String>,
    error: Option<ErrorKind>,
}

impl Report {
    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    fn fail(&mut self, name: &str, subject: &str, err: &KernelError) {
        let outcome = CommandOutcome::from_error(name, subject, err);
        self.error = outcome.error;
        if let Some(text) = outcome.data {
            self.lines.push(text);
        }
    }

    fn finish(self) -> CommandOutcome {
        let text = self.lines.join("\n");
        match self.error {
            None => CommandOutcome::ok(text),
            Some(kind) => CommandOutcome::fail(kind, text),
        }
    }
}
