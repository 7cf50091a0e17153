// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The boundary between the shell and the commands it runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use vos_kernel::{Actor, Credentials, ErrorKind, Kernel, KernelError, KernelResult};

/// Arguments for one command run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Arguments after the command name, piped tokens last
    pub argv: Vec<String>,
    /// How many trailing entries of `argv` came from the previous stage
    pub piped: usize,
    /// Output feeds another stage or a file instead of the terminal
    pub pipe: bool,
}

impl Invocation {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            piped: 0,
            pipe: false,
        }
    }

    /// Arguments typed on the command line
    pub fn own_args(&self) -> &[String] {
        &self.argv[..self.argv.len() - self.piped.min(self.argv.len())]
    }

    /// Tokens carried from the previous stage
    pub fn piped_args(&self) -> &[String] {
        &self.argv[self.argv.len() - self.piped.min(self.argv.len())..]
    }

    /// Non-flag arguments, piped tokens included
    pub fn operands(&self) -> impl Iterator<Item = &str> {
        self.argv.iter().map(String::as_str).filter(|a| !is_flag(a))
    }

    /// Whether a short flag like `-l` was given, alone or combined (`-la`).
    pub fn has_flag(&self, flag: char) -> bool {
        self.own_args()
            .iter()
            .filter(|a| is_flag(a) && !a.starts_with("--"))
            .any(|a| a[1..].contains(flag))
    }
}

fn is_flag(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-')
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub error: Option<ErrorKind>,
    /// Text for the terminal, or for the next stage when piping
    pub data: Option<String>,
}

impl CommandOutcome {
    pub fn ok(data: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            success: true,
            error: None,
            data: (!data.is_empty()).then_some(data),
        }
    }

    pub fn empty() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(kind),
            data: Some(message.into()),
        }
    }

    /// `name: subject: message`, the way coreutils report kernel errors.
    pub fn from_error(name: &str, subject: &str, err: &KernelError) -> Self {
        let message = match err {
            KernelError::PermissionDenied(_)
            | KernelError::PathNotFound
            | KernelError::IsDirectory
            | KernelError::IsFile
            | KernelError::AlreadyExists => err.kind().message().to_string(),
            other => other.to_string(),
        };
        let text = if subject.is_empty() {
            format!("{}: {}", name, message)
        } else {
            format!("{}: '{}': {}", name, subject, message)
        };
        Self::fail(err.kind(), text)
    }

    pub fn usage(name: &str, synopsis: &str) -> Self {
        Self::fail(
            ErrorKind::MissingArgument,
            format!("usage: {} {}", name, synopsis),
        )
    }
}

/// Kernel access for a running command.
///
/// Every call acts as the current session's shell process, starting
/// relative paths at the session's working directory.
pub struct ExecContext<'k> {
    kernel: &'k mut Kernel,
}

impl<'k> ExecContext<'k> {
    pub fn new(kernel: &'k mut Kernel) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &Kernel {
        &*self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut *self.kernel
    }

    pub fn credentials(&self) -> KernelResult<Credentials> {
        self.kernel.session_credentials()
    }

    /// Run `f` with an [`Actor`] for the current session.
    pub fn with_actor<T>(
        &mut self,
        f: impl FnOnce(&mut Kernel, Actor<'_>) -> KernelResult<T>,
    ) -> KernelResult<T> {
        let creds = self.kernel.session_credentials()?;
        let cwd = self.kernel.cwd()?;
        f(&mut *self.kernel, Actor::new(&creds, cwd))
    }

    /// Expand a leading `~` to the session's home directory.
    pub fn expand_home(&self, path: &str) -> String {
        let home = self.kernel.getenv("HOME");
        match (path, home) {
            ("~", Some(home)) => home,
            (p, Some(home)) if p.starts_with("~/") => format!("{}{}", home, &p[1..]),
            (p, _) => p.to_string(),
        }
    }
}

/// A command the shell can run without loading a program.
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome;
}

/// Commands by name.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every reference coreutil.
    pub fn with_coreutils() -> Self {
        let mut registry = Self::new();
        crate::coreutils::register_all(&mut registry);
        registry
    }

    /// Add `command`, replacing any command with the same name.
    pub fn register(&mut self, command: Arc<dyn Command>) -> Option<Arc<dyn Command>> {
        self.commands.insert(command.name(), command)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_splits_own_and_piped_args() {
        let inv = Invocation {
            argv: vec!["-l".into(), "a".into(), "b".into(), "c".into()],
            piped: 2,
            pipe: false,
        };
        assert_eq!(inv.own_args(), ["-l", "a"]);
        assert_eq!(inv.piped_args(), ["b", "c"]);
        assert!(inv.has_flag('l'));
        assert!(!inv.has_flag('a'));
        assert_eq!(inv.operands().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_combined_flags() {
        let inv = Invocation::new(vec!["-la".into(), "/tmp".into()]);
        assert!(inv.has_flag('l'));
        assert!(inv.has_flag('a'));
        assert!(!inv.has_flag('r'));
    }

    #[test]
    fn test_outcome_constructors() {
        assert_eq!(CommandOutcome::ok("").data, None);
        assert_eq!(CommandOutcome::ok("x").data.as_deref(), Some("x"));

        let failed = CommandOutcome::from_error("cat", "nope", &KernelError::PathNotFound);
        assert!(!failed.success);
        assert_eq!(failed.error, Some(ErrorKind::PathNotFound));
        assert_eq!(
            failed.data.as_deref(),
            Some("cat: 'nope': No such file or directory")
        );
    }
}
