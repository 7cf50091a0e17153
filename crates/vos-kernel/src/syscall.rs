// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Duplex channel between a running program and the kernel.
//!
//! Programs run on a blocking thread and hold a [`SyscallPort`]. Each call
//! sends a [`SyscallRequest`] carrying a oneshot reply sender and blocks
//! until the kernel, which services the channel while joining the program,
//! answers.

use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{KernelError, KernelResult};
use crate::inode::Stat;
use crate::network::ServiceResponse;
use crate::types::{Gid, Pid, Uid};
use crate::vfs::DirEntry;

/// Requests a program can make of the kernel
#[derive(Clone, Debug, PartialEq)]
pub enum Syscall {
    Getpid,
    Getppid,
    Getuid,
    Geteuid,
    Getgid,
    Setuid(Uid),
    Setgid(Gid),
    Getcwd,
    Chdir(String),
    Getenv(String),
    Setenv(String, String),
    Stat(String),
    Read(String),
    Write(String, Vec<u8>),
    Append(String, Vec<u8>),
    Create { path: String, directory: bool, mode: u32 },
    Delete(String),
    Rename(String, String),
    Chmod(String, String),
    Chown { path: String, user: Option<String>, group: Option<String> },
    Readdir(String),
    Print(String),
    Execve { path: String, argv: Vec<String> },
    Kill(Pid),
    Hostname,
    NetCall { host: String, port: u16, args: BTreeMap<String, Value> },
}

impl Syscall {
    pub fn name(&self) -> &'static str {
        match self {
            Syscall::Getpid => "getpid",
            Syscall::Getppid => "getppid",
            Syscall::Getuid => "getuid",
            Syscall::Geteuid => "geteuid",
            Syscall::Getgid => "getgid",
            Syscall::Setuid(_) => "setuid",
            Syscall::Setgid(_) => "setgid",
            Syscall::Getcwd => "getcwd",
            Syscall::Chdir(_) => "chdir",
            Syscall::Getenv(_) => "getenv",
            Syscall::Setenv(..) => "setenv",
            Syscall::Stat(_) => "stat",
            Syscall::Read(_) => "read",
            Syscall::Write(..) => "write",
            Syscall::Append(..) => "append",
            Syscall::Create { .. } => "create",
            Syscall::Delete(_) => "delete",
            Syscall::Rename(..) => "rename",
            Syscall::Chmod(..) => "chmod",
            Syscall::Chown { .. } => "chown",
            Syscall::Readdir(_) => "readdir",
            Syscall::Print(_) => "print",
            Syscall::Execve { .. } => "execve",
            Syscall::Kill(_) => "kill",
            Syscall::Hostname => "hostname",
            Syscall::NetCall { .. } => "net_call",
        }
    }
}

/// Successful syscall results
#[derive(Clone, Debug, PartialEq)]
pub enum SyscallValue {
    Unit,
    Pid(Option<Pid>),
    Id(u32),
    Text(String),
    MaybeText(Option<String>),
    Bytes(Vec<u8>),
    Stat(Box<Stat>),
    Entries(Vec<DirEntry>),
    ExitCode(u8),
    Net(ServiceResponse),
}

impl SyscallValue {
    pub fn into_text(self) -> KernelResult<String> {
        match self {
            SyscallValue::Text(text) => Ok(text),
            SyscallValue::Bytes(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            other => Err(KernelError::Generic(format!("expected text, got {:?}", other))),
        }
    }

    pub fn into_id(self) -> KernelResult<u32> {
        match self {
            SyscallValue::Id(id) => Ok(id),
            SyscallValue::Pid(Some(pid)) => Ok(pid.0),
            other => Err(KernelError::Generic(format!("expected id, got {:?}", other))),
        }
    }
}

pub type SyscallReply = KernelResult<SyscallValue>;

/// One request in flight from a program
#[derive(Debug)]
pub struct SyscallRequest {
    pub call: Syscall,
    pub reply_tx: oneshot::Sender<SyscallReply>,
}

/// Program-side handle to the kernel.
#[derive(Clone, Debug)]
pub struct SyscallPort {
    pid: Pid,
    request_tx: mpsc::UnboundedSender<SyscallRequest>,
    cancel: CancellationToken,
}

impl SyscallPort {
    pub fn new(
        pid: Pid,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<SyscallRequest>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        (
            Self {
                pid,
                request_tx,
                cancel,
            },
            request_rx,
        )
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// True once the process has been killed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Issue a syscall and block until the kernel replies.
    ///
    /// Must be called from a blocking thread, never from async context.
    /// A killed process gets `Interrupted` for every call.
    pub fn call(&self, call: Syscall) -> SyscallReply {
        if self.cancel.is_cancelled() {
            return Err(KernelError::Interrupted);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(SyscallRequest { call, reply_tx })
            .map_err(|_| KernelError::Interrupted)?;
        reply_rx.blocking_recv().map_err(|_| KernelError::Interrupted)?
    }

    pub fn print(&self, text: impl Into<String>) -> KernelResult<()> {
        self.call(Syscall::Print(text.into())).map(|_| ())
    }

    pub fn read_to_string(&self, path: &str) -> KernelResult<String> {
        self.call(Syscall::Read(path.to_string()))?.into_text()
    }

    pub fn write(&self, path: &str, data: impl Into<Vec<u8>>) -> KernelResult<()> {
        self.call(Syscall::Write(path.to_string(), data.into())).map(|_| ())
    }

    pub fn getuid(&self) -> KernelResult<Uid> {
        self.call(Syscall::Getuid)?.into_id()
    }

    pub fn geteuid(&self) -> KernelResult<Uid> {
        self.call(Syscall::Geteuid)?.into_id()
    }

    /// Run another program and wait for its exit code.
    pub fn execve(&self, path: &str, argv: Vec<String>) -> KernelResult<u8> {
        match self.call(Syscall::Execve {
            path: path.to_string(),
            argv,
        })? {
            SyscallValue::ExitCode(code) => Ok(code),
            other => Err(KernelError::Generic(format!("expected exit code, got {:?}", other))),
        }
    }
}
