// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated Unix kernel for the VOS text game.
//!
//! This crate owns the machine: a permissioned inode tree spread over
//! mounted filesystems, the account database, login sessions and the
//! process table. Programs run in isolated blocking tasks and reach the
//! kernel only through a syscall channel.

pub mod config;
pub mod credentials;
pub mod error;
pub mod fs;
pub mod identity;
pub mod inode;
pub mod interpreter;
pub mod kernel;
pub mod layout;
pub mod mount;
pub mod network;
pub mod permission;
pub mod persist;
pub mod process;
pub mod session;
pub mod syscall;
pub mod types;
pub mod vfs;

/// Kernel error type and its copyable tag.
pub use error::{ErrorKind, KernelError, KernelResult};

/// Permission bits and `chmod` parsing.
pub use permission::{Access, Permissions, SymbolicMode};

pub use config::{KernelConfig, SecurityPolicy};
pub use credentials::Credentials;
pub use fs::{Filesystem, NewNode};
pub use identity::{Group, Profile, User, UserDb};
pub use inode::{Inode, InodeKind, Stat};
pub use interpreter::{Interpreter, NullInterpreter};
pub use kernel::{ExecOutcome, ExecRequest, Kernel, kernel_panic};
pub use network::{NetworkService, ServiceResponse};
pub use process::{FAULT_EXIT_CODE, KILLED_EXIT_CODE, ProcessState};
pub use session::Session;
pub use syscall::{Syscall, SyscallPort, SyscallValue};
pub use types::{EventKind, EventSink, Gid, InodeId, MountId, NodeRef, Pid, Uid};
pub use vfs::{Actor, DirEntry, Vfs};
