// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Process table and pid allocation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::credentials::Credentials;
use crate::error::{KernelError, KernelResult};
use crate::types::{NodeRef, Pid};

/// Exit code reported when a program faults
pub const FAULT_EXIT_CODE: u8 = 139;
/// Exit code reported for a killed program
pub const KILLED_EXIT_CODE: u8 = 137;

/// Lifecycle states. Only these four are reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Created,
    Running,
    Exited,
    Killed,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Exited | ProcessState::Killed)
    }
}

#[derive(Clone, Debug)]
pub struct Process {
    pub pid: Pid,
    pub ppid: Option<Pid>,
    pub children: Vec<Pid>,
    pub creds: Credentials,
    pub cmdline: String,
    pub cwd: NodeRef,
    pub exe: NodeRef,
    pub state: ProcessState,
    pub exit_code: Option<u8>,
    pub env: BTreeMap<String, String>,
    pub output: String,
    pub(crate) cancel: CancellationToken,
}

impl Process {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Everything needed to add a process to the table
#[derive(Clone, Debug)]
pub struct NewProcess {
    pub ppid: Option<Pid>,
    pub creds: Credentials,
    pub cmdline: String,
    pub cwd: NodeRef,
    pub exe: NodeRef,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct ProcessTable {
    procs: BTreeMap<Pid, Process>,
    next_pid: u32,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            procs: BTreeMap::new(),
            next_pid: 1,
        }
    }
}

impl ProcessTable {
    pub(crate) fn from_parts(procs: Vec<Process>, next_pid: u32) -> Self {
        let floor = procs.iter().map(|p| p.pid.0 + 1).max().unwrap_or(1);
        Self {
            procs: procs.into_iter().map(|p| (p.pid, p)).collect(),
            next_pid: next_pid.max(floor),
        }
    }

    /// Pid the next spawn will receive
    pub fn next_pid(&self) -> Pid {
        Pid(self.next_pid)
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    pub fn get(&self, pid: Pid) -> KernelResult<&Process> {
        self.procs.get(&pid).ok_or(KernelError::NoSuchProcess(pid.0))
    }

    pub fn get_mut(&mut self, pid: Pid) -> KernelResult<&mut Process> {
        self.procs.get_mut(&pid).ok_or(KernelError::NoSuchProcess(pid.0))
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.procs.contains_key(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.procs.values()
    }

    /// Allocate a pid and insert the process in `Created` state, linked to its parent.
    pub fn spawn(&mut self, new: NewProcess) -> KernelResult<Pid> {
        if let Some(ppid) = new.ppid {
            if !self.contains(ppid) {
                return Err(KernelError::NoSuchProcess(ppid.0));
            }
        }
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        if let Some(ppid) = new.ppid {
            self.get_mut(ppid)?.children.push(pid);
        }
        self.procs.insert(
            pid,
            Process {
                pid,
                ppid: new.ppid,
                children: Vec::new(),
                creds: new.creds,
                cmdline: new.cmdline,
                cwd: new.cwd,
                exe: new.exe,
                state: ProcessState::Created,
                exit_code: None,
                env: new.env,
                output: String::new(),
                cancel: CancellationToken::new(),
            },
        );
        Ok(pid)
    }

    /// Record a final state and exit code. Codes are masked to 0..=255.
    pub fn finish(&mut self, pid: Pid, state: ProcessState, code: i32) -> KernelResult<u8> {
        let proc = self.get_mut(pid)?;
        let code = (code & 0xFF) as u8;
        proc.state = state;
        proc.exit_code = Some(code);
        Ok(code)
    }

    /// Remove a finished process and unlink it from its parent.
    /// Orphaned children lose their parent link.
    pub fn retire(&mut self, pid: Pid) -> KernelResult<Process> {
        let proc = self
            .procs
            .remove(&pid)
            .ok_or(KernelError::NoSuchProcess(pid.0))?;
        if let Some(ppid) = proc.ppid {
            if let Some(parent) = self.procs.get_mut(&ppid) {
                parent.children.retain(|c| *c != pid);
            }
        }
        for child in &proc.children {
            if let Some(child) = self.procs.get_mut(child) {
                child.ppid = None;
            }
        }
        Ok(proc)
    }

    /// Cancel `pid` and every descendant still in the table.
    pub fn cancel_tree(&self, pid: Pid) -> KernelResult<usize> {
        let mut pending = vec![pid];
        let mut cancelled = 0;
        while let Some(next) = pending.pop() {
            let proc = self.get(next)?;
            proc.cancel.cancel();
            cancelled += 1;
            pending.extend(proc.children.iter().copied().filter(|c| self.contains(*c)));
        }
        Ok(cancelled)
    }
}
