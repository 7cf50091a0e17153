// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Versioned JSON snapshots of a whole machine.
//!
//! File content is stored hex encoded so binary data survives the round
//! trip. Directory children are not stored; they are rebuilt from each
//! inode's parent link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::KernelConfig;
use crate::credentials::Credentials;
use crate::error::{KernelError, KernelResult};
use crate::fs::Filesystem;
use crate::identity::{Group, User, UserDb};
use crate::inode::{Inode, InodeKind, InodeTimes};
use crate::interpreter::Interpreter;
use crate::kernel::Kernel;
use crate::mount::MountTable;
use crate::permission::Permissions;
use crate::process::{Process, ProcessState, ProcessTable};
use crate::session::{Session, SessionStack};
use crate::types::{Gid, InodeId, NodeRef, Pid, Uid};
use crate::vfs::Vfs;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct KernelSnapshot {
    version: u32,
    hostname: String,
    next_pid: u32,
    next_session: u32,
    mounts: Vec<MountRecord>,
    processes: Vec<ProcessRecord>,
    sessions: Vec<SessionRecord>,
    users: Vec<User>,
    groups: Vec<Group>,
}

#[derive(Serialize, Deserialize)]
struct MountRecord {
    path: String,
    label: String,
    root: InodeId,
    next_inode: u64,
    inodes: Vec<InodeRecord>,
}

#[derive(Serialize, Deserialize)]
struct InodeRecord {
    id: InodeId,
    name: String,
    parent: Option<InodeId>,
    uid: Uid,
    gid: Gid,
    mode: Permissions,
    nlink: u32,
    size: u64,
    atime: DateTime<Utc>,
    ctime: DateTime<Utc>,
    mtime: DateTime<Utc>,
    crtime: DateTime<Utc>,
    /// Present for files only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_hex: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ProcessRecord {
    pid: Pid,
    ppid: Option<Pid>,
    children: Vec<Pid>,
    creds: Credentials,
    cmdline: String,
    cwd: NodeRef,
    exe: NodeRef,
    state: ProcessState,
    exit_code: Option<u8>,
    env: BTreeMap<String, String>,
    output: String,
}

#[derive(Serialize, Deserialize)]
struct SessionRecord {
    id: u32,
    real_uid: Uid,
    effective_uid: Uid,
    cwd: NodeRef,
    env: BTreeMap<String, String>,
    pid: Option<Pid>,
}

impl From<&Inode> for InodeRecord {
    fn from(inode: &Inode) -> Self {
        Self {
            id: inode.id,
            name: inode.name.clone(),
            parent: inode.parent,
            uid: inode.uid,
            gid: inode.gid,
            mode: inode.perms,
            nlink: inode.nlink,
            size: inode.size,
            atime: inode.times.atime,
            ctime: inode.times.ctime,
            mtime: inode.times.mtime,
            crtime: inode.times.crtime,
            content_hex: inode.content().map(hex::encode),
        }
    }
}

impl InodeRecord {
    fn into_inode(self) -> KernelResult<Inode> {
        let kind = match self.content_hex {
            Some(encoded) => InodeKind::File {
                content: hex::decode(&encoded).map_err(|e| {
                    KernelError::Generic(format!("inode {}: bad content encoding: {}", self.id.0, e))
                })?,
            },
            None => InodeKind::Directory {
                children: Default::default(),
            },
        };
        Ok(Inode {
            id: self.id,
            name: self.name,
            uid: self.uid,
            gid: self.gid,
            perms: self.mode,
            parent: self.parent,
            nlink: self.nlink,
            size: self.size,
            times: InodeTimes {
                atime: self.atime,
                ctime: self.ctime,
                mtime: self.mtime,
                crtime: self.crtime,
            },
            kind,
        })
    }
}

impl Kernel {
    pub fn save_snapshot(&self) -> KernelResult<Vec<u8>> {
        let mounts = self
            .vfs
            .mounts()
            .mappings()
            .iter()
            .map(|mapping| {
                let mut inodes: Vec<InodeRecord> =
                    mapping.fs.inodes().map(InodeRecord::from).collect();
                inodes.sort_by_key(|r| r.id);
                MountRecord {
                    path: mapping.path().to_string(),
                    label: mapping.fs.label().to_string(),
                    root: mapping.fs.root(),
                    next_inode: mapping.fs.next_id(),
                    inodes,
                }
            })
            .collect();
        let processes = self
            .procs
            .iter()
            .map(|p| ProcessRecord {
                pid: p.pid,
                ppid: p.ppid,
                children: p.children.clone(),
                creds: p.creds.clone(),
                cmdline: p.cmdline.clone(),
                cwd: p.cwd,
                exe: p.exe,
                state: p.state,
                exit_code: p.exit_code,
                env: p.env.clone(),
                output: p.output.clone(),
            })
            .collect();
        let sessions = self
            .sessions
            .iter()
            .map(|s| SessionRecord {
                id: s.id,
                real_uid: s.real_uid,
                effective_uid: s.effective_uid,
                cwd: s.cwd,
                env: s.env.clone(),
                pid: s.pid,
            })
            .collect();
        let snapshot = KernelSnapshot {
            version: SNAPSHOT_VERSION,
            hostname: self.hostname.clone(),
            next_pid: self.procs.next_pid().0,
            next_session: self.sessions.next_id(),
            mounts,
            processes,
            sessions,
            users: self.users.users().cloned().collect(),
            groups: self.users.groups().cloned().collect(),
        };
        Ok(serde_json::to_vec_pretty(&snapshot)?)
    }

    /// Rebuild a kernel from [`Kernel::save_snapshot`] output. Security
    /// policy and installed programs come from `config`, not the snapshot.
    pub fn restore(
        bytes: &[u8],
        config: KernelConfig,
        interpreter: Arc<dyn Interpreter>,
    ) -> KernelResult<Kernel> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if probe.version != SNAPSHOT_VERSION {
            return Err(KernelError::UnsupportedSnapshot(probe.version));
        }
        let snapshot: KernelSnapshot = serde_json::from_slice(bytes)?;

        let mut records = snapshot.mounts.into_iter();
        let root_record = records
            .next()
            .filter(|m| m.path == "/")
            .ok_or_else(|| KernelError::Generic("snapshot has no root filesystem".to_string()))?;
        let mut mounts = MountTable::new(rebuild_fs(root_record)?);
        for record in records {
            let path = record.path.clone();
            mounts.mount(&path, rebuild_fs(record)?)?;
        }
        let vfs = Vfs::from_mounts(mounts, config.security);

        let processes = snapshot
            .processes
            .into_iter()
            .map(|p| Process {
                pid: p.pid,
                ppid: p.ppid,
                children: p.children,
                creds: p.creds,
                cmdline: p.cmdline,
                cwd: p.cwd,
                exe: p.exe,
                state: p.state,
                exit_code: p.exit_code,
                env: p.env,
                output: p.output,
                cancel: CancellationToken::new(),
            })
            .collect();
        let sessions = snapshot
            .sessions
            .into_iter()
            .map(|s| Session {
                id: s.id,
                real_uid: s.real_uid,
                effective_uid: s.effective_uid,
                cwd: s.cwd,
                env: s.env,
                pid: s.pid,
            })
            .collect();

        let kernel = Kernel::assemble(
            vfs,
            UserDb::from_parts(snapshot.users, snapshot.groups),
            SessionStack::from_parts(sessions, snapshot.next_session),
            ProcessTable::from_parts(processes, snapshot.next_pid),
            snapshot.hostname,
            config,
            interpreter,
        );
        info!(
            hostname = %kernel.hostname,
            next_pid = kernel.procs.next_pid().0,
            "kernel restored from snapshot"
        );
        Ok(kernel)
    }

    pub fn save_to_path(&self, path: &Path) -> KernelResult<()> {
        std::fs::write(path, self.save_snapshot()?)?;
        info!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    pub fn load_from_path(
        path: &Path,
        config: KernelConfig,
        interpreter: Arc<dyn Interpreter>,
    ) -> KernelResult<Kernel> {
        let bytes = std::fs::read(path)?;
        Self::restore(&bytes, config, interpreter)
    }

    /// Save to the configured `snapshot_path`.
    pub fn save(&self) -> KernelResult<()> {
        let path = self
            .config
            .snapshot_path
            .clone()
            .ok_or_else(|| KernelError::Config("no snapshot path configured".to_string()))?;
        self.save_to_path(&path)
    }
}

fn rebuild_fs(record: MountRecord) -> KernelResult<Filesystem> {
    let inodes = record
        .inodes
        .into_iter()
        .map(InodeRecord::into_inode)
        .collect::<KernelResult<Vec<_>>>()?;
    Filesystem::from_parts(record.label, record.root, record.next_inode, inodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::NullInterpreter;
    use crate::vfs::Actor;

    fn create_test_kernel() -> Kernel {
        let mut kernel =
            Kernel::new(KernelConfig::default(), Arc::new(NullInterpreter)).expect("kernel");
        kernel.login("root", "password").expect("login");
        kernel
    }

    #[test]
    fn test_round_trip_keeps_binary_content() {
        let mut kernel = create_test_kernel();
        let creds = kernel.session_credentials().expect("creds");
        let actor = Actor::new(&creds, kernel.vfs().root());
        kernel.touch(actor, "/tmp/blob").expect("touch");
        kernel.write(actor, "/tmp/blob", &[0, 159, 255, b'\n']).expect("write");

        let bytes = kernel.save_snapshot().expect("save");
        let mut restored =
            Kernel::restore(&bytes, KernelConfig::default(), Arc::new(NullInterpreter))
                .expect("restore");
        let creds = restored.session_credentials().expect("creds");
        let actor = Actor::new(&creds, restored.vfs().root());
        assert_eq!(restored.read(actor, "/tmp/blob").expect("read"), vec![0, 159, 255, b'\n']);
        assert_eq!(
            restored.stat(actor, "/tmp").expect("stat").perms.to_mode(),
            0o1777
        );
    }

    #[test]
    fn test_unknown_version_rejected() {
        let kernel = create_test_kernel();
        let mut value: serde_json::Value =
            serde_json::from_slice(&kernel.save_snapshot().expect("save")).expect("json");
        value["version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&value).expect("encode");
        assert!(matches!(
            Kernel::restore(&bytes, KernelConfig::default(), Arc::new(NullInterpreter)),
            Err(KernelError::UnsupportedSnapshot(99))
        ));
        assert!(matches!(
            Kernel::restore(b"not json", KernelConfig::default(), Arc::new(NullInterpreter)),
            Err(KernelError::Snapshot(_))
        ));
    }

    #[test]
    fn test_save_needs_configured_path() {
        let kernel = create_test_kernel();
        assert!(matches!(kernel.save(), Err(KernelError::Config(_))));
    }
}
