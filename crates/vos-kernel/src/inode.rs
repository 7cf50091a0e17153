// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::permission::Permissions;
use crate::types::{Gid, InodeId, Uid};

/// Size reported for directories, as `ls -l` would show it.
pub const DIRECTORY_SIZE: u64 = 4096;

/// Access, inode-change, modification and creation times
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InodeTimes {
    pub atime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub crtime: DateTime<Utc>,
}

impl InodeTimes {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            atime: now,
            ctime: now,
            mtime: now,
            crtime: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InodeKind {
    File { content: Vec<u8> },
    Directory { children: HashMap<String, InodeId> },
}

#[derive(Clone, Debug)]
pub struct Inode {
    pub id: InodeId,
    pub name: String,
    pub uid: Uid,
    pub gid: Gid,
    pub perms: Permissions,
    /// `None` only for a filesystem root
    pub parent: Option<InodeId>,
    pub nlink: u32,
    pub size: u64,
    pub times: InodeTimes,
    pub kind: InodeKind,
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, InodeKind::File { .. })
    }

    pub fn children(&self) -> Option<&HashMap<String, InodeId>> {
        match &self.kind {
            InodeKind::Directory { children } => Some(children),
            InodeKind::File { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        match &self.kind {
            InodeKind::File { content } => Some(content),
            InodeKind::Directory { .. } => None,
        }
    }

    /// Replace file content, keeping size and times in step.
    pub(crate) fn set_content(&mut self, content: Vec<u8>) {
        if let InodeKind::File { content: slot } = &mut self.kind {
            *slot = content;
            self.size = slot.len() as u64;
            let now = Utc::now();
            self.times.mtime = now;
            self.times.ctime = now;
        }
    }

    pub(crate) fn append_content(&mut self, data: &[u8]) {
        if let InodeKind::File { content } = &mut self.kind {
            content.extend_from_slice(data);
            self.size = content.len() as u64;
            let now = Utc::now();
            self.times.mtime = now;
            self.times.ctime = now;
        }
    }

    pub(crate) fn touch_ctime(&mut self) {
        self.times.ctime = Utc::now();
    }
}

/// Attributes returned by `stat`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stat {
    pub ino: u64,
    pub name: String,
    pub uid: Uid,
    pub gid: Gid,
    pub perms: Permissions,
    pub nlink: u32,
    pub size: u64,
    pub is_dir: bool,
    pub times: InodeTimes,
}

impl From<&Inode> for Stat {
    fn from(inode: &Inode) -> Self {
        Self {
            ino: inode.id.0,
            name: inode.name.clone(),
            uid: inode.uid,
            gid: inode.gid,
            perms: inode.perms,
            nlink: inode.nlink,
            size: inode.size,
            is_dir: inode.is_dir(),
            times: inode.times,
        }
    }
}

impl Stat {
    /// `drwxr-xr-x` style mode column
    pub fn mode_string(&self) -> String {
        format!("{}{}", if self.is_dir { 'd' } else { '-' }, self.perms)
    }
}
