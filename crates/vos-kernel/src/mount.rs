// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mount table and path resolution across mounted filesystems.

use crate::error::{KernelError, KernelResult};
use crate::fs::Filesystem;
use crate::inode::Inode;
use crate::types::{MountId, NodeRef};

/// A filesystem attached at an absolute path
#[derive(Clone, Debug)]
pub struct FsMapping {
    path: String,
    segments: Vec<String>,
    pub fs: Filesystem,
}

impl FsMapping {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Registered mounts. Index 0 is always "/"; entries are never removed.
#[derive(Clone, Debug)]
pub struct MountTable {
    mounts: Vec<FsMapping>,
}

/// Split a path into its non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Render segments as an absolute path.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.iter().fold(String::new(), |mut out, s| {
        out.push('/');
        out.push_str(s.as_ref());
        out
    })
}

impl MountTable {
    pub fn new(root_fs: Filesystem) -> Self {
        Self {
            mounts: vec![FsMapping {
                path: "/".to_string(),
                segments: Vec::new(),
                fs: root_fs,
            }],
        }
    }

    /// Attach `fs` at `path`. Each path may be mounted once.
    pub fn mount(&mut self, path: &str, fs: Filesystem) -> KernelResult<MountId> {
        if !path.starts_with('/') {
            return Err(KernelError::invalid(format!(
                "mount point must be absolute: '{}'",
                path
            )));
        }
        let segments: Vec<String> = split_path(path).into_iter().map(String::from).collect();
        if segments.iter().any(|s| s == "." || s == "..") {
            return Err(KernelError::invalid(format!(
                "mount point must be normalized: '{}'",
                path
            )));
        }
        if self.mounts.iter().any(|m| m.segments == segments) {
            return Err(KernelError::AlreadyExists);
        }
        let id = MountId(self.mounts.len());
        self.mounts.push(FsMapping {
            path: join_segments(&segments),
            segments,
            fs,
        });
        Ok(id)
    }

    pub fn mappings(&self) -> &[FsMapping] {
        &self.mounts
    }

    pub fn mapping(&self, id: MountId) -> KernelResult<&FsMapping> {
        self.mounts.get(id.0).ok_or(KernelError::PathNotFound)
    }

    pub fn fs(&self, id: MountId) -> KernelResult<&Filesystem> {
        Ok(&self.mapping(id)?.fs)
    }

    pub fn fs_mut(&mut self, id: MountId) -> KernelResult<&mut Filesystem> {
        self.mounts
            .get_mut(id.0)
            .map(|m| &mut m.fs)
            .ok_or(KernelError::PathNotFound)
    }

    pub fn root_of(&self, id: MountId) -> KernelResult<NodeRef> {
        Ok(NodeRef::new(id, self.fs(id)?.root()))
    }

    pub fn global_root(&self) -> NodeRef {
        NodeRef::new(MountId(0), self.mounts[0].fs.root())
    }

    pub fn node(&self, node: NodeRef) -> KernelResult<&Inode> {
        self.fs(node.mount)?.get(node.inode)
    }

    pub fn node_mut(&mut self, node: NodeRef) -> KernelResult<&mut Inode> {
        self.fs_mut(node.mount)?.get_mut(node.inode)
    }

    /// Mount whose path is the longest segment-wise prefix of `segments`,
    /// and how many segments it consumed.
    pub fn longest_prefix(&self, segments: &[&str]) -> (MountId, usize) {
        self.mounts
            .iter()
            .enumerate()
            .filter(|(_, m)| {
                m.segments.len() <= segments.len()
                    && m.segments.iter().zip(segments).all(|(a, b)| a == b)
            })
            .max_by_key(|(_, m)| m.segments.len())
            .map(|(i, m)| (MountId(i), m.segments.len()))
            .unwrap_or((MountId(0), 0))
    }

    fn mount_at(&self, segments: &[String]) -> Option<MountId> {
        self.mounts
            .iter()
            .position(|m| m.segments == segments)
            .map(MountId)
    }

    /// True if some mount other than `/` sits at or below `node`.
    pub fn has_mount_below(&self, node: NodeRef) -> KernelResult<bool> {
        let segments = self.segments_of(node)?;
        Ok(self.mounts.iter().skip(1).any(|m| {
            m.segments.len() >= segments.len() && m.segments[..segments.len()] == segments[..]
        }))
    }

    /// Absolute path segments of `node`, including its mount prefix.
    pub fn segments_of(&self, node: NodeRef) -> KernelResult<Vec<String>> {
        let mapping = self.mapping(node.mount)?;
        let mut segments = mapping.segments.clone();
        segments.extend(mapping.fs.segments_of(node.inode)?);
        Ok(segments)
    }

    pub fn path_of(&self, node: NodeRef) -> KernelResult<String> {
        Ok(join_segments(&self.segments_of(node)?))
    }

    /// Parent of `node`. At a mount root this escalates to the directory
    /// holding the mount point; at the global root it stays put.
    pub fn parent_of(&self, node: NodeRef) -> KernelResult<NodeRef> {
        let inode = self.node(node)?;
        if let Some(parent) = inode.parent {
            return Ok(NodeRef::new(node.mount, parent));
        }
        let mapping = self.mapping(node.mount)?;
        match mapping.segments.split_last() {
            None => Ok(node),
            Some((_, parent_segments)) => {
                let parent_path = join_segments(parent_segments);
                self.resolve(None, &parent_path, &mut |_| Ok(()))
            }
        }
    }

    /// Resolve `path` to a node.
    ///
    /// Absolute paths start at the mount with the longest matching prefix;
    /// relative ones start at `base` (or the global root). `visit` is called
    /// on each directory searched along the way so the caller can enforce
    /// search permission.
    pub fn resolve(
        &self,
        base: Option<NodeRef>,
        path: &str,
        visit: &mut dyn FnMut(&Inode) -> KernelResult<()>,
    ) -> KernelResult<NodeRef> {
        let segments = split_path(path);
        let (mut current, mut logical, rest) = if path.starts_with('/') || base.is_none() {
            // only the leading run of plain names can select a mount
            let plain = segments
                .iter()
                .take_while(|s| **s != "." && **s != "..")
                .count();
            let (mount, consumed) = self.longest_prefix(&segments[..plain]);
            let mapping = self.mapping(mount)?;
            (
                self.root_of(mount)?,
                mapping.segments.clone(),
                &segments[consumed..],
            )
        } else {
            let start = base.unwrap_or_else(|| self.global_root());
            (start, self.segments_of(start)?, &segments[..])
        };

        for segment in rest {
            match *segment {
                "." => {}
                ".." => {
                    current = self.parent_of(current)?;
                    logical.pop();
                }
                name => {
                    let dir = self.node(current)?;
                    if !dir.is_dir() {
                        return Err(KernelError::PathNotFound);
                    }
                    visit(dir)?;
                    logical.push(name.to_string());
                    current = match self.mount_at(&logical) {
                        Some(mount) => self.root_of(mount)?,
                        None => {
                            let child = self
                                .fs(current.mount)?
                                .lookup(current.inode, name)?
                                .ok_or(KernelError::PathNotFound)?;
                            NodeRef::new(current.mount, child)
                        }
                    };
                }
            }
        }
        Ok(current)
    }

    /// Resolve everything but the last segment, returning the parent
    /// directory and the final name.
    pub fn resolve_parent<'p>(
        &self,
        base: Option<NodeRef>,
        path: &'p str,
        visit: &mut dyn FnMut(&Inode) -> KernelResult<()>,
    ) -> KernelResult<(NodeRef, &'p str)> {
        let trimmed = path.trim_end_matches('/');
        let (dir_part, name) = match trimmed.rfind('/') {
            Some(0) => ("/", &trimmed[1..]),
            Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
            None => (".", trimmed),
        };
        if name.is_empty() || name == "." || name == ".." {
            return Err(KernelError::invalid(format!("invalid path '{}'", path)));
        }
        let parent = self.resolve(base, dir_part, visit)?;
        if !self.node(parent)?.is_dir() {
            return Err(KernelError::IsFile);
        }
        Ok((parent, name))
    }
}
