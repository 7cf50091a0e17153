// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Arena-backed inode tree for one filesystem instance.
//!
//! Parents are looked up by id, so the tree never holds owning cycles.
//! This layer does no permission checks; see [`crate::vfs`].

use std::collections::HashMap;

use crate::error::{KernelError, KernelResult};
use crate::inode::{DIRECTORY_SIZE, Inode, InodeKind, InodeTimes};
use crate::permission::Permissions;
use crate::types::{Gid, InodeId, Uid};

#[derive(Clone, Debug)]
pub struct Filesystem {
    label: String,
    nodes: HashMap<InodeId, Inode>,
    root: InodeId,
    next_id: u64,
}

/// What to put in a freshly created node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewNode {
    File,
    Directory,
}

impl Filesystem {
    pub fn new(label: impl Into<String>, uid: Uid, gid: Gid, perms: Permissions) -> Self {
        let root = InodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Inode {
                id: root,
                name: String::new(),
                uid,
                gid,
                perms,
                parent: None,
                nlink: 2,
                size: DIRECTORY_SIZE,
                times: InodeTimes::now(),
                kind: InodeKind::Directory {
                    children: HashMap::new(),
                },
            },
        );
        Self {
            label: label.into(),
            nodes,
            root,
            next_id: 2,
        }
    }

    /// Rebuild from stored inodes. Children maps are derived from parent links.
    pub(crate) fn from_parts(
        label: String,
        root: InodeId,
        next_id: u64,
        inodes: Vec<Inode>,
    ) -> KernelResult<Self> {
        let mut nodes: HashMap<InodeId, Inode> =
            inodes.into_iter().map(|inode| (inode.id, inode)).collect();
        if !nodes.get(&root).is_some_and(Inode::is_dir) {
            return Err(KernelError::Generic(format!(
                "filesystem '{}' has no root directory",
                label
            )));
        }
        let links: Vec<(InodeId, InodeId, String)> = nodes
            .values()
            .filter_map(|n| n.parent.map(|p| (p, n.id, n.name.clone())))
            .collect();
        for (parent, child, name) in links {
            match nodes.get_mut(&parent).map(|p| &mut p.kind) {
                Some(InodeKind::Directory { children }) => {
                    children.insert(name, child);
                }
                _ => {
                    return Err(KernelError::Generic(format!(
                        "inode {} points at missing parent {}",
                        child.0, parent.0
                    )));
                }
            }
        }
        let next_id = next_id.max(nodes.keys().map(|id| id.0 + 1).max().unwrap_or(2));
        Ok(Self {
            label,
            nodes,
            root,
            next_id,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root(&self) -> InodeId {
        self.root
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn inodes(&self) -> impl Iterator<Item = &Inode> {
        self.nodes.values()
    }

    pub fn get(&self, id: InodeId) -> KernelResult<&Inode> {
        self.nodes.get(&id).ok_or(KernelError::PathNotFound)
    }

    pub fn get_mut(&mut self, id: InodeId) -> KernelResult<&mut Inode> {
        self.nodes.get_mut(&id).ok_or(KernelError::PathNotFound)
    }

    /// Exact child lookup. Errors with `IsFile` when `dir` is not a directory.
    pub fn lookup(&self, dir: InodeId, name: &str) -> KernelResult<Option<InodeId>> {
        match &self.get(dir)?.kind {
            InodeKind::Directory { children } => Ok(children.get(name).copied()),
            InodeKind::File { .. } => Err(KernelError::IsFile),
        }
    }

    pub fn insert_child(
        &mut self,
        parent: InodeId,
        name: &str,
        node: NewNode,
        uid: Uid,
        gid: Gid,
        perms: Permissions,
    ) -> KernelResult<InodeId> {
        validate_name(name)?;
        if self.lookup(parent, name)?.is_some() {
            return Err(KernelError::AlreadyExists);
        }

        let id = InodeId(self.next_id);
        self.next_id += 1;
        let (kind, size, nlink) = match node {
            NewNode::File => (InodeKind::File { content: Vec::new() }, 0, 1),
            NewNode::Directory => (
                InodeKind::Directory {
                    children: HashMap::new(),
                },
                DIRECTORY_SIZE,
                2,
            ),
        };
        self.nodes.insert(
            id,
            Inode {
                id,
                name: name.to_string(),
                uid,
                gid,
                perms,
                parent: Some(parent),
                nlink,
                size,
                times: InodeTimes::now(),
                kind,
            },
        );
        self.link(parent, name, id)?;
        if node == NewNode::Directory {
            self.get_mut(parent)?.nlink += 1;
        }
        Ok(id)
    }

    fn link(&mut self, parent: InodeId, name: &str, child: InodeId) -> KernelResult<()> {
        let dir = self.get_mut(parent)?;
        match &mut dir.kind {
            InodeKind::Directory { children } => {
                children.insert(name.to_string(), child);
            }
            InodeKind::File { .. } => return Err(KernelError::IsFile),
        }
        dir.touch_ctime();
        dir.times.mtime = dir.times.ctime;
        Ok(())
    }

    fn unlink(&mut self, parent: InodeId, name: &str) -> KernelResult<()> {
        let dir = self.get_mut(parent)?;
        match &mut dir.kind {
            InodeKind::Directory { children } => {
                children.remove(name);
            }
            InodeKind::File { .. } => return Err(KernelError::IsFile),
        }
        dir.touch_ctime();
        dir.times.mtime = dir.times.ctime;
        Ok(())
    }

    /// True when `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: InodeId, node: InodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Detach `id` from its parent and drop it with everything below it.
    /// Returns the number of inodes removed.
    pub fn remove_subtree(&mut self, id: InodeId) -> KernelResult<usize> {
        if id == self.root {
            return Err(KernelError::Busy);
        }
        let (parent, name, is_dir) = {
            let node = self.get(id)?;
            (node.parent, node.name.clone(), node.is_dir())
        };
        if let Some(parent) = parent {
            self.unlink(parent, &name)?;
            if is_dir {
                let dir = self.get_mut(parent)?;
                dir.nlink = dir.nlink.saturating_sub(1);
            }
        }

        let mut removed = 0;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                removed += 1;
                if let InodeKind::Directory { children } = node.kind {
                    pending.extend(children.into_values());
                }
            }
        }
        Ok(removed)
    }

    /// Move `id` under `new_parent` as `new_name`, replacing an existing
    /// file of that name. Every other inode field is kept.
    pub fn relocate(&mut self, id: InodeId, new_parent: InodeId, new_name: &str) -> KernelResult<()> {
        validate_name(new_name)?;
        if id == self.root {
            return Err(KernelError::Busy);
        }
        if self.is_ancestor(id, new_parent) {
            return Err(KernelError::invalid(
                "cannot move a directory into itself",
            ));
        }
        let moving_dir = self.get(id)?.is_dir();
        if let Some(existing) = self.lookup(new_parent, new_name)? {
            if existing == id {
                return Ok(());
            }
            if self.get(existing)?.is_dir() {
                return Err(KernelError::IsDirectory);
            }
            if moving_dir {
                return Err(KernelError::IsFile);
            }
            self.remove_subtree(existing)?;
        }

        let (old_parent, old_name) = {
            let node = self.get(id)?;
            (node.parent, node.name.clone())
        };
        if let Some(old_parent) = old_parent {
            self.unlink(old_parent, &old_name)?;
            if moving_dir {
                let dir = self.get_mut(old_parent)?;
                dir.nlink = dir.nlink.saturating_sub(1);
            }
        }
        self.link(new_parent, new_name, id)?;
        if moving_dir {
            self.get_mut(new_parent)?.nlink += 1;
        }

        let node = self.get_mut(id)?;
        node.parent = Some(new_parent);
        node.name = new_name.to_string();
        node.touch_ctime();
        Ok(())
    }

    /// Names from the root down to `id`; empty for the root itself.
    pub fn segments_of(&self, id: InodeId) -> KernelResult<Vec<String>> {
        let mut segments = Vec::new();
        let mut cursor = self.get(id)?;
        while let Some(parent) = cursor.parent {
            segments.push(cursor.name.clone());
            cursor = self.get(parent)?;
        }
        segments.reverse();
        Ok(segments)
    }
}

fn validate_name(name: &str) -> KernelResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(KernelError::invalid(format!("invalid file name '{}'", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_fs() -> Filesystem {
        Filesystem::new("rootfs", 0, 0, Permissions::from_mode(0o755))
    }

    fn mkdir(fs: &mut Filesystem, parent: InodeId, name: &str) -> InodeId {
        fs.insert_child(parent, name, NewNode::Directory, 0, 0, Permissions::from_mode(0o755))
            .expect("mkdir should succeed")
    }

    fn touch(fs: &mut Filesystem, parent: InodeId, name: &str) -> InodeId {
        fs.insert_child(parent, name, NewNode::File, 0, 0, Permissions::from_mode(0o644))
            .expect("create should succeed")
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut fs = create_test_fs();
        let root = fs.root();
        let etc = mkdir(&mut fs, root, "etc");
        let passwd = touch(&mut fs, etc, "passwd");

        assert_eq!(fs.lookup(root, "etc").expect("lookup"), Some(etc));
        assert_eq!(fs.lookup(etc, "passwd").expect("lookup"), Some(passwd));
        assert_eq!(fs.lookup(etc, "shadow").expect("lookup"), None);
        assert!(matches!(fs.lookup(passwd, "x"), Err(KernelError::IsFile)));
        assert_eq!(fs.get(passwd).expect("node").parent, Some(etc));
        assert_eq!(fs.get(root).expect("root").nlink, 3);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut fs = create_test_fs();
        let root = fs.root();
        touch(&mut fs, root, "a");
        let err = fs
            .insert_child(root, "a", NewNode::Directory, 0, 0, Permissions::from_mode(0o755))
            .expect_err("duplicate name");
        assert!(matches!(err, KernelError::AlreadyExists));
        assert!(matches!(
            fs.insert_child(root, "..", NewNode::File, 0, 0, Permissions::default()),
            Err(KernelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_remove_subtree() {
        let mut fs = create_test_fs();
        let root = fs.root();
        let home = mkdir(&mut fs, root, "home");
        let user = mkdir(&mut fs, home, "user");
        touch(&mut fs, user, "notes.txt");
        let before = fs.len();

        assert_eq!(fs.remove_subtree(home).expect("remove"), 3);
        assert_eq!(fs.len(), before - 3);
        assert_eq!(fs.lookup(root, "home").expect("lookup"), None);
        assert!(matches!(fs.remove_subtree(root), Err(KernelError::Busy)));
    }

    #[test]
    fn test_relocate_preserves_fields() {
        let mut fs = create_test_fs();
        let root = fs.root();
        let tmp = mkdir(&mut fs, root, "tmp");
        let file = fs
            .insert_child(root, "a.txt", NewNode::File, 1000, 1000, Permissions::from_mode(0o600))
            .expect("create");
        fs.get_mut(file).expect("node").set_content(b"hello".to_vec());

        fs.relocate(file, tmp, "b.txt").expect("move");
        let node = fs.get(file).expect("node");
        assert_eq!(node.name, "b.txt");
        assert_eq!(node.parent, Some(tmp));
        assert_eq!(node.uid, 1000);
        assert_eq!(node.perms.to_mode(), 0o600);
        assert_eq!(node.content(), Some(&b"hello"[..]));
        assert_eq!(fs.lookup(root, "a.txt").expect("lookup"), None);
        assert_eq!(fs.segments_of(file).expect("path"), vec!["tmp", "b.txt"]);
    }

    #[test]
    fn test_relocate_into_own_subtree_rejected() {
        let mut fs = create_test_fs();
        let root = fs.root();
        let a = mkdir(&mut fs, root, "a");
        let b = mkdir(&mut fs, a, "b");
        assert!(matches!(
            fs.relocate(a, b, "a"),
            Err(KernelError::InvalidArgument(_))
        ));
        assert!(matches!(
            fs.relocate(a, a, "a2"),
            Err(KernelError::InvalidArgument(_))
        ));
        assert!(fs.is_ancestor(a, b));
        assert!(!fs.is_ancestor(b, a));
    }

    #[test]
    fn test_relocate_replaces_file() {
        let mut fs = create_test_fs();
        let root = fs.root();
        let a = touch(&mut fs, root, "a");
        let b = touch(&mut fs, root, "b");
        fs.relocate(a, root, "b").expect("replace");
        assert_eq!(fs.lookup(root, "b").expect("lookup"), Some(a));
        assert!(fs.get(b).is_err());
    }

    #[test]
    fn test_from_parts_rebuilds_children() {
        let mut fs = create_test_fs();
        let root = fs.root();
        let etc = mkdir(&mut fs, root, "etc");
        let host = touch(&mut fs, etc, "hostname");
        let inodes: Vec<Inode> = fs
            .inodes()
            .cloned()
            .map(|mut n| {
                if let InodeKind::Directory { children } = &mut n.kind {
                    children.clear();
                }
                n
            })
            .collect();

        let rebuilt = Filesystem::from_parts("rootfs".into(), root, fs.next_id(), inodes)
            .expect("rebuild");
        assert_eq!(rebuilt.lookup(etc, "hostname").expect("lookup"), Some(host));
        assert_eq!(rebuilt.next_id(), fs.next_id());
    }
}
