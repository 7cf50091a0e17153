// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Permission-checked filesystem operations across all mounts.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SecurityPolicy;
use crate::credentials::Credentials;
use crate::error::{KernelError, KernelResult};
use crate::fs::{Filesystem, NewNode};
use crate::inode::{Inode, InodeKind, Stat};
use crate::mount::MountTable;
use crate::permission::{Access, Class, Permissions};
use crate::types::{EventKind, EventSink, Gid, MountId, NodeRef, SubscriptionId, Uid};

/// Who is asking, and where relative paths start.
#[derive(Clone, Copy, Debug)]
pub struct Actor<'a> {
    pub creds: &'a Credentials,
    pub cwd: NodeRef,
}

impl<'a> Actor<'a> {
    pub fn new(creds: &'a Credentials, cwd: NodeRef) -> Self {
        Self { creds, cwd }
    }
}

/// One `readdir` entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub struct Vfs {
    mounts: MountTable,
    security: SecurityPolicy,
    sinks: Vec<(SubscriptionId, Arc<dyn EventSink>)>,
    next_subscription: u64,
}

impl Vfs {
    pub fn new(root_fs: Filesystem, security: SecurityPolicy) -> Self {
        Self::from_mounts(MountTable::new(root_fs), security)
    }

    pub(crate) fn from_mounts(mounts: MountTable, security: SecurityPolicy) -> Self {
        Self {
            mounts,
            security,
            sinks: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn mount(&mut self, path: &str, fs: Filesystem) -> KernelResult<MountId> {
        let id = self.mounts.mount(path, fs)?;
        debug!(path, mount = id.0, "filesystem mounted");
        Ok(id)
    }

    pub fn security(&self) -> SecurityPolicy {
        self.security
    }

    pub fn root(&self) -> NodeRef {
        self.mounts.global_root()
    }

    pub fn node(&self, node: NodeRef) -> KernelResult<&Inode> {
        self.mounts.node(node)
    }

    pub fn path_of(&self, node: NodeRef) -> KernelResult<String> {
        self.mounts.path_of(node)
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_subscription);
        self.next_subscription += 1;
        self.sinks.push((id, sink));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sub, _)| *sub != id);
        self.sinks.len() != before
    }

    fn emit_event(&self, evt: EventKind) {
        for (_, sink) in &self.sinks {
            sink.on_event(&evt);
        }
    }

    fn permits(&self, creds: &Credentials, inode: &Inode, access: Access) -> bool {
        if !self.security.enforce_permissions {
            return true;
        }
        if creds.fsuid == 0 && !self.security.root_bypass_permissions {
            let class = Class::for_caller(creds.fsuid, &creds.check_groups(), inode.uid, inode.gid);
            return inode.perms.allows(class, access);
        }
        creds.may(inode, access)
    }

    fn require(&self, creds: &Credentials, inode: &Inode, access: Access) -> KernelResult<()> {
        if self.permits(creds, inode, access) {
            Ok(())
        } else {
            warn!(
                uid = creds.fsuid,
                inode = inode.id.0,
                name = %inode.name,
                %access,
                "permission denied"
            );
            Err(KernelError::PermissionDenied(access))
        }
    }

    /// Check one permission bit on `node` for `creds`.
    pub fn access(&self, creds: &Credentials, node: NodeRef, access: Access) -> KernelResult<()> {
        self.require(creds, self.node(node)?, access)
    }

    fn search_check<'s>(
        &'s self,
        creds: &'s Credentials,
    ) -> impl FnMut(&Inode) -> KernelResult<()> + 's {
        move |dir| {
            if self.security.enforce_search_permission {
                self.require(creds, dir, Access::Execute)
            } else {
                Ok(())
            }
        }
    }

    /// Resolve `path` from the root without any permission checks.
    pub fn find(&self, path: &str) -> KernelResult<NodeRef> {
        self.mounts.resolve(None, path, &mut |_| Ok(()))
    }

    /// Resolve `path` for `actor`, requiring search permission on the way.
    pub fn lookup(&self, actor: Actor<'_>, path: &str) -> KernelResult<NodeRef> {
        let mut check = self.search_check(actor.creds);
        self.mounts.resolve(Some(actor.cwd), path, &mut check)
    }

    fn lookup_parent<'p>(&self, actor: Actor<'_>, path: &'p str) -> KernelResult<(NodeRef, &'p str)> {
        let mut check = self.search_check(actor.creds);
        self.mounts.resolve_parent(Some(actor.cwd), path, &mut check)
    }

    /// Child `name` of `dir`, entering a mount if one sits there.
    fn child(&self, dir: NodeRef, name: &str) -> KernelResult<NodeRef> {
        self.mounts.resolve(Some(dir), name, &mut |_| Ok(()))
    }

    /// Write+search on a directory, plus the sticky-bit rule when `entry` is given.
    fn require_dir_write(
        &self,
        creds: &Credentials,
        dir: NodeRef,
        entry: Option<&Inode>,
    ) -> KernelResult<()> {
        let dir_node = self.node(dir)?;
        self.require(creds, dir_node, Access::Write)?;
        self.require(creds, dir_node, Access::Execute)?;

        if let Some(entry) = entry {
            let privileged = creds.fsuid == 0 && self.security.root_bypass_permissions;
            if self.security.enforce_permissions
                && dir_node.perms.sticky()
                && !privileged
                && creds.fsuid != dir_node.uid
                && creds.fsuid != entry.uid
            {
                warn!(
                    uid = creds.fsuid,
                    dir = %dir_node.name,
                    entry = %entry.name,
                    "sticky directory denies removal"
                );
                return Err(KernelError::PermissionDenied(Access::Write));
            }
        }
        Ok(())
    }

    /// Create a file or directory owned by `owner:group`.
    pub fn create(
        &mut self,
        actor: Actor<'_>,
        path: &str,
        owner: Uid,
        group: Gid,
        perms: Permissions,
        node: NewNode,
    ) -> KernelResult<NodeRef> {
        let (parent, name) = self.lookup_parent(actor, path)?;
        self.require_dir_write(actor.creds, parent, None)?;
        let inode = self
            .mounts
            .fs_mut(parent.mount)?
            .insert_child(parent.inode, name, node, owner, group, perms)?;
        let created = NodeRef::new(parent.mount, inode);
        let full = self.path_of(created)?;
        debug!(path = %full, ?node, owner, group, "created");
        self.emit_event(EventKind::Created { path: full });
        Ok(created)
    }

    pub fn read(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<Vec<u8>> {
        let target = self.lookup(actor, path)?;
        let inode = self.node(target)?;
        if inode.is_dir() {
            return Err(KernelError::IsDirectory);
        }
        self.require(actor.creds, inode, Access::Read)?;
        let node = self.mounts.node_mut(target)?;
        node.times.atime = Utc::now();
        Ok(node.content().map(<[u8]>::to_vec).unwrap_or_default())
    }

    fn writable_file(&self, actor: Actor<'_>, path: &str) -> KernelResult<NodeRef> {
        let target = self.lookup(actor, path)?;
        let inode = self.node(target)?;
        if inode.is_dir() {
            return Err(KernelError::IsDirectory);
        }
        self.require(actor.creds, inode, Access::Write)?;
        Ok(target)
    }

    /// Replace file content.
    pub fn write(&mut self, actor: Actor<'_>, path: &str, data: &[u8]) -> KernelResult<NodeRef> {
        let target = self.writable_file(actor, path)?;
        self.overwrite(target, data)?;
        Ok(target)
    }

    pub fn append(&mut self, actor: Actor<'_>, path: &str, data: &[u8]) -> KernelResult<NodeRef> {
        let target = self.writable_file(actor, path)?;
        self.mounts.node_mut(target)?.append_content(data);
        self.emit_event(EventKind::Modified {
            path: self.path_of(target)?,
        });
        Ok(target)
    }

    /// Unchecked content replacement used by the kernel itself.
    pub(crate) fn overwrite(&mut self, target: NodeRef, data: &[u8]) -> KernelResult<()> {
        let node = self.mounts.node_mut(target)?;
        if node.is_dir() {
            return Err(KernelError::IsDirectory);
        }
        node.set_content(data.to_vec());
        self.emit_event(EventKind::Modified {
            path: self.path_of(target)?,
        });
        Ok(())
    }

    /// Unlink `path`. Directories must be empty, mount points cannot go.
    pub fn delete(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<()> {
        let (parent, name) = self.lookup_parent(actor, path)?;
        let target = self.child(parent, name)?;
        if target.mount != parent.mount || self.mounts.has_mount_below(target)? {
            return Err(KernelError::Busy);
        }
        let inode = self.node(target)?;
        if inode.children().is_some_and(|c| !c.is_empty()) {
            return Err(KernelError::NotEmpty);
        }
        self.require_dir_write(actor.creds, parent, Some(inode))?;

        let full = self.path_of(target)?;
        self.mounts.fs_mut(target.mount)?.remove_subtree(target.inode)?;
        debug!(path = %full, "deleted");
        self.emit_event(EventKind::Removed { path: full });
        Ok(())
    }

    /// Move `from` to `to`. When `to` is an existing directory the node
    /// keeps its name inside it.
    pub fn rename(&mut self, actor: Actor<'_>, from: &str, to: &str) -> KernelResult<NodeRef> {
        let (src_parent, src_name) = self.lookup_parent(actor, from)?;
        let source = self.child(src_parent, src_name)?;
        if source.mount != src_parent.mount || self.mounts.has_mount_below(source)? {
            return Err(KernelError::Busy);
        }

        let existing_dir = match self.lookup(actor, to) {
            Ok(existing) if existing != source => self.node(existing)?.is_dir().then_some(existing),
            Ok(_) | Err(KernelError::PathNotFound) => None,
            Err(err) => return Err(err),
        };
        let (dst_parent, dst_name) = match existing_dir {
            Some(dir) => (dir, src_name.to_string()),
            None => {
                let (parent, name) = self.lookup_parent(actor, to)?;
                (parent, name.to_string())
            }
        };
        if dst_parent.mount != source.mount {
            return Err(KernelError::CrossDevice);
        }

        let source_inode = self.node(source)?;
        self.require_dir_write(actor.creds, src_parent, Some(source_inode))?;
        self.require_dir_write(actor.creds, dst_parent, None)?;

        let old_path = self.path_of(source)?;
        self.mounts
            .fs_mut(source.mount)?
            .relocate(source.inode, dst_parent.inode, &dst_name)?;
        let new_path = self.path_of(source)?;
        debug!(from = %old_path, to = %new_path, "renamed");
        self.emit_event(EventKind::Renamed {
            from: old_path,
            to: new_path,
        });
        Ok(source)
    }

    /// Only root or the owner may change the mode. Ownership rules key on
    /// fsuid 0 and ignore `root_bypass_permissions`, which only governs
    /// read/write/execute bit checks.
    pub fn chmod(&mut self, actor: Actor<'_>, path: &str, perms: Permissions) -> KernelResult<()> {
        let target = self.lookup(actor, path)?;
        let inode = self.node(target)?;
        if actor.creds.fsuid != 0 && actor.creds.fsuid != inode.uid {
            warn!(uid = actor.creds.fsuid, owner = inode.uid, "chmod denied");
            return Err(KernelError::PermissionDenied(Access::Write));
        }
        let node = self.mounts.node_mut(target)?;
        node.perms = perms;
        node.touch_ctime();
        self.emit_event(EventKind::Modified {
            path: self.path_of(target)?,
        });
        Ok(())
    }

    /// Change owner and/or group.
    ///
    /// Only root may give a file away; the owner may move it to any group
    /// they belong to. Setuid and setgid are cleared on every ownership change.
    /// Like [`Vfs::chmod`], this ignores `root_bypass_permissions`.
    pub fn chown(
        &mut self,
        actor: Actor<'_>,
        path: &str,
        uid: Option<Uid>,
        gid: Option<Gid>,
    ) -> KernelResult<()> {
        let target = self.lookup(actor, path)?;
        let inode = self.node(target)?;
        let creds = actor.creds;
        let privileged = creds.fsuid == 0;
        if !privileged && creds.fsuid != inode.uid {
            warn!(uid = creds.fsuid, owner = inode.uid, "chown denied");
            return Err(KernelError::PermissionDenied(Access::Write));
        }

        let uid_change = uid.filter(|u| *u != inode.uid);
        if uid_change.is_some() && !privileged {
            warn!(uid = creds.fsuid, owner = inode.uid, "chown denied");
            return Err(KernelError::PermissionDenied(Access::Write));
        }
        if let Some(gid) = gid {
            if !privileged && !creds.in_group(gid) {
                warn!(uid = creds.fsuid, gid, "chgrp denied");
                return Err(KernelError::PermissionDenied(Access::Write));
            }
        }

        let node = self.mounts.node_mut(target)?;
        if let Some(uid) = uid {
            node.uid = uid;
        }
        if let Some(gid) = gid {
            node.gid = gid;
        }
        node.perms = node.perms.with_setuid(false).with_setgid(false);
        node.touch_ctime();
        self.emit_event(EventKind::Modified {
            path: self.path_of(target)?,
        });
        Ok(())
    }

    pub fn stat(&self, actor: Actor<'_>, path: &str) -> KernelResult<Stat> {
        let target = self.lookup(actor, path)?;
        Ok(Stat::from(self.node(target)?))
    }

    /// Sorted directory listing; requires read on the directory.
    pub fn readdir(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<Vec<DirEntry>> {
        let target = self.lookup(actor, path)?;
        let inode = self.node(target)?;
        self.require(actor.creds, inode, Access::Read)?;
        let InodeKind::Directory { children } = &inode.kind else {
            return Err(KernelError::IsFile);
        };
        let fs = self.mounts.fs(target.mount)?;
        let mut entries: Vec<DirEntry> = children
            .iter()
            .map(|(name, id)| DirEntry {
                name: name.clone(),
                is_dir: fs.get(*id).map(Inode::is_dir).unwrap_or(false),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        self.mounts.node_mut(target)?.times.atime = Utc::now();
        Ok(entries)
    }

    /// Directory to use as a working directory; requires search permission.
    pub fn chdir(&self, actor: Actor<'_>, path: &str) -> KernelResult<NodeRef> {
        let target = self.lookup(actor, path)?;
        let inode = self.node(target)?;
        if !inode.is_dir() {
            return Err(KernelError::IsFile);
        }
        let mut check = self.search_check(actor.creds);
        check(inode)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MockEventSink;

    fn create_test_vfs() -> Vfs {
        let root_fs = Filesystem::new("rootfs", 0, 0, Permissions::from_mode(0o755));
        let mut vfs = Vfs::new(root_fs, SecurityPolicy::default());
        let root = Credentials::root();
        let actor = Actor::new(&root, vfs.root());
        vfs.create(actor, "/home", 0, 0, Permissions::from_mode(0o755), NewNode::Directory)
            .expect("home");
        vfs.create(actor, "/home/alice", 1000, 1000, Permissions::from_mode(0o755), NewNode::Directory)
            .expect("alice home");
        vfs.create(actor, "/tmp", 0, 0, Permissions::from_mode(0o1777), NewNode::Directory)
            .expect("tmp");
        vfs.create(actor, "/secret", 0, 0, Permissions::from_mode(0o700), NewNode::Directory)
            .expect("secret");
        vfs.create(actor, "/secret/key", 0, 0, Permissions::from_mode(0o644), NewNode::File)
            .expect("key");
        vfs
    }

    fn alice() -> Credentials {
        Credentials::new(1000, 1000, vec![1000])
    }

    fn bob() -> Credentials {
        Credentials::new(1001, 1001, vec![1001])
    }

    #[test]
    fn test_create_then_find_returns_same_node() {
        let mut vfs = create_test_vfs();
        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        let created = vfs
            .create(actor, "/home/alice/notes.txt", 1000, 1000, Permissions::from_mode(0o644), NewNode::File)
            .expect("create should succeed");
        assert_eq!(vfs.find("/home/alice/notes.txt").expect("find"), created);
        assert_eq!(vfs.lookup(actor, "home/alice/notes.txt").expect("lookup"), created);
    }

    #[test]
    fn test_create_errors() {
        let mut vfs = create_test_vfs();
        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        let perms = Permissions::from_mode(0o644);

        assert!(matches!(
            vfs.create(actor, "/missing/file", 1000, 1000, perms, NewNode::File),
            Err(KernelError::PathNotFound)
        ));
        assert!(matches!(
            vfs.create(actor, "/home/other", 1000, 1000, perms, NewNode::File),
            Err(KernelError::PermissionDenied(Access::Write))
        ));
        assert!(matches!(
            vfs.create(actor, "/home/alice", 1000, 1000, perms, NewNode::File),
            Err(KernelError::PermissionDenied(Access::Write))
        ));
        let root = Credentials::root();
        let root_actor = Actor::new(&root, vfs.root());
        assert!(matches!(
            vfs.create(root_actor, "/home/alice", 0, 0, perms, NewNode::File),
            Err(KernelError::AlreadyExists)
        ));
        assert!(matches!(
            vfs.create(root_actor, "/secret/key/x", 0, 0, perms, NewNode::File),
            Err(KernelError::IsFile)
        ));
    }

    #[test]
    fn test_search_permission_on_traversal() {
        let mut vfs = create_test_vfs();
        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        assert!(matches!(
            vfs.read(actor, "/secret/key"),
            Err(KernelError::PermissionDenied(Access::Execute))
        ));
        assert!(vfs.find("/secret/key").is_ok());
    }

    #[test]
    fn test_read_write_append() {
        let mut vfs = create_test_vfs();
        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        vfs.create(actor, "/tmp/f", 1000, 1000, Permissions::from_mode(0o644), NewNode::File)
            .expect("create");
        vfs.write(actor, "/tmp/f", b"hi").expect("write");
        vfs.append(actor, "/tmp/f", b"\nbye").expect("append");
        assert_eq!(vfs.read(actor, "/tmp/f").expect("read"), b"hi\nbye");
        assert_eq!(vfs.stat(actor, "/tmp/f").expect("stat").size, 6);

        let other = bob();
        let bob_actor = Actor::new(&other, vfs.root());
        assert!(vfs.read(bob_actor, "/tmp/f").is_ok());
        assert!(matches!(
            vfs.write(bob_actor, "/tmp/f", b"x"),
            Err(KernelError::PermissionDenied(Access::Write))
        ));
        assert!(matches!(vfs.read(actor, "/tmp"), Err(KernelError::IsDirectory)));
        assert!(matches!(vfs.write(actor, "/tmp", b""), Err(KernelError::IsDirectory)));
    }

    #[test]
    fn test_delete_requires_parent_write() {
        let mut vfs = create_test_vfs();
        let root = Credentials::root();
        let root_actor = Actor::new(&root, vfs.root());
        // alice owns the file but not the directory holding it
        vfs.create(root_actor, "/home/owned", 1000, 1000, Permissions::from_mode(0o644), NewNode::File)
            .expect("create");

        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        assert!(matches!(
            vfs.delete(actor, "/home/owned"),
            Err(KernelError::PermissionDenied(Access::Write))
        ));

        // but may delete root's file in her own directory
        vfs.create(root_actor, "/home/alice/rootfile", 0, 0, Permissions::from_mode(0o600), NewNode::File)
            .expect("create");
        vfs.delete(actor, "/home/alice/rootfile").expect("parent write suffices");
        assert!(matches!(
            vfs.find("/home/alice/rootfile"),
            Err(KernelError::PathNotFound)
        ));
    }

    #[test]
    fn test_sticky_directory() {
        let mut vfs = create_test_vfs();
        let a = alice();
        let b = bob();
        let alice_actor = Actor::new(&a, vfs.root());
        let bob_actor = Actor::new(&b, vfs.root());
        vfs.create(alice_actor, "/tmp/mine", 1000, 1000, Permissions::from_mode(0o666), NewNode::File)
            .expect("create");
        assert!(matches!(
            vfs.delete(bob_actor, "/tmp/mine"),
            Err(KernelError::PermissionDenied(Access::Write))
        ));
        assert!(matches!(
            vfs.rename(bob_actor, "/tmp/mine", "/tmp/stolen"),
            Err(KernelError::PermissionDenied(Access::Write))
        ));
        vfs.delete(alice_actor, "/tmp/mine").expect("owner may delete");
    }

    #[test]
    fn test_delete_rules() {
        let mut vfs = create_test_vfs();
        let root = Credentials::root();
        let actor = Actor::new(&root, vfs.root());
        assert!(matches!(vfs.delete(actor, "/secret"), Err(KernelError::NotEmpty)));
        vfs.delete(actor, "/secret/key").expect("delete file");
        vfs.delete(actor, "/secret").expect("delete empty dir");
        assert!(vfs.delete(actor, "/").is_err());

        let procfs = Filesystem::new("proc", 0, 0, Permissions::from_mode(0o555));
        vfs.create(actor, "/proc", 0, 0, Permissions::from_mode(0o555), NewNode::Directory)
            .expect("proc dir");
        vfs.mount("/proc", procfs).expect("mount");
        assert!(matches!(vfs.delete(actor, "/proc"), Err(KernelError::Busy)));
    }

    #[test]
    fn test_rename() {
        let mut vfs = create_test_vfs();
        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        let file = vfs
            .create(actor, "/home/alice/a.txt", 1000, 1000, Permissions::from_mode(0o640), NewNode::File)
            .expect("create");
        vfs.create(actor, "/home/alice/docs", 1000, 1000, Permissions::from_mode(0o755), NewNode::Directory)
            .expect("mkdir");

        vfs.rename(actor, "/home/alice/a.txt", "/home/alice/docs").expect("into dir");
        assert_eq!(vfs.find("/home/alice/docs/a.txt").expect("moved"), file);

        vfs.rename(actor, "/home/alice/docs/a.txt", "/tmp/b.txt").expect("rename");
        assert_eq!(vfs.find("/tmp/b.txt").expect("renamed"), file);
        let stat = vfs.stat(actor, "/tmp/b.txt").expect("stat");
        assert_eq!(stat.perms.to_mode(), 0o640);
        assert_eq!(stat.uid, 1000);

        assert!(matches!(
            vfs.rename(actor, "/home/alice/docs", "/home/alice/docs/inner"),
            Err(KernelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_chmod_chown_by_non_owner_denied() {
        let mut vfs = create_test_vfs();
        let root = Credentials::root();
        let root_actor = Actor::new(&root, vfs.root());
        vfs.create(root_actor, "/tmp/rootfile", 0, 0, Permissions::from_mode(0o644), NewNode::File)
            .expect("create");

        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        assert!(matches!(
            vfs.chmod(actor, "/tmp/rootfile", Permissions::from_mode(0o777)),
            Err(KernelError::PermissionDenied(_))
        ));
        assert!(matches!(
            vfs.chown(actor, "/tmp/rootfile", Some(1000), None),
            Err(KernelError::PermissionDenied(_))
        ));
        assert!(matches!(
            vfs.chown(actor, "/tmp/rootfile", None, Some(1000)),
            Err(KernelError::PermissionDenied(_))
        ));
        let stat = vfs.stat(actor, "/tmp/rootfile").expect("stat");
        assert_eq!((stat.uid, stat.gid, stat.perms.to_mode()), (0, 0, 0o644));

        vfs.create(root_actor, "/tmp/rootsuid", 0, 0, Permissions::from_mode(0o4755), NewNode::File)
            .expect("create");
        assert!(matches!(
            vfs.chown(actor, "/tmp/rootsuid", Some(0), None),
            Err(KernelError::PermissionDenied(_))
        ));
        assert!(matches!(
            vfs.chown(actor, "/tmp/rootsuid", None, None),
            Err(KernelError::PermissionDenied(_))
        ));
        let stat = vfs.stat(actor, "/tmp/rootsuid").expect("stat");
        assert_eq!((stat.uid, stat.gid, stat.perms.to_mode()), (0, 0, 0o4755));
    }

    #[test]
    fn test_owner_chmod_and_chgrp() {
        let mut vfs = create_test_vfs();
        let creds = Credentials::new(1000, 1000, vec![1000, 27]);
        let actor = Actor::new(&creds, vfs.root());
        vfs.create(actor, "/tmp/tool", 1000, 1000, Permissions::from_mode(0o4755), NewNode::File)
            .expect("create");
        vfs.chmod(actor, "/tmp/tool", Permissions::from_mode(0o4750)).expect("chmod");
        vfs.chown(actor, "/tmp/tool", None, Some(27)).expect("chgrp to own group");
        let stat = vfs.stat(actor, "/tmp/tool").expect("stat");
        assert_eq!(stat.gid, 27);
        assert_eq!(stat.perms.to_mode(), 0o750);
        assert!(matches!(
            vfs.chown(actor, "/tmp/tool", None, Some(5)),
            Err(KernelError::PermissionDenied(_))
        ));
        // giving the file to yourself is not an ownership change
        vfs.chown(actor, "/tmp/tool", Some(1000), None).expect("no-op uid");
    }

    #[test]
    fn test_readdir_and_chdir() {
        let mut vfs = create_test_vfs();
        let creds = alice();
        let actor = Actor::new(&creds, vfs.root());
        let names: Vec<String> = vfs
            .readdir(actor, "/")
            .expect("readdir")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["home", "secret", "tmp"]);
        assert!(matches!(
            vfs.readdir(actor, "/secret"),
            Err(KernelError::PermissionDenied(Access::Read))
        ));

        let home = vfs.chdir(actor, "/home/alice").expect("chdir");
        let moved = Actor::new(&creds, home);
        assert_eq!(vfs.path_of(vfs.lookup(moved, "..").expect("up")).expect("path"), "/home");
        assert!(matches!(vfs.chdir(actor, "/secret"), Err(KernelError::PermissionDenied(_))));
    }

    #[test]
    fn test_root_bypass_can_be_disabled() {
        let root_fs = Filesystem::new("rootfs", 0, 0, Permissions::from_mode(0o755));
        let policy = SecurityPolicy {
            root_bypass_permissions: false,
            ..SecurityPolicy::default()
        };
        let mut vfs = Vfs::new(root_fs, policy);
        let root = Credentials::root();
        let actor = Actor::new(&root, vfs.root());
        vfs.create(actor, "/locked", 1000, 1000, Permissions::from_mode(0o600), NewNode::File)
            .expect("create");
        assert!(matches!(
            vfs.read(actor, "/locked"),
            Err(KernelError::PermissionDenied(Access::Read))
        ));
    }

    #[test]
    fn test_events_emitted() {
        let mut vfs = create_test_vfs();
        let mut sink = MockEventSink::new();
        sink.expect_on_event()
            .withf(|evt| matches!(evt, EventKind::Created { path } if path == "/tmp/e"))
            .times(1)
            .return_const(());
        sink.expect_on_event()
            .withf(|evt| matches!(evt, EventKind::Modified { path } if path == "/tmp/e"))
            .times(1)
            .return_const(());
        sink.expect_on_event()
            .withf(|evt| matches!(evt, EventKind::Removed { path } if path == "/tmp/e"))
            .times(1)
            .return_const(());
        let id = vfs.subscribe(Arc::new(sink));

        let root = Credentials::root();
        let actor = Actor::new(&root, vfs.root());
        vfs.create(actor, "/tmp/e", 0, 0, Permissions::from_mode(0o644), NewNode::File)
            .expect("create");
        vfs.write(actor, "/tmp/e", b"x").expect("write");
        vfs.delete(actor, "/tmp/e").expect("delete");
        assert!(vfs.unsubscribe(id));
        assert!(!vfs.unsubscribe(id));
    }
}
