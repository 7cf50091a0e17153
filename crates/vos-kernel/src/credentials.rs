// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::inode::Inode;
use crate::permission::Access;
use crate::types::{Gid, ROOT_GID, ROOT_UID, Uid};

/// Per-process identity.
///
/// Filesystem checks use `fsuid`/`fsgid`, which follow the effective ids.
/// Setuid elevation moves the effective (and saved) ids while `uid` keeps
/// the real caller so it can be restored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub uid: Uid,
    pub euid: Uid,
    pub suid: Uid,
    pub fsuid: Uid,
    pub gid: Gid,
    pub egid: Gid,
    pub sgid: Gid,
    pub fsgid: Gid,
    /// Supplementary groups
    pub groups: Vec<Gid>,
}

impl Credentials {
    pub fn new(uid: Uid, gid: Gid, groups: Vec<Gid>) -> Self {
        Self {
            uid,
            euid: uid,
            suid: uid,
            fsuid: uid,
            gid,
            egid: gid,
            sgid: gid,
            fsgid: gid,
            groups,
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_UID, ROOT_GID, vec![ROOT_GID])
    }

    pub fn is_privileged(&self) -> bool {
        self.euid == ROOT_UID
    }

    /// Groups used for the group-row permission check
    pub fn check_groups(&self) -> Vec<Gid> {
        let mut groups = self.groups.clone();
        if !groups.contains(&self.fsgid) {
            groups.push(self.fsgid);
        }
        groups
    }

    pub fn in_group(&self, gid: Gid) -> bool {
        self.fsgid == gid || self.groups.contains(&gid)
    }

    /// Permission check against an inode using the filesystem ids.
    pub fn may(&self, inode: &Inode, access: Access) -> bool {
        inode
            .perms
            .check_with_groups(access, self.fsuid, &self.check_groups(), inode.uid, inode.gid)
    }

    /// Credentials a program starts with when loaded from `exe`.
    ///
    /// Setuid/setgid executables move the effective, saved and fs ids to the
    /// file's owner; the real ids stay with the caller.
    pub fn for_exec(&self, exe: &Inode) -> Self {
        let mut creds = self.clone();
        if exe.perms.setuid() {
            creds.euid = exe.uid;
            creds.suid = exe.uid;
            creds.fsuid = exe.uid;
        }
        if exe.perms.setgid() {
            creds.egid = exe.gid;
            creds.sgid = exe.gid;
            creds.fsgid = exe.gid;
        }
        creds
    }

    /// `setuid(2)`: privileged callers set every uid; others may only switch
    /// the effective id to their real or saved id.
    pub fn setuid(&mut self, uid: Uid) -> KernelResult<()> {
        if self.is_privileged() {
            self.uid = uid;
            self.euid = uid;
            self.suid = uid;
            self.fsuid = uid;
            return Ok(());
        }
        self.seteuid(uid)
    }

    /// `seteuid(2)`
    pub fn seteuid(&mut self, uid: Uid) -> KernelResult<()> {
        if !self.is_privileged() && uid != self.uid && uid != self.suid {
            return Err(KernelError::PermissionDenied(Access::Execute));
        }
        self.euid = uid;
        self.fsuid = uid;
        Ok(())
    }

    /// `setgid(2)`
    pub fn setgid(&mut self, gid: Gid) -> KernelResult<()> {
        if self.is_privileged() {
            self.gid = gid;
            self.egid = gid;
            self.sgid = gid;
            self.fsgid = gid;
            return Ok(());
        }
        if gid != self.gid && gid != self.sgid {
            return Err(KernelError::PermissionDenied(Access::Execute));
        }
        self.egid = gid;
        self.fsgid = gid;
        Ok(())
    }

    /// Drop back to the real ids.
    pub fn restore_real(&mut self) {
        self.euid = self.uid;
        self.fsuid = self.uid;
        self.egid = self.gid;
        self.fsgid = self.gid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::{InodeKind, InodeTimes};
    use crate::permission::Permissions;
    use crate::types::InodeId;

    fn exe(uid: Uid, gid: Gid, mode: u32) -> Inode {
        Inode {
            id: InodeId(7),
            name: "passwd".into(),
            uid,
            gid,
            perms: Permissions::from_mode(mode),
            parent: None,
            nlink: 1,
            size: 0,
            times: InodeTimes::now(),
            kind: InodeKind::File { content: Vec::new() },
        }
    }

    #[test]
    fn test_setuid_exec_elevates_effective_only() {
        let user = Credentials::new(1000, 1000, vec![1000]);
        let elevated = user.for_exec(&exe(0, 0, 0o4755));
        assert_eq!(elevated.uid, 1000);
        assert_eq!(elevated.euid, 0);
        assert_eq!(elevated.suid, 0);
        assert_eq!(elevated.fsuid, 0);
        assert_eq!(elevated.gid, 1000);
        assert!(elevated.is_privileged());

        let plain = user.for_exec(&exe(0, 0, 0o755));
        assert_eq!(plain, user);
    }

    #[test]
    fn test_elevated_process_can_restore_real_id() {
        let user = Credentials::new(1000, 1000, vec![1000]);
        let mut elevated = user.for_exec(&exe(0, 0, 0o4755));
        elevated.seteuid(1000).expect("drop to real");
        assert_eq!(elevated.euid, 1000);
        // saved id still allows going back
        elevated.seteuid(0).expect("regain via saved id");
        assert_eq!(elevated.euid, 0);

        elevated.restore_real();
        assert_eq!(elevated.euid, 1000);
        assert_eq!(elevated.fsuid, 1000);
    }

    #[test]
    fn test_unprivileged_setuid_rules() {
        let mut user = Credentials::new(1000, 1000, vec![1000]);
        assert!(matches!(
            user.setuid(0),
            Err(KernelError::PermissionDenied(_))
        ));
        assert!(user.setgid(0).is_err());
        user.setuid(1000).expect("own id");

        let mut root = Credentials::root();
        root.setuid(1000).expect("root may drop");
        assert_eq!((root.uid, root.euid, root.suid), (1000, 1000, 1000));
        assert!(root.setuid(0).is_err());
    }

    #[test]
    fn test_may_uses_fs_ids_and_groups() {
        let file = exe(0, 27, 0o640);
        let member = Credentials::new(1000, 1000, vec![1000, 27]);
        let outsider = Credentials::new(1001, 1001, vec![1001]);
        assert!(member.may(&file, Access::Read));
        assert!(!member.may(&file, Access::Write));
        assert!(!outsider.may(&file, Access::Read));
        assert!(Credentials::root().may(&file, Access::Write));
    }
}
