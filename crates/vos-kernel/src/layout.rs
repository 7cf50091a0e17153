// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Standard directory tree a fresh machine boots with.

use crate::config::KernelConfig;
use crate::credentials::Credentials;
use crate::error::KernelResult;
use crate::fs::{Filesystem, NewNode};
use crate::identity::UserDb;
use crate::permission::Permissions;
use crate::types::{NodeRef, ROOT_GID, ROOT_UID};
use crate::vfs::{Actor, Vfs};

pub const INIT_PATH: &str = "/sbin/init";
pub const PASSWD_PATH: &str = "/etc/passwd";
pub const SHADOW_PATH: &str = "/etc/shadow";
pub const GROUP_PATH: &str = "/etc/group";
pub const HOSTNAME_PATH: &str = "/etc/hostname";
pub const UPTIME_PATH: &str = "/proc/uptime";
pub const SKEL_PATH: &str = "/etc/skel";

const DIRECTORIES: &[(&str, u32)] = &[
    ("/bin", 0o755),
    ("/etc", 0o755),
    ("/etc/apt", 0o755),
    ("/etc/skel", 0o755),
    ("/home", 0o755),
    ("/lib", 0o755),
    ("/proc", 0o555),
    ("/root", 0o750),
    ("/run", 0o755),
    ("/sbin", 0o755),
    ("/tmp", 0o1777),
    ("/usr", 0o755),
    ("/usr/bin", 0o755),
    ("/usr/share", 0o755),
    ("/usr/share/man", 0o755),
    ("/var", 0o755),
    ("/var/lib", 0o755),
    ("/var/lib/dpkg", 0o755),
    ("/var/log", 0o755),
    ("/var/www", 0o755),
    ("/var/www/html", 0o755),
];

const OS_RELEASE: &str = "NAME=\"VOS\"\nID=vos\nPRETTY_NAME=\"VOS GNU/Linux\"\nVERSION_ID=\"1\"\n";
const SUDOERS: &str = "root ALL=(ALL:ALL) ALL\n%sudo ALL=(ALL:ALL) ALL\n";
const SHELLRC: &str = "alias ll='ls -l'\n";
const APT_SOURCES: &str = "deb http://repo.vos.local stable main\n";

pub(crate) fn hosts_file(hostname: &str) -> String {
    format!("127.0.0.1\tlocalhost\n127.0.1.1\t{}\n", hostname)
}

/// Build the root filesystem, populate it and mount procfs at `/proc`.
pub(crate) fn standard_vfs(config: &KernelConfig, users: &UserDb) -> KernelResult<Vfs> {
    let root_fs = Filesystem::new("rootfs", ROOT_UID, ROOT_GID, Permissions::from_mode(0o755));
    let mut vfs = Vfs::new(root_fs, config.security);
    let root = Credentials::root();
    let actor = Actor::new(&root, vfs.root());

    for (path, mode) in DIRECTORIES {
        vfs.create(actor, path, ROOT_UID, ROOT_GID, Permissions::from_mode(*mode), NewNode::Directory)?;
    }

    let hostname_line = format!("{}\n", config.hostname);
    let hosts = hosts_file(&config.hostname);
    let passwd = users.render_passwd();
    let shadow = users.render_shadow();
    let group = users.render_group();
    let files: [(&str, u32, &str); 11] = [
        (PASSWD_PATH, 0o644, passwd.as_str()),
        (GROUP_PATH, 0o644, group.as_str()),
        (SHADOW_PATH, 0o600, shadow.as_str()),
        (HOSTNAME_PATH, 0o644, hostname_line.as_str()),
        ("/etc/hosts", 0o644, hosts.as_str()),
        ("/etc/os-release", 0o644, OS_RELEASE),
        ("/etc/sudoers", 0o440, SUDOERS),
        ("/etc/apt/sources.list", 0o644, APT_SOURCES),
        ("/etc/skel/.shellrc", 0o644, SHELLRC),
        ("/root/.shellrc", 0o644, SHELLRC),
        (INIT_PATH, 0o755, config.init_source.as_str()),
    ];
    for (path, mode, content) in files {
        install_file(&mut vfs, actor, path, mode, content.as_bytes())?;
    }
    install_file(&mut vfs, actor, "/var/log/syslog", 0o640, b"")?;

    for (name, source) in &config.programs {
        let mode = if config.is_setuid_program(name) { 0o4755 } else { 0o755 };
        install_file(&mut vfs, actor, &format!("/bin/{}", name), mode, source.as_bytes())?;
    }

    vfs.mount("/proc", procfs()?)?;
    Ok(vfs)
}

fn procfs() -> KernelResult<Filesystem> {
    let mut fs = Filesystem::new("proc", ROOT_UID, ROOT_GID, Permissions::from_mode(0o555));
    let root = fs.root();
    fs.insert_child(root, "uptime", NewNode::File, ROOT_UID, ROOT_GID, Permissions::from_mode(0o444))?;
    Ok(fs)
}

/// Create a root-owned file with the given content.
pub(crate) fn install_file(
    vfs: &mut Vfs,
    actor: Actor<'_>,
    path: &str,
    mode: u32,
    content: &[u8],
) -> KernelResult<NodeRef> {
    let node = vfs.create(actor, path, ROOT_UID, ROOT_GID, Permissions::from_mode(mode), NewNode::File)?;
    vfs.overwrite(node, content)?;
    Ok(node)
}
