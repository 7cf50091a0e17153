// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The kernel: owns all machine state and exposes the syscall surface.
//!
//! Outer layers (the shell, running programs) never touch the inode tree,
//! the account database or the process table directly. Every mutation goes
//! through a method here, which applies permission checks for the acting
//! credentials and keeps derived state (account files, hostname) in sync.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::KernelConfig;
use crate::credentials::Credentials;
use crate::error::{KernelError, KernelResult};
use crate::fs::NewNode;
use crate::identity::UserDb;
use crate::inode::{Inode, Stat};
use crate::interpreter::Interpreter;
use crate::layout;
use crate::network::{NetworkService, ServiceResponse};
use crate::permission::{Access, Permissions};
use crate::process::{
    FAULT_EXIT_CODE, KILLED_EXIT_CODE, NewProcess, ProcessState, ProcessTable,
};
use crate::session::{Session, SessionStack};
use crate::syscall::{Syscall, SyscallPort, SyscallReply, SyscallRequest, SyscallValue};
use crate::types::{Gid, NodeRef, Pid, Uid};
use crate::vfs::{Actor, DirEntry, Vfs};

/// Group created at first boot for administrators
pub const SUDO_GID: Gid = 27;

/// Kernel reactions attached to specific files
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FileHook {
    Passwd,
    Shadow,
    Group,
    Hostname,
    Uptime,
}

const HOOKED_FILES: [(&str, FileHook); 5] = [
    (layout::PASSWD_PATH, FileHook::Passwd),
    (layout::SHADOW_PATH, FileHook::Shadow),
    (layout::GROUP_PATH, FileHook::Group),
    (layout::HOSTNAME_PATH, FileHook::Hostname),
    (layout::UPTIME_PATH, FileHook::Uptime),
];

#[derive(Clone, Debug)]
pub struct ExecRequest {
    /// Absolute path of the executable
    pub path: String,
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub ppid: Option<Pid>,
    /// Identity the program runs with, setuid elevation already applied
    pub credentials: Credentials,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecOutcome {
    pub pid: Pid,
    pub exit_code: u8,
    pub state: ProcessState,
    pub output: String,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct Kernel {
    pub(crate) vfs: Vfs,
    pub(crate) users: UserDb,
    pub(crate) sessions: SessionStack,
    pub(crate) procs: ProcessTable,
    pub(crate) hostname: String,
    pub(crate) config: KernelConfig,
    interpreter: Arc<dyn Interpreter>,
    network: Option<Arc<dyn NetworkService>>,
    hooks: HashMap<NodeRef, FileHook>,
    booted_at: DateTime<Utc>,
}

impl Kernel {
    /// Fresh machine with the standard layout. No session is open yet.
    pub fn new(config: KernelConfig, interpreter: Arc<dyn Interpreter>) -> KernelResult<Self> {
        let mut users = UserDb::with_root(&config.root_password);
        users.add_group("sudo", Some(SUDO_GID))?;
        let vfs = layout::standard_vfs(&config, &users)?;
        info!(hostname = %config.hostname, "kernel created with standard layout");
        Ok(Self::assemble(
            vfs,
            users,
            SessionStack::default(),
            ProcessTable::default(),
            config.hostname.clone(),
            config,
            interpreter,
        ))
    }

    pub(crate) fn assemble(
        vfs: Vfs,
        users: UserDb,
        sessions: SessionStack,
        procs: ProcessTable,
        hostname: String,
        config: KernelConfig,
        interpreter: Arc<dyn Interpreter>,
    ) -> Self {
        let mut kernel = Self {
            vfs,
            users,
            sessions,
            procs,
            hostname,
            config,
            interpreter,
            network: None,
            hooks: HashMap::new(),
            booted_at: Utc::now(),
        };
        kernel.register_hooks();
        kernel
    }

    fn register_hooks(&mut self) {
        self.hooks.clear();
        for (path, hook) in HOOKED_FILES {
            if let Ok(node) = self.vfs.find(path) {
                self.hooks.insert(node, hook);
            }
        }
    }

    pub fn with_network(mut self, network: Arc<dyn NetworkService>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn vfs_mut(&mut self) -> &mut Vfs {
        &mut self.vfs
    }

    pub fn users(&self) -> &UserDb {
        &self.users
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    pub fn sessions(&self) -> &SessionStack {
        &self.sessions
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    // ---- sessions ----

    pub fn session(&self) -> KernelResult<&Session> {
        self.sessions
            .current()
            .ok_or_else(|| KernelError::Generic("no active session".to_string()))
    }

    fn session_mut(&mut self) -> KernelResult<&mut Session> {
        self.sessions
            .current_mut()
            .ok_or_else(|| KernelError::Generic("no active session".to_string()))
    }

    /// Credentials of the current session's shell process.
    pub fn session_credentials(&self) -> KernelResult<Credentials> {
        let session = self.session()?;
        if let Some(proc) = session.pid.and_then(|pid| self.procs.get(pid).ok()) {
            return Ok(proc.creds.clone());
        }
        let user = self
            .users
            .user(session.real_uid)
            .ok_or_else(|| KernelError::UnknownUser(session.real_uid.to_string()))?;
        Ok(Credentials::new(user.uid, user.gid, user.all_groups()))
    }

    pub fn cwd(&self) -> KernelResult<NodeRef> {
        Ok(self.session()?.cwd)
    }

    pub fn cwd_path(&self) -> KernelResult<String> {
        self.vfs.path_of(self.cwd()?)
    }

    pub fn getenv(&self, name: &str) -> Option<String> {
        self.sessions.current().and_then(|s| s.env.get(name).cloned())
    }

    pub fn setenv(&mut self, name: &str, value: &str) -> KernelResult<()> {
        self.session_mut()?.env.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Authenticate and push a session for `username`.
    pub fn login(&mut self, username: &str, password: &str) -> KernelResult<&Session> {
        let uid = match self.users.authenticate(username, password) {
            Ok(uid) => uid,
            Err(err) => {
                warn!(user = username, "login failed");
                return Err(err);
            }
        };
        self.open_session(uid)
    }

    /// Switch user. Privileged callers need no password.
    pub fn su(&mut self, username: &str, password: Option<&str>) -> KernelResult<&Session> {
        let caller = self.session_credentials()?;
        let uid = if caller.is_privileged() {
            self.users
                .user_by_name(username)
                .map(|u| u.uid)
                .ok_or_else(|| KernelError::UnknownUser(username.to_string()))?
        } else {
            match self.users.authenticate(username, password.unwrap_or_default()) {
                Ok(uid) => uid,
                Err(err) => {
                    warn!(from = caller.uid, user = username, "su failed");
                    return Err(err);
                }
            }
        };
        self.open_session(uid)
    }

    fn open_session(&mut self, uid: Uid) -> KernelResult<&Session> {
        let user = self
            .users
            .user(uid)
            .cloned()
            .ok_or_else(|| KernelError::UnknownUser(uid.to_string()))?;
        let creds = Credentials::new(uid, user.gid, user.all_groups());
        let home = self
            .vfs
            .find(&user.home)
            .ok()
            .filter(|node| self.vfs.node(*node).is_ok_and(Inode::is_dir))
            .unwrap_or_else(|| self.vfs.root());
        let exe = self.vfs.find(&user.shell).unwrap_or_else(|_| self.vfs.root());
        let env = Session::default_env(&user.home, &user.username);
        let ppid = self
            .sessions
            .current()
            .and_then(|s| s.pid)
            .filter(|pid| self.procs.contains(*pid));

        let pid = self.procs.spawn(NewProcess {
            ppid,
            creds,
            cmdline: user.shell.clone(),
            cwd: home,
            exe,
            env: env.clone(),
        })?;
        self.procs.get_mut(pid)?.state = ProcessState::Running;
        info!(user = %user.username, uid, pid = pid.0, "session opened");
        Ok(self.sessions.push(uid, home, env, Some(pid)))
    }

    /// Pop the current session and retire its shell process.
    pub fn exit(&mut self) -> KernelResult<Session> {
        let session = self
            .sessions
            .pop()
            .ok_or_else(|| KernelError::Generic("no active session".to_string()))?;
        if let Some(pid) = session.pid.filter(|pid| self.procs.contains(*pid)) {
            self.procs.finish(pid, ProcessState::Exited, 0)?;
            self.procs.retire(pid)?;
        }
        info!(session = session.id, uid = session.real_uid, "session closed");
        Ok(session)
    }

    /// Change the current session's working directory.
    pub fn change_directory(&mut self, path: &str) -> KernelResult<NodeRef> {
        let creds = self.session_credentials()?;
        let target = self.vfs.chdir(Actor::new(&creds, self.cwd()?), path)?;
        let session = self.session_mut()?;
        session.cwd = target;
        if let Some(pid) = session.pid {
            if let Ok(proc) = self.procs.get_mut(pid) {
                proc.cwd = target;
            }
        }
        Ok(target)
    }

    // ---- filesystem syscalls ----

    pub fn read(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<Vec<u8>> {
        if let Ok(target) = self.vfs.lookup(actor, path) {
            self.before_read(target)?;
        }
        self.vfs.read(actor, path)
    }

    pub fn read_to_string(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<String> {
        Ok(String::from_utf8_lossy(&self.read(actor, path)?).into_owned())
    }

    pub fn write(&mut self, actor: Actor<'_>, path: &str, data: &[u8]) -> KernelResult<()> {
        let target = self.vfs.write(actor, path, data)?;
        self.after_write(target)
    }

    pub fn append(&mut self, actor: Actor<'_>, path: &str, data: &[u8]) -> KernelResult<()> {
        let target = self.vfs.append(actor, path, data)?;
        self.after_write(target)
    }

    /// Create a node owned by the actor's filesystem ids. Without explicit
    /// permissions files get 644 and directories 755.
    pub fn create(
        &mut self,
        actor: Actor<'_>,
        path: &str,
        node: NewNode,
        perms: Option<Permissions>,
    ) -> KernelResult<NodeRef> {
        let perms = perms.unwrap_or_else(|| match node {
            NewNode::File => Permissions::from_mode(0o644),
            NewNode::Directory => Permissions::from_mode(0o755),
        });
        self.vfs
            .create(actor, path, actor.creds.fsuid, actor.creds.fsgid, perms, node)
    }

    /// Create an empty file unless something already exists at `path`.
    pub fn touch(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<NodeRef> {
        match self.vfs.lookup(actor, path) {
            Ok(existing) => Ok(existing),
            Err(KernelError::PathNotFound) => self.create(actor, path, NewNode::File, None),
            Err(err) => Err(err),
        }
    }

    pub fn delete(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<()> {
        self.vfs.delete(actor, path)?;
        let vfs = &self.vfs;
        self.hooks.retain(|node, _| vfs.node(*node).is_ok());
        Ok(())
    }

    pub fn rename(&mut self, actor: Actor<'_>, from: &str, to: &str) -> KernelResult<NodeRef> {
        self.vfs.rename(actor, from, to)
    }

    /// Apply an octal or symbolic mode.
    pub fn chmod(&mut self, actor: Actor<'_>, path: &str, mode: &str) -> KernelResult<()> {
        let current = self.vfs.stat(actor, path)?.perms;
        let perms = Permissions::parse_chmod(mode, current)?;
        self.vfs.chmod(actor, path, perms)
    }

    /// Change owner and/or group, given as names or numeric ids.
    pub fn chown(
        &mut self,
        actor: Actor<'_>,
        path: &str,
        user: Option<&str>,
        group: Option<&str>,
    ) -> KernelResult<()> {
        if user.is_none() && group.is_none() {
            return Err(KernelError::missing("owner or group"));
        }
        let uid = user.map(|u| self.users.resolve_uid(u)).transpose()?;
        let gid = group.map(|g| self.users.resolve_gid(g)).transpose()?;
        self.vfs.chown(actor, path, uid, gid)
    }

    pub fn stat(&self, actor: Actor<'_>, path: &str) -> KernelResult<Stat> {
        self.vfs.stat(actor, path)
    }

    pub fn readdir(&mut self, actor: Actor<'_>, path: &str) -> KernelResult<Vec<DirEntry>> {
        self.vfs.readdir(actor, path)
    }

    pub fn set_hostname(&mut self, actor: Actor<'_>, name: &str) -> KernelResult<()> {
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(KernelError::invalid(format!("invalid hostname '{}'", name)));
        }
        self.write(actor, layout::HOSTNAME_PATH, format!("{}\n", name).as_bytes())
    }

    // ---- accounts ----

    /// Add an account and give it a home directory seeded from `/etc/skel`.
    pub fn add_user(&mut self, username: &str, password: Option<&str>) -> KernelResult<Uid> {
        let uid = self.users.add_user(username, password)?;
        let (home, gid) = match self.users.user(uid) {
            Some(user) => (user.home.clone(), user.gid),
            None => return Err(KernelError::UnknownUser(username.to_string())),
        };

        let root = Credentials::root();
        let actor = Actor::new(&root, self.vfs.root());
        if self.vfs.find(&home).is_err() {
            self.vfs
                .create(actor, &home, uid, gid, Permissions::from_mode(0o755), NewNode::Directory)?;
            let skel_rc = self
                .vfs
                .find(&format!("{}/.shellrc", layout::SKEL_PATH))
                .and_then(|node| self.vfs.node(node))
                .map(|node| node.content().unwrap_or_default().to_vec());
            if let Ok(content) = skel_rc {
                let rc = self.vfs.create(
                    actor,
                    &format!("{}/.shellrc", home),
                    uid,
                    gid,
                    Permissions::from_mode(0o644),
                    NewNode::File,
                )?;
                self.vfs.overwrite(rc, &content)?;
            }
        }
        self.sync_account_files()?;
        info!(user = username, uid, "user added");
        Ok(uid)
    }

    pub fn set_password(&mut self, username: &str, password: Option<&str>) -> KernelResult<()> {
        let uid = self.users.resolve_uid(username)?;
        if let Some(user) = self.users.user_mut(uid) {
            user.set_password(password);
        }
        self.sync_account_files()
    }

    /// Rewrite the account files from the in-memory database.
    fn sync_account_files(&mut self) -> KernelResult<()> {
        let rendered: Vec<(NodeRef, String)> = self
            .hooks
            .iter()
            .filter_map(|(node, hook)| {
                let text = match hook {
                    FileHook::Passwd => self.users.render_passwd(),
                    FileHook::Shadow => self.users.render_shadow(),
                    FileHook::Group => self.users.render_group(),
                    FileHook::Hostname | FileHook::Uptime => return None,
                };
                Some((*node, text))
            })
            .collect();
        for (node, text) in rendered {
            self.vfs.overwrite(node, text.as_bytes())?;
        }
        Ok(())
    }

    fn before_read(&mut self, target: NodeRef) -> KernelResult<()> {
        if self.hooks.get(&target) == Some(&FileHook::Uptime) {
            let secs = (Utc::now() - self.booted_at).num_milliseconds() as f64 / 1000.0;
            self.vfs
                .overwrite(target, format!("{:.2} {:.2}\n", secs, secs).as_bytes())?;
        }
        Ok(())
    }

    fn after_write(&mut self, target: NodeRef) -> KernelResult<()> {
        let Some(hook) = self.hooks.get(&target).copied() else {
            return Ok(());
        };
        let text = String::from_utf8_lossy(self.vfs.node(target)?.content().unwrap_or_default())
            .into_owned();
        match hook {
            FileHook::Passwd => self.users.apply_passwd(&text),
            FileHook::Shadow => self.users.apply_shadow(&text),
            FileHook::Group => self.users.apply_group(&text),
            FileHook::Hostname => {
                let name = text.trim();
                if !name.is_empty() {
                    info!(hostname = name, "hostname changed");
                    self.hostname = name.to_string();
                }
                return Ok(());
            }
            FileHook::Uptime => return Ok(()),
        }
        debug!(?hook, "account database reloaded");
        self.sync_account_files()
    }

    // ---- processes ----

    /// Resolve `path` for `actor` and build the request that would run it.
    ///
    /// Checks search and execute permission with the caller's own identity,
    /// then applies setuid/setgid elevation from the executable.
    pub fn prepare_exec(
        &self,
        actor: Actor<'_>,
        path: &str,
        argv: Vec<String>,
        env: BTreeMap<String, String>,
        ppid: Option<Pid>,
    ) -> KernelResult<ExecRequest> {
        let target = self.vfs.lookup(actor, path)?;
        let inode = self.vfs.node(target)?;
        if inode.is_dir() {
            return Err(KernelError::IsDirectory);
        }
        self.vfs.access(actor.creds, target, Access::Execute)?;
        Ok(ExecRequest {
            path: self.vfs.path_of(target)?,
            argv,
            env,
            ppid,
            credentials: actor.creds.for_exec(inode),
        })
    }

    /// Load and run a program, servicing its syscalls until it finishes.
    ///
    /// Nothing in the process table changes if the executable cannot be
    /// found, is a directory or lacks execute permission for the request's
    /// credentials.
    pub fn execve(&mut self, request: ExecRequest) -> BoxFuture<'_, KernelResult<ExecOutcome>> {
        async move {
            let exe = self.vfs.find(&request.path)?;
            let inode = self.vfs.node(exe)?;
            if inode.is_dir() {
                return Err(KernelError::IsDirectory);
            }
            self.vfs.access(&request.credentials, exe, Access::Execute)?;
            let source = String::from_utf8_lossy(inode.content().unwrap_or_default()).into_owned();
            let cwd = match request.ppid {
                Some(ppid) => self.procs.get(ppid)?.cwd,
                None => self.vfs.root(),
            };

            let pid = self.procs.spawn(NewProcess {
                ppid: request.ppid,
                creds: request.credentials,
                cmdline: request.argv.join(" "),
                cwd,
                exe,
                env: request.env,
            })?;
            let cancel = {
                let proc = self.procs.get_mut(pid)?;
                proc.state = ProcessState::Running;
                proc.cancel.clone()
            };
            info!(pid = pid.0, ppid = ?request.ppid.map(|p| p.0), path = %request.path, "process started");

            let (port, mut request_rx) = SyscallPort::new(pid, cancel.clone());
            let interpreter = Arc::clone(&self.interpreter);
            let argv = request.argv;
            let mut program =
                tokio::task::spawn_blocking(move || interpreter.execute(&source, &argv, &port));

            let joined = loop {
                tokio::select! {
                    biased;
                    Some(SyscallRequest { call, reply_tx }) = request_rx.recv() => {
                        let reply = self.dispatch(pid, call).await;
                        // the program may already be gone
                        let _ = reply_tx.send(reply);
                    }
                    joined = &mut program => break joined,
                }
            };

            let (state, code) = if cancel.is_cancelled() {
                (ProcessState::Killed, i32::from(KILLED_EXIT_CODE))
            } else {
                match joined {
                    Ok(code) => (ProcessState::Exited, code),
                    Err(err) if err.is_panic() => {
                        warn!(pid = pid.0, "program faulted");
                        (ProcessState::Exited, i32::from(FAULT_EXIT_CODE))
                    }
                    Err(err) => {
                        warn!(pid = pid.0, %err, "program aborted");
                        (ProcessState::Killed, i32::from(KILLED_EXIT_CODE))
                    }
                }
            };
            let exit_code = self.procs.finish(pid, state, code)?;
            let retired = self.procs.retire(pid)?;
            info!(pid = pid.0, exit_code, ?state, "process finished");
            Ok(ExecOutcome {
                pid,
                exit_code,
                state,
                output: retired.output,
            })
        }
        .boxed()
    }

    /// Cancel a process and its descendants. They fail their next syscall
    /// and report as killed once they return.
    pub fn kill(&mut self, pid: Pid) -> KernelResult<usize> {
        let count = self.procs.cancel_tree(pid)?;
        info!(pid = pid.0, count, "process killed");
        Ok(count)
    }

    pub fn net_call(&self, host: &str, port: u16, args: &BTreeMap<String, Value>) -> ServiceResponse {
        match &self.network {
            Some(network) => network.call(host, port, args),
            None => {
                debug!(host, port, "no network attached");
                ServiceResponse::failed(format!("{}:{}: connection refused", host, port))
            }
        }
    }

    async fn dispatch(&mut self, pid: Pid, call: Syscall) -> SyscallReply {
        debug!(pid = pid.0, syscall = call.name(), "syscall");
        let (creds, cwd) = {
            let proc = self.procs.get(pid)?;
            (proc.creds.clone(), proc.cwd)
        };
        let actor = Actor::new(&creds, cwd);
        match call {
            Syscall::Getpid => Ok(SyscallValue::Pid(Some(pid))),
            Syscall::Getppid => Ok(SyscallValue::Pid(self.procs.get(pid)?.ppid)),
            Syscall::Getuid => Ok(SyscallValue::Id(creds.uid)),
            Syscall::Geteuid => Ok(SyscallValue::Id(creds.euid)),
            Syscall::Getgid => Ok(SyscallValue::Id(creds.gid)),
            Syscall::Setuid(uid) => {
                self.procs.get_mut(pid)?.creds.setuid(uid)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Setgid(gid) => {
                self.procs.get_mut(pid)?.creds.setgid(gid)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Getcwd => Ok(SyscallValue::Text(self.vfs.path_of(cwd)?)),
            Syscall::Chdir(path) => {
                let dir = self.vfs.chdir(actor, &path)?;
                self.procs.get_mut(pid)?.cwd = dir;
                Ok(SyscallValue::Unit)
            }
            Syscall::Getenv(name) => Ok(SyscallValue::MaybeText(
                self.procs.get(pid)?.env.get(&name).cloned(),
            )),
            Syscall::Setenv(name, value) => {
                self.procs.get_mut(pid)?.env.insert(name, value);
                Ok(SyscallValue::Unit)
            }
            Syscall::Stat(path) => Ok(SyscallValue::Stat(Box::new(self.stat(actor, &path)?))),
            Syscall::Read(path) => Ok(SyscallValue::Bytes(self.read(actor, &path)?)),
            Syscall::Write(path, data) => {
                self.write(actor, &path, &data)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Append(path, data) => {
                self.append(actor, &path, &data)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Create {
                path,
                directory,
                mode,
            } => {
                let node = if directory { NewNode::Directory } else { NewNode::File };
                self.create(actor, &path, node, Some(Permissions::from_mode(mode)))?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Delete(path) => {
                self.delete(actor, &path)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Rename(from, to) => {
                self.rename(actor, &from, &to)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Chmod(path, mode) => {
                self.chmod(actor, &path, &mode)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Chown { path, user, group } => {
                self.chown(actor, &path, user.as_deref(), group.as_deref())?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Readdir(path) => Ok(SyscallValue::Entries(self.readdir(actor, &path)?)),
            Syscall::Print(text) => {
                self.procs.get_mut(pid)?.output.push_str(&text);
                Ok(SyscallValue::Unit)
            }
            Syscall::Execve { path, argv } => {
                let env = self.procs.get(pid)?.env.clone();
                let request = self.prepare_exec(actor, &path, argv, env, Some(pid))?;
                let outcome = self.execve(request).await?;
                self.procs.get_mut(pid)?.output.push_str(&outcome.output);
                Ok(SyscallValue::ExitCode(outcome.exit_code))
            }
            Syscall::Kill(target) => {
                let owner = self.procs.get(target)?.creds.uid;
                if !creds.is_privileged() && creds.uid != owner && creds.euid != owner {
                    warn!(pid = pid.0, target = target.0, "kill denied");
                    return Err(KernelError::PermissionDenied(Access::Write));
                }
                self.kill(target)?;
                Ok(SyscallValue::Unit)
            }
            Syscall::Hostname => Ok(SyscallValue::Text(self.hostname.clone())),
            Syscall::NetCall { host, port, args } => {
                Ok(SyscallValue::Net(self.net_call(&host, port, &args)))
            }
        }
    }

    // ---- boot ----

    /// Start `/sbin/init` as pid 1's successor with no parent, as root.
    pub async fn run_init(&mut self) -> KernelResult<ExecOutcome> {
        info!(path = layout::INIT_PATH, "starting init");
        let request = ExecRequest {
            path: layout::INIT_PATH.to_string(),
            argv: vec![layout::INIT_PATH.to_string()],
            env: Session::default_env("/root", "root"),
            ppid: None,
            credentials: Credentials::root(),
        };
        self.execve(request).await
    }

    /// Run init; init returning for any reason brings the machine down.
    pub async fn boot(mut self) {
        let reason = match self.run_init().await {
            Ok(outcome) => format!("init exited with code {}", outcome.exit_code),
            Err(err) => format!("init could not start: {}", err),
        };
        kernel_panic(&reason)
    }
}

/// Log and terminate the host process immediately.
pub fn kernel_panic(reason: &str) -> ! {
    error!(reason, "kernel panic");
    std::process::exit(1)
}
