// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use common::{create_test_kernel, toy_interpreter};
use std::sync::Arc;
use vos_kernel::{Actor, Credentials, Interpreter, Kernel, KernelConfig, Pid, Session};

fn request_for(path: &str) -> vos_kernel::ExecRequest {
    vos_kernel::ExecRequest {
        path: path.to_string(),
        argv: vec![path.to_string()],
        env: Session::default_env("/root", "root"),
        ppid: None,
        credentials: Credentials::root(),
    }
}

#[tokio::test]
async fn test_snapshot_round_trip_through_file() {
    let mut kernel = create_test_kernel(&[("true", "exit 0")]);
    kernel.add_user("alice", Some("wonderland")).expect("add user");
    let root = Credentials::root();
    let actor = Actor::new(&root, kernel.vfs().root());
    kernel.touch(actor, "/home/alice/todo.txt").expect("touch");
    kernel.write(actor, "/home/alice/todo.txt", b"hack the planet\n").expect("write");
    kernel
        .chown(actor, "/home/alice/todo.txt", Some("alice"), Some("alice"))
        .expect("chown");
    kernel.write(actor, "/etc/hostname", b"gibson\n").expect("hostname");
    kernel.su("alice", None).expect("su");
    kernel.change_directory("/tmp").expect("cd");
    let last = kernel.execve(request_for("/bin/true")).await.expect("run").pid;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("machine.json");
    kernel.save_to_path(&path).expect("save");

    let interpreter: Arc<dyn Interpreter> = Arc::new(toy_interpreter);
    let mut restored =
        Kernel::load_from_path(&path, KernelConfig::default(), interpreter).expect("load");

    assert_eq!(restored.hostname(), "gibson");
    assert_eq!(restored.sessions().len(), 2);
    assert_eq!(restored.session().expect("session").real_uid, 1000);
    assert_eq!(restored.cwd_path().expect("cwd"), "/tmp");
    assert_eq!(restored.processes().len(), kernel.processes().len());
    assert!(restored.processes().next_pid() > last);

    let alice = restored.session_credentials().expect("creds");
    let cwd = restored.cwd().expect("cwd");
    let stat = restored
        .stat(Actor::new(&alice, cwd), "/home/alice/todo.txt")
        .expect("stat");
    assert_eq!((stat.uid, stat.gid), (1000, 1000));
    assert_eq!(
        restored
            .read_to_string(Actor::new(&alice, cwd), "../home/alice/todo.txt")
            .expect("read"),
        "hack the planet\n"
    );
    assert!(restored.users().authenticate("alice", "wonderland").is_ok());

    // the pid counter keeps climbing after restore
    let after = restored.execve(request_for("/bin/true")).await.expect("run").pid;
    assert!(after > last);
    assert_ne!(after, Pid(0));

    // account hooks are live again
    restored.exit().expect("back to root");
    let root = restored.session_credentials().expect("creds");
    restored
        .append(
            Actor::new(&root, restored.vfs().root()),
            "/etc/passwd",
            b"bob:x:1001:1001::/home/bob:/bin/sh\n",
        )
        .expect("append");
    assert!(restored.users().user_by_name("bob").is_some());
}
