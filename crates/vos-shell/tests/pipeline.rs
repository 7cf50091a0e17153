// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod common;

use common::{create_test_kernel, create_test_shell, read_as_root, run};

#[tokio::test]
async fn test_pipe_into_wc_counts_words() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();

    let out = run(&mut shell, &mut kernel, "echo hello | wc").await;
    let fields: Vec<&str> = out.split_whitespace().collect();
    assert_eq!(fields, vec!["1", "1", "6"]);

    let out = run(&mut shell, &mut kernel, "echo one two three | wc -w").await;
    assert_eq!(out, "3\n");
}

#[tokio::test]
async fn test_redirect_overwrites_then_appends() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();

    assert_eq!(run(&mut shell, &mut kernel, "echo hi > f.txt").await, "");
    assert_eq!(read_as_root(&mut kernel, "/root/f.txt"), "hi");

    run(&mut shell, &mut kernel, "echo bye >> f.txt").await;
    let content = read_as_root(&mut kernel, "/root/f.txt");
    let (hi, bye) = (content.find("hi"), content.find("bye"));
    assert!(hi.is_some() && bye.is_some() && hi < bye, "{content:?}");
    assert_eq!(content, "hibye");
    assert_eq!(run(&mut shell, &mut kernel, "wc -c f.txt").await, "5 f.txt\n");

    run(&mut shell, &mut kernel, "echo fresh > f.txt").await;
    assert_eq!(read_as_root(&mut kernel, "/root/f.txt"), "fresh");
}

#[tokio::test]
async fn test_redirect_strips_surrounding_quotes() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    run(&mut shell, &mut kernel, "echo \"hello world\" > /tmp/q.txt").await;
    assert_eq!(read_as_root(&mut kernel, "/tmp/q.txt"), "hello world");
}

#[tokio::test]
async fn test_pipe_result_redirected() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    run(&mut shell, &mut kernel, "echo a b c | wc -w > /tmp/count").await;
    assert_eq!(read_as_root(&mut kernel, "/tmp/count"), "3");
}

#[tokio::test]
async fn test_redirect_missing_parent_reports_error() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    let out = run(&mut shell, &mut kernel, "echo hi > /nope/f").await;
    assert_eq!(out, "shell: no such file or directory: /nope/f\n");
}

#[tokio::test]
async fn test_failing_stage_abandons_rest() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();

    let out = run(&mut shell, &mut kernel, "cat /nope | wc").await;
    assert_eq!(out, "cat: '/nope': No such file or directory\n");

    run(&mut shell, &mut kernel, "cat /nope > /tmp/out.txt").await;
    let out = run(&mut shell, &mut kernel, "ls /tmp").await;
    assert!(!out.contains("out.txt"), "redirect target created: {out}");
}

#[tokio::test]
async fn test_and_does_not_short_circuit() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    let out = run(&mut shell, &mut kernel, "cat /nope && echo after").await;
    assert_eq!(out, "cat: '/nope': No such file or directory\nafter\n");
}

#[tokio::test]
async fn test_syntax_errors_are_reported() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    let out = run(&mut shell, &mut kernel, "| wc").await;
    assert!(out.starts_with("shell: syntax error"), "{out}");
    let out = run(&mut shell, &mut kernel, "echo hi >").await;
    assert!(out.starts_with("shell: syntax error"), "{out}");
}

#[tokio::test]
async fn test_alias_and_unalias() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();

    run(&mut shell, &mut kernel, "alias greet='echo hello'").await;
    assert_eq!(shell.aliases().get("greet"), Some("echo hello"));
    assert_eq!(run(&mut shell, &mut kernel, "greet world").await, "hello world");
    assert_eq!(
        run(&mut shell, &mut kernel, "alias").await,
        "alias greet='echo hello'\n"
    );

    run(&mut shell, &mut kernel, "unalias greet").await;
    assert_eq!(
        run(&mut shell, &mut kernel, "greet").await,
        "greet: command not found\n"
    );
}

#[tokio::test]
async fn test_env_and_home_expansion() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    assert_eq!(
        run(&mut shell, &mut kernel, "export GREETING=hi && echo $GREETING $USER").await,
        "hi root\n"
    );
    run(&mut shell, &mut kernel, "cd /tmp").await;
    assert_eq!(run(&mut shell, &mut kernel, "cd ~ && pwd").await, "/root\n");
}

#[tokio::test]
async fn test_run_script_stops_when_last_session_exits() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    let script = "cd /tmp\npwd\n\nexit\necho never\n";
    shell
        .run_script(&mut kernel, script.as_bytes())
        .await
        .expect("script");
    assert_eq!(String::from_utf8_lossy(shell.output()), "/tmp\n");
    assert!(kernel.sessions().is_empty());
}

#[tokio::test]
async fn test_prompt() {
    let mut kernel = create_test_kernel(&[]);
    let mut shell = create_test_shell();
    assert_eq!(shell.prompt(&kernel), "root@localhost:~# ");
    run(&mut shell, &mut kernel, "cd /var/log").await;
    assert_eq!(shell.prompt(&kernel), "root@localhost:/var/log# ");
}
