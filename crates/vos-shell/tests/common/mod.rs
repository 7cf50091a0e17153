// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared fixtures for the shell integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use vos_kernel::{Actor, Credentials, Interpreter, Kernel, KernelConfig, SyscallPort};
use vos_shell::Shell;

/// `print TEXT`, `argv`, `whoami`, `exit N`; one statement per line.
pub fn script_interpreter(source: &str, argv: &[String], port: &SyscallPort) -> i32 {
    for line in source.lines() {
        let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
        let printed = match op {
            "print" => port.print(format!("{}\n", rest)),
            "argv" => port.print(format!("{}\n", argv.join(" "))),
            "whoami" => match port.geteuid() {
                Ok(euid) => port.print(format!("{}\n", euid)),
                Err(err) => Err(err),
            },
            "exit" => return rest.parse().unwrap_or(1),
            _ => Ok(()),
        };
        if printed.is_err() {
            return 1;
        }
    }
    0
}

/// Kernel with `programs` in `/bin` and root logged in at `/root`.
pub fn create_test_kernel(programs: &[(&str, &str)]) -> Kernel {
    let mut config = KernelConfig::default();
    for (name, source) in programs {
        config.programs.insert(name.to_string(), source.to_string());
    }
    let interpreter: Arc<dyn Interpreter> = Arc::new(script_interpreter);
    let mut kernel = Kernel::new(config, interpreter).expect("kernel should build");
    kernel.login("root", "password").expect("root login");
    kernel
}

pub fn create_test_shell() -> Shell<Vec<u8>> {
    Shell::new(Vec::new())
}

/// Run one line and return only what it printed.
pub async fn run(shell: &mut Shell<Vec<u8>>, kernel: &mut Kernel, line: &str) -> String {
    let start = shell.output().len();
    shell
        .execute_line(kernel, line)
        .await
        .expect("line should execute");
    String::from_utf8_lossy(&shell.output()[start..]).into_owned()
}

/// Read a file with root's credentials, bypassing the shell.
pub fn read_as_root(kernel: &mut Kernel, path: &str) -> String {
    let root = Credentials::root();
    let actor = Actor::new(&root, kernel.vfs().root());
    kernel.read_to_string(actor, path).expect("file should be readable")
}
