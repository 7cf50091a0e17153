// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared fixtures for the kernel integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use vos_kernel::{Interpreter, Kernel, KernelConfig, Syscall, SyscallPort};

/// A line-oriented toy language driving the syscall port.
///
/// `print TEXT`, `exit N`, `panic`, `exec PATH`, `euid`, `cwd`,
/// `read PATH`, `write PATH TEXT`, `argv`, `kill-self`.
pub fn toy_interpreter(source: &str, argv: &[String], port: &SyscallPort) -> i32 {
    for line in source.lines() {
        let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
        match op {
            "print" => {
                if port.print(format!("{}\n", rest)).is_err() {
                    return 1;
                }
            }
            "exit" => return rest.parse().unwrap_or(1),
            "panic" => panic!("program crashed"),
            "exec" => match port.execve(rest, vec![rest.to_string()]) {
                Ok(code) => {
                    let _ = port.print(format!("child {}\n", code));
                }
                Err(err) => {
                    let _ = port.print(format!("exec: {}\n", err));
                    return 2;
                }
            },
            "euid" => {
                let euid = port.geteuid().map(|e| e.to_string()).unwrap_or_default();
                let _ = port.print(format!("{}\n", euid));
            }
            "cwd" => {
                let cwd = port
                    .call(Syscall::Getcwd)
                    .and_then(|v| v.into_text())
                    .unwrap_or_default();
                let _ = port.print(format!("{}\n", cwd));
            }
            "read" => match port.read_to_string(rest) {
                Ok(text) => {
                    let _ = port.print(text);
                }
                Err(err) => {
                    let _ = port.print(format!("{}\n", err));
                    return 1;
                }
            },
            "write" => {
                let (path, text) = rest.split_once(' ').unwrap_or((rest, ""));
                if port.write(path, text).is_err() {
                    return 1;
                }
            }
            "argv" => {
                let _ = port.print(format!("{}\n", argv.join(" ")));
            }
            "kill-self" => {
                let _ = port.call(Syscall::Kill(port.pid()));
            }
            _ => {}
        }
    }
    0
}

/// Kernel with `programs` installed in `/bin` and root logged in.
pub fn create_test_kernel(programs: &[(&str, &str)]) -> Kernel {
    let mut config = KernelConfig::default();
    for (name, source) in programs {
        config.programs.insert(name.to_string(), source.to_string());
    }
    let interpreter: Arc<dyn Interpreter> = Arc::new(toy_interpreter);
    let mut kernel = Kernel::new(config, interpreter).expect("kernel should build");
    kernel.login("root", "password").expect("root login");
    kernel
}
