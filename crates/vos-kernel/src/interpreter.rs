// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::syscall::SyscallPort;

/// Runs the source text of an executable.
///
/// Called on a blocking thread. Everything the program does to the system
/// goes through `port`. The return value is the exit code before masking;
/// a panic is reported as a fault.
#[cfg_attr(test, mockall::automock)]
pub trait Interpreter: Send + Sync {
    fn execute(&self, source: &str, argv: &[String], port: &SyscallPort) -> i32;
}

impl<F> Interpreter for F
where
    F: Fn(&str, &[String], &SyscallPort) -> i32 + Send + Sync,
{
    fn execute(&self, source: &str, argv: &[String], port: &SyscallPort) -> i32 {
        self(source, argv, port)
    }
}

/// Interpreter that understands nothing and exits 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullInterpreter;

impl Interpreter for NullInterpreter {
    fn execute(&self, _source: &str, _argv: &[String], _port: &SyscallPort) -> i32 {
        0
    }
}
