// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Interactive shell for the simulated OS.
//!
//! A command line is split on `&&`, each part is parsed into pipeline
//! stages, and every stage is dispatched to a builtin, an alias, a
//! registered command or a program loaded from the filesystem.

pub mod alias;
pub mod command;
pub mod coreutils;
pub mod pipeline;
pub mod shell;

pub use alias::AliasTable;
pub use command::{Command, CommandOutcome, CommandRegistry, ExecContext, Invocation};
pub use pipeline::{Arg, Link, PipelineError, Stage, flatten, parse_pipeline, tokenize};
pub use shell::Shell;
