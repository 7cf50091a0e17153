// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-shell alias table. Aliases live only as long as the shell that
//! defined them.

use std::collections::BTreeMap;

use vos_kernel::ErrorKind;

use crate::command::CommandOutcome;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace an aliased leading word with its expansion, once.
    ///
    /// The first word of the expansion is not looked up again, so
    /// `alias ls='ls -a'` does not recurse.
    pub fn expand(&self, name: &str, args: Vec<String>) -> (String, Vec<String>) {
        let Some(value) = self.get(name) else {
            return (name.to_string(), args);
        };
        let mut words = value.split_whitespace().map(str::to_string);
        match words.next() {
            Some(head) => (head, words.chain(args).collect()),
            None => (name.to_string(), args),
        }
    }

    /// The `alias` builtin. `args` are the words after `alias`.
    pub fn alias_builtin(&mut self, args: &[String]) -> CommandOutcome {
        if args.is_empty() {
            let listing: Vec<String> = self
                .entries
                .iter()
                .map(|(name, value)| format!("alias {}='{}'", name, value))
                .collect();
            return CommandOutcome::ok(listing.join("\n"));
        }

        // Values may contain spaces, so rejoin before splitting on '='.
        let text = args.join(" ");
        let Some((name, value)) = text.split_once('=') else {
            return match self.get(&text) {
                Some(value) => CommandOutcome::ok(format!("alias {}='{}'", text, value)),
                None => CommandOutcome::fail(
                    ErrorKind::InvalidArgument,
                    format!("alias: {}: not found", text),
                ),
            };
        };
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return CommandOutcome::fail(
                ErrorKind::InvalidArgument,
                format!("alias: '{}': invalid alias name", name),
            );
        }
        self.set(name, strip_quotes(value.trim()));
        CommandOutcome::empty()
    }

    /// The `unalias` builtin; `-a` removes everything.
    pub fn unalias_builtin(&mut self, args: &[String]) -> CommandOutcome {
        if args.is_empty() {
            return CommandOutcome::usage("unalias", "[-a] name [name ...]");
        }
        if args.iter().any(|a| a == "-a") {
            self.clear();
            return CommandOutcome::empty();
        }
        let missing: Vec<&str> = args
            .iter()
            .filter(|name| self.remove(name).is_none())
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            CommandOutcome::empty()
        } else {
            let lines: Vec<String> =
                missing.iter().map(|name| format!("unalias: {}: not found", name)).collect();
            CommandOutcome::fail(ErrorKind::InvalidArgument, lines.join("\n"))
        }
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
