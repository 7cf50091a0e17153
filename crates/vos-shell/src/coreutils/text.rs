// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::command::{Command, CommandOutcome, ExecContext, Invocation};

use super::Report;

/// `echo [WORD]...`, expanding `$NAME` from the session environment.
pub struct Echo;

impl Command for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let words: Vec<String> = inv
            .argv
            .iter()
            .map(|word| match word.strip_prefix('$') {
                Some(name) if !name.is_empty() => ctx.kernel().getenv(name).unwrap_or_default(),
                _ => word.clone(),
            })
            .collect();
        CommandOutcome::ok(words.join(" "))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counts {
    lines: usize,
    words: usize,
    bytes: usize,
}

impl Counts {
    fn of(text: &str) -> Self {
        Self {
            lines: text.matches('\n').count(),
            words: text.split_whitespace().count(),
            bytes: text.len(),
        }
    }

    fn add(&mut self, other: Counts) {
        self.lines += other.lines;
        self.words += other.words;
        self.bytes += other.bytes;
    }

    fn render(&self, inv: &Invocation, label: &str) -> String {
        let (l, w, c) = (inv.has_flag('l'), inv.has_flag('w'), inv.has_flag('c'));
        let all = !(l || w || c);
        let mut fields = Vec::new();
        if all || l {
            fields.push(self.lines.to_string());
        }
        if all || w {
            fields.push(self.words.to_string());
        }
        if all || c {
            fields.push(self.bytes.to_string());
        }
        if !label.is_empty() {
            fields.push(label.to_string());
        }
        fields.join(" ")
    }
}

/// `wc [-lwc] [FILE]...`
///
/// Piped tokens are counted as one line of text when no file is named.
pub struct Wc;

impl Command for Wc {
    fn name(&self) -> &'static str {
        "wc"
    }

    fn run(&self, ctx: &mut ExecContext<'_>, inv: &Invocation) -> CommandOutcome {
        let files: Vec<&String> = inv.own_args().iter().filter(|a| !a.starts_with('-')).collect();
        if files.is_empty() {
            if inv.piped == 0 {
                return CommandOutcome::usage("wc", "[-lwc] FILE...");
            }
            let text = format!("{}\n", inv.piped_args().join(" "));
            return CommandOutcome::ok(Counts::of(&text).render(inv, ""));
        }

        let mut report = Report::default();
        let mut total = Counts::default();
        for file in &files {
            match ctx.with_actor(|kernel, actor| kernel.read_to_string(actor, file)) {
                Ok(text) => {
                    let counts = Counts::of(&text);
                    total.add(counts);
                    report.line(counts.render(inv, file));
                }
                Err(err) => report.fail("wc", file, &err),
            }
        }
        if files.len() > 1 {
            report.line(total.render(inv, "total"));
        }
        report.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let counts = Counts::of("one two\nthree\n");
        assert_eq!(
            counts,
            Counts {
                lines: 2,
                words: 3,
                bytes: 14
            }
        );
    }

    #[test]
    fn test_render_selected_fields() {
        let counts = Counts {
            lines: 1,
            words: 2,
            bytes: 9,
        };
        assert_eq!(counts.render(&Invocation::new(vec![]), "f"), "1 2 9 f");
        assert_eq!(counts.render(&Invocation::new(vec!["-w".into()]), ""), "2");
        assert_eq!(
            counts.render(&Invocation::new(vec!["-lc".into()]), "f"),
            "1 9 f"
        );
    }
}
