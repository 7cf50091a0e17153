// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Command-line parsing: tokens, stages and the operators joining them.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("syntax error near unexpected token '{0}'")]
    UnexpectedOperator(String),
    #[error("syntax error: missing file name after '{0}'")]
    MissingTarget(String),
}

/// What happens to a stage's output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    /// Last stage: output goes to the terminal
    End,
    /// `|`: output becomes trailing arguments of the next stage
    Pipe,
    /// `>` or `>>` into `target`
    Redirect { target: String, append: bool },
}

/// One command segment. `argv[0]` is the command name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
    pub link: Link,
}

impl Stage {
    /// Output is captured rather than shown
    pub fn pipes(&self) -> bool {
        !matches!(self.link, Link::End)
    }
}

/// A stage argument: a word typed on the line, or the token list carried
/// from the previous stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg {
    Word(String),
    List(Vec<String>),
}

/// Flatten nested lists exactly one level.
pub fn flatten(args: Vec<Arg>) -> Vec<String> {
    let mut flat = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Arg::Word(word) => flat.push(word),
            Arg::List(list) => flat.extend(list),
        }
    }
    flat
}

/// Split on whitespace, dropping empty tokens. A `~` word or `~/` prefix
/// becomes `home` when one is known.
pub fn tokenize(line: &str, home: Option<&str>) -> Vec<String> {
    line.split_whitespace()
        .map(|token| match home {
            Some(home) if token == "~" => home.to_string(),
            Some(home) if token.starts_with("~/") => format!("{}{}", home, &token[1..]),
            _ => token.to_string(),
        })
        .collect()
}

fn is_operator(token: &str) -> bool {
    matches!(token, "|" | ">" | ">>")
}

/// Group tokens into stages.
///
/// A redirect consumes the next token as its target, with embedded spaces
/// removed. Whatever follows the target starts a new stage.
pub fn parse_pipeline(tokens: &[String]) -> Result<Vec<Stage>, PipelineError> {
    let mut stages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        if !is_operator(token) {
            current.push(token.clone());
            continue;
        }
        if current.is_empty() {
            return Err(PipelineError::UnexpectedOperator(token.clone()));
        }
        let link = match token.as_str() {
            "|" => Link::Pipe,
            op => {
                let target = iter
                    .next()
                    .filter(|t| !is_operator(t))
                    .ok_or_else(|| PipelineError::MissingTarget(op.to_string()))?;
                Link::Redirect {
                    target: target.replace(' ', ""),
                    append: op == ">>",
                }
            }
        };
        stages.push(Stage {
            argv: std::mem::take(&mut current),
            link,
        });
    }

    match (current.is_empty(), stages.last()) {
        (false, _) => stages.push(Stage {
            argv: current,
            link: Link::End,
        }),
        (true, Some(Stage { link: Link::Pipe, .. })) => {
            return Err(PipelineError::UnexpectedOperator("|".to_string()));
        }
        (true, _) => {}
    }
    Ok(stages)
}

/// Strip one pair of surrounding double quotes.
pub fn unquote(text: &str) -> &str {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}
