//! Read-only command classifier.
//!
//! A command is admitted to a read tool only when every simple command in
//! every pipeline stage is on the read-only allowlist (or passes a
//! subcommand rule), and no stage redirects output to a file. Anything the
//! classifier cannot fully understand is [`CommandIntent::WriteOrUnknown`].

mod rules;
pub(crate) mod tokenize;

use serde::Serialize;
use std::fmt;

use tokenize::{LexError, tokenize};

/// Outcome class for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandIntent {
    /// Safe to run as-is.
    ReadOnlyCertain,
    /// Read-only under a documented bound; run the rewrite when one is given.
    ReadOnlyConditional,
    /// Writes, or cannot be proven not to.
    WriteOrUnknown,
}

/// Why a command was refused, for recovery guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    /// `-i` / `-t` flags that wait for a terminal.
    TtyFlag,
    /// `less`, `more`, `man`.
    Pager,
    /// `tail -f`, `watch`, `docker logs -f` and friends.
    UnboundedStream,
    /// Bare interpreters, database shells, editors.
    InteractiveRepl,
    /// Output written to a file.
    Redirect,
    /// `$(...)`, backticks, process substitution.
    Substitution,
    /// `sudo`, `su`, `doas`.
    Privilege,
    /// A known mutating binary or subcommand.
    WriteVerb,
    /// Not on the allowlist.
    UnknownBinary,
}

impl BlockCategory {
    /// Wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TtyFlag => "tty_flag",
            Self::Pager => "pager",
            Self::UnboundedStream => "unbounded_stream",
            Self::InteractiveRepl => "interactive_repl",
            Self::Redirect => "redirect",
            Self::Substitution => "substitution",
            Self::Privilege => "privilege",
            Self::WriteVerb => "write_verb",
            Self::UnknownBinary => "unknown_binary",
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier verdict for a full command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Outcome class.
    pub intent: CommandIntent,
    /// Human-readable reason from the deciding stage.
    pub reason: String,
    /// Refusal category, when one applies.
    pub category: Option<BlockCategory>,
    /// A command that would be accepted instead.
    pub suggested_rewrite: Option<String>,
    /// Whether retrying with `suggested_rewrite` resolves the refusal.
    pub auto_recoverable: bool,
}

impl Classification {
    /// Whether a read tool may run this command (or its rewrite).
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.intent != CommandIntent::WriteOrUnknown
    }

    fn refused(reason: impl Into<String>, category: Option<BlockCategory>) -> Self {
        Self {
            intent: CommandIntent::WriteOrUnknown,
            reason: reason.into(),
            category,
            suggested_rewrite: None,
            auto_recoverable: false,
        }
    }
}

/// Classify a shell command.
///
/// Pipelines and `&&` / `||` / `;` sequences are read-only only when every
/// stage is. The first stage with the worst intent supplies the reason. A
/// rewrite is offered only when every non-certain stage has one.
#[must_use]
pub fn classify(command: &str) -> Classification {
    let command = command.trim();
    if command.is_empty() {
        return Classification::refused("empty command", None);
    }

    let parsed = match tokenize(command) {
        Ok(parsed) => parsed,
        Err(err) => return Classification::refused(err.reason(), lex_category(err)),
    };
    if parsed.segments.is_empty() {
        return Classification::refused("empty command", None);
    }

    let verdicts: Vec<rules::Verdict> = parsed
        .segments
        .iter()
        .map(rules::classify_segment)
        .collect();

    let mut worst = &verdicts[0];
    for v in &verdicts {
        if v.intent > worst.intent {
            worst = v;
        }
    }

    let rewritable = worst.intent != CommandIntent::ReadOnlyCertain
        && verdicts
            .iter()
            .any(|v| v.intent != CommandIntent::ReadOnlyCertain && v.rewrite.is_some())
        && verdicts
            .iter()
            .all(|v| v.intent == CommandIntent::ReadOnlyCertain || v.rewrite.is_some());
    let suggested_rewrite = rewritable.then(|| {
        let rewrites: Vec<Option<String>> = verdicts.iter().map(|v| v.rewrite.clone()).collect();
        parsed.rebuild(&rewrites)
    });

    Classification {
        intent: worst.intent,
        reason: worst.reason.clone(),
        category: worst.category,
        auto_recoverable: suggested_rewrite.is_some(),
        suggested_rewrite,
    }
}

fn lex_category(err: LexError) -> Option<BlockCategory> {
    match err {
        LexError::Substitution | LexError::ProcessSubstitution => Some(BlockCategory::Substitution),
        LexError::Heredoc | LexError::InputRedirect | LexError::DanglingRedirect => {
            Some(BlockCategory::Redirect)
        },
        LexError::Background
        | LexError::UnterminatedQuote
        | LexError::Subshell
        | LexError::EmptyStage => None,
    }
}

#[cfg(test)]
mod tests;
