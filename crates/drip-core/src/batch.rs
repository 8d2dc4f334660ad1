//! Message batches parsed from newline-delimited text.
//!
//! A batch is an ordered list of non-empty lines. It is immutable once
//! built — the dispatch loop cycles over the same lines for the lifetime
//! of a job.

use serde::{Deserialize, Serialize};

/// Ordered, immutable sequence of non-empty message lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBatch(Vec<String>);

impl MessageBatch {
    /// Parse a batch from newline-delimited text.
    ///
    /// Lines are kept in order; blank and whitespace-only lines are
    /// dropped. Surrounding whitespace on each line is trimmed. The
    /// result may be empty — validation of emptiness is the dispatcher's
    /// job, so the caller gets a precise error there.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// Build a batch from pre-split lines (test helper and programmatic use).
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(lines.into_iter().map(Into::into).collect())
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the batch has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the lines in batch order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
