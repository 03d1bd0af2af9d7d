//! Shared conversation context threaded through a session.
//!
//! The transcript is an ordered list of attributed notes: the original
//! request, supervisor briefings, worker summaries, verification verdicts.
//! Each dispatched task receives its own clone, so no two workers ever write
//! to the same transcript; the orchestrator extends the master copy only
//! after the dispatch barrier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One attributed entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Who produced the entry: "user", "supervisor", "validator", or a
    /// worker name such as "unit-tester".
    pub author: String,
    pub content: String,
}

impl Note {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }
}

/// Ordered, append-only conversation context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    notes: Vec<Note>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transcript from the user's original request.
    pub fn from_request(request: impl Into<String>) -> Self {
        let mut t = Self::new();
        t.push("user", request);
        t
    }

    pub fn push(&mut self, author: impl Into<String>, content: impl Into<String>) {
        self.notes.push(Note::new(author, content));
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The most recent note, if any.
    pub fn last(&self) -> Option<&Note> {
        self.notes.last()
    }

    /// Render the transcript as prompt-ready text, one attributed block per
    /// note.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for note in &self.notes {
            out.push_str(&format!("[{}]\n{}\n\n", note.author, note.content));
        }
        out
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
