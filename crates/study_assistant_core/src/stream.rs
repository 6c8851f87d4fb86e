//! crates/study_assistant_core/src/stream.rs
//!
//! Accumulates a streamed completion into the text shown to the student.

use crate::domain::ModelChoice;

const THOUGHT_OPEN: &str = "<think>";
const THOUGHT_CLOSE: &str = "</think>";

/// A finished reply, ready to be committed to history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// The reasoning model's thought block, kept out of `text`.
    pub thought: Option<String>,
}

/// Splits a reasoning model's output into its thought block and the visible answer.
///
/// An unclosed block swallows everything after its opening tag, which is what
/// a partially streamed reply looks like mid-thought.
pub fn split_thought(raw: &str) -> (Option<String>, String) {
    let Some(open) = raw.find(THOUGHT_OPEN) else {
        return (None, raw.to_string());
    };
    let before = &raw[..open];
    let rest = &raw[open + THOUGHT_OPEN.len()..];
    match rest.find(THOUGHT_CLOSE) {
        Some(close) => {
            let thought = rest[..close].trim().to_string();
            let after = &rest[close + THOUGHT_CLOSE.len()..];
            let visible = format!("{}{}", before, after);
            ((!thought.is_empty()).then_some(thought), visible)
        }
        None => {
            let thought = rest.trim().to_string();
            ((!thought.is_empty()).then_some(thought), before.to_string())
        }
    }
}

/// Length of the longest suffix of `text` that could still grow into `tag`.
fn partial_tag_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| text.ends_with(&tag[..n]))
        .unwrap_or(0)
}

/// Concatenates streamed fragments in arrival order.
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    raw: String,
    strip_thoughts: bool,
}

impl ReplyAccumulator {
    pub fn new(model: ModelChoice) -> Self {
        Self {
            raw: String::new(),
            strip_thoughts: model == ModelChoice::Reasoning,
        }
    }

    /// Appends a fragment and returns the running buffer as it should be displayed.
    ///
    /// For the reasoning model a trailing fragment of an opening `<think>` tag
    /// is held back until the tag either completes or turns out to be text.
    pub fn push(&mut self, fragment: &str) -> String {
        self.raw.push_str(fragment);
        if self.strip_thoughts {
            let mut visible = split_thought(&self.raw).1;
            let held = partial_tag_len(&visible, THOUGHT_OPEN);
            visible.truncate(visible.len() - held);
            visible
        } else {
            self.raw.clone()
        }
    }

    /// True when nothing visible to the student has arrived.
    pub fn is_empty(&self) -> bool {
        if self.strip_thoughts {
            split_thought(&self.raw).1.trim().is_empty()
        } else {
            self.raw.trim().is_empty()
        }
    }

    /// Finalizes the reply, trimming leading and trailing whitespace.
    pub fn finish(self) -> Reply {
        if self.strip_thoughts {
            let (thought, visible) = split_thought(&self.raw);
            Reply {
                text: visible.trim().to_string(),
                thought,
            }
        } else {
            Reply {
                text: self.raw.trim().to_string(),
                thought: None,
            }
        }
    }
}
