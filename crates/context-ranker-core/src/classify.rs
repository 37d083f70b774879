//! Keyword-based task classification for queries.
//!
//! A pure function over normalized query terms. Keyword tables go through
//! the same [`normalize`] as the query, so inflected Hebrew forms
//! (`סיכום`, `הסיכום`) and final letters match their table entries.
//! When several kinds match, the first one in [`TaskKind::ALL`] wins.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Code,
    Summarize,
    Compare,
    Explain,
    General,
}

impl TaskKind {
    /// Kinds in match priority order; `General` is the fallback.
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Code,
        TaskKind::Summarize,
        TaskKind::Compare,
        TaskKind::Explain,
        TaskKind::General,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            TaskKind::Code => &[
                "code", "function", "script", "bug", "compile", "python", "rust", "javascript",
                "קוד", "פונקציה", "סקריפט", "באג", "תכנות", "תוכנה",
            ],
            TaskKind::Summarize => &[
                "summary", "summarize", "summarise", "tldr", "סכם", "סיכום", "תקציר", "תמצית",
            ],
            TaskKind::Compare => &[
                "compare", "comparison", "versus", "vs", "difference", "השווה", "השוואה", "הבדל",
                "ההבדל", "לעומת",
            ],
            TaskKind::Explain => &[
                "explain", "why", "how", "what", "הסבר", "ההסבר", "הסבירו", "למה", "מדוע", "איך",
                "מה",
            ],
            TaskKind::General => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Code => "code",
            TaskKind::Summarize => "summarize",
            TaskKind::Compare => "compare",
            TaskKind::Explain => "explain",
            TaskKind::General => "general",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a free-text query.
///
/// ```rust
/// use context_ranker_core::classify::{classify, TaskKind};
///
/// assert_eq!(classify("please summarize chapter 3"), TaskKind::Summarize);
/// assert_eq!(classify("טטריס"), TaskKind::General);
/// ```
pub fn classify(query: &str) -> TaskKind {
    let terms: HashSet<String> = normalize(query).into_iter().collect();
    if terms.is_empty() {
        return TaskKind::General;
    }
    TaskKind::ALL
        .into_iter()
        .find(|kind| {
            kind.keywords()
                .iter()
                .flat_map(|k| normalize(k))
                .any(|k| terms.contains(&k))
        })
        .unwrap_or(TaskKind::General)
}
