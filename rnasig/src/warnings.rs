//! Accumulating, caller-visible log of non-fatal range violations.

use std::fmt;

use tracing::warn;

/// Append-only list of human-readable warnings. Entries are also emitted
/// as `tracing` warnings when recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningLog {
    entries: Vec<String>,
}

impl WarningLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.entries.push(message);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// True if any entry contains `needle`, ignoring ASCII case.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.entries.iter().any(|e| e.to_ascii_lowercase().contains(&needle))
    }
}

impl Extend<String> for WarningLog {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for message in iter {
            self.push(message);
        }
    }
}

impl fmt::Display for WarningLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entries.join("\n"))
    }
}
