//! Query history with editor-style navigation
//!
//! Newest-first list of executed queries. Re-running a query moves it to the
//! front instead of duplicating it, and the list is capped. The list itself
//! is stored in the preferences file under `query_history`; this type owns
//! the ordering rules and the back/forward browsing state used by the shell.
//!
//! Browsing saves the current editor content as a "draft" when it starts and
//! hands it back when navigating past the newest entry.

/// Maximum number of remembered queries
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct QueryHistory {
    /// `entries[0]` is the most recent query
    entries: Vec<String>,
    capacity: usize,
    /// `None` = not browsing, `Some(i)` = showing `entries[i]`
    position: Option<usize>,
    /// Editor content saved when entering browse mode
    draft: Option<String>,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "QueryHistory capacity must be > 0");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            position: None,
            draft: None,
        }
    }

    /// Rebuild from a stored newest-first list, enforcing dedup and capacity.
    pub fn from_entries(entries: Vec<String>, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        // Oldest first so the newest ends up at the front
        for entry in entries.into_iter().rev() {
            history.record(entry);
        }
        history
    }

    /// Record an executed query. Skips empty text; an existing identical
    /// entry is moved to the front; the oldest entry falls off at capacity.
    /// Returns false when nothing was recorded.
    pub fn push(&mut self, query: &str) -> bool {
        let recorded = self.record(query.to_string());
        self.reset_position();
        recorded
    }

    fn record(&mut self, query: String) -> bool {
        if query.trim().is_empty() {
            return false;
        }
        self.entries.retain(|e| *e != query);
        self.entries.insert(0, query);
        self.entries.truncate(self.capacity);
        true
    }

    /// Newest-first view of the entries
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reset_position();
    }

    /// Navigate to an older entry. On first call, saves `current_content` as draft.
    /// Returns `None` when already at the oldest entry.
    pub fn back(&mut self, current_content: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let new_pos = match self.position {
            None => {
                self.draft = Some(current_content.to_string());
                0
            }
            Some(p) if p + 1 >= self.entries.len() => return None,
            Some(p) => p + 1,
        };
        self.position = Some(new_pos);
        Some(&self.entries[new_pos])
    }

    /// Navigate to a newer entry. When moving past the newest,
    /// restores the draft and exits browse mode.
    /// Returns `None` when not browsing.
    pub fn forward(&mut self) -> Option<&str> {
        let pos = self.position?;
        if pos > 0 {
            self.position = Some(pos - 1);
            Some(&self.entries[pos - 1])
        } else {
            self.position = None;
            self.draft.as_deref()
        }
    }

    pub fn is_browsing(&self) -> bool {
        self.position.is_some()
    }

    fn reset_position(&mut self) {
        self.position = None;
        self.draft = None;
    }
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
