//! Board-list state for dashboard and board-list views.
//!
//! DESIGN
//! ======
//! Boards are fetched per view and never persisted; this state only lives as
//! long as the view that owns it.

#[cfg(test)]
#[path = "boards_test.rs"]
mod boards_test;

use crate::net::types::{Board, BoardList};

#[derive(Clone, Debug, Default)]
pub struct BoardsState {
    pub items: Vec<Board>,
    pub loading: bool,
    pub error: Option<String>,
}

impl BoardsState {
    /// Mark a fetch as in flight, keeping the current items and error until it lands.
    pub fn begin(&mut self) {
        self.loading = true;
    }

    /// Replace the list with a fresh fetch result.
    pub fn apply(&mut self, result: Result<BoardList, String>) {
        self.loading = false;
        match result {
            Ok(list) => {
                self.items = list.boards;
                self.error = None;
            }
            Err(message) => {
                self.items.clear();
                self.error = Some(message);
            }
        }
    }

    /// Boards whose name or description contains `query`, ignoring case.
    pub fn filtered(&self, query: &str) -> Vec<&Board> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|board| {
                board.name.to_lowercase().contains(&needle)
                    || board
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect()
    }
}
