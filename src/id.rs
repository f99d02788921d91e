//! Node identifier classification and blank-node allocation

use crate::vocab::{BLANK_PREFIX, BLANK_WIDTH, HEADER_ID};

/// Classification of a node @id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdKind {
    /// The document entry point: "#__header__"
    Header,
    /// Synthesized blank node: "_:b00001"
    Blank,
    /// Any identifier supplied by the document author
    Named,
}

/// Classify an @id string
pub fn classify_id(id: &str) -> IdKind {
    if id == HEADER_ID {
        IdKind::Header
    } else if id.starts_with(BLANK_PREFIX) {
        IdKind::Blank
    } else {
        IdKind::Named
    }
}

/// Monotonic allocator for blank-node identifiers
///
/// Produces `_:b00001`, `_:b00002`, ... and never hands out the same value
/// twice. Each parsing session owns its own allocator, so numbering never
/// leaks between independent stores.
#[derive(Debug, Clone, Default)]
pub struct BlankNodeAllocator {
    counter: u64,
}

impl BlankNodeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier in sequence
    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}{:0>width$}", BLANK_PREFIX, self.counter, width = BLANK_WIDTH)
    }

    /// Next identifier for which `taken` returns false
    ///
    /// Skipped values are consumed, so allocation stays monotonic.
    pub fn next_free(&mut self, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let id = self.next_id();
            if !taken(&id) {
                return id;
            }
        }
    }
}
