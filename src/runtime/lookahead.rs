//! One-result lookahead buffer shared by every iterator

use crate::errors::{EngineError, EngineResult};

/// Open/closed state plus the next pending result
#[derive(Debug, Clone)]
pub struct Lookahead<T> {
    pending: Option<T>,
    open: bool,
}

impl<T> Default for Lookahead<T> {
    fn default() -> Self {
        Self {
            pending: None,
            open: false,
        }
    }
}

impl<T> Lookahead<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the iterator open with its first result
    pub fn opened(&mut self, first: Option<T>) {
        self.open = true;
        self.pending = first;
    }

    pub fn has_next(&self) -> bool {
        self.open && self.pending.is_some()
    }

    /// Hands out the pending result; fails if there is none
    pub fn take(&mut self, iterator: &str) -> EngineResult<T> {
        if !self.open {
            return Err(EngineError::flow(format!(
                "next() called on closed iterator {}",
                iterator
            )));
        }
        self.pending
            .take()
            .ok_or_else(|| EngineError::exhausted(iterator))
    }

    pub fn refill(&mut self, next: Option<T>) {
        self.pending = next;
    }

    pub fn closed(&mut self) {
        self.open = false;
        self.pending = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_and_exhaust() {
        let mut lookahead = Lookahead::new();
        assert!(!lookahead.has_next());
        lookahead.opened(Some(1));
        assert!(lookahead.has_next());
        assert_eq!(lookahead.take("t").unwrap(), 1);
        assert!(!lookahead.has_next());
        assert!(lookahead.take("t").unwrap_err().is_fatal());
    }

    #[test]
    fn test_closed_take_is_flow_error() {
        let mut lookahead: Lookahead<u8> = Lookahead::new();
        assert!(lookahead.take("t").is_err());
        lookahead.opened(Some(1));
        lookahead.closed();
        assert!(!lookahead.is_open());
        assert!(lookahead.take("t").is_err());
    }
}
