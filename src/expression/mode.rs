//! Execution modes
//!
//! A mode names the physical strategy class of a node. It is computed once
//! by the static analysis pass and never changes afterwards.

use std::fmt;
use std::sync::OnceLock;

use crate::errors::{EngineError, EngineResult};

/// Physical strategy class, ordered from least to most distributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecutionMode {
    /// Not computed yet
    Unset,
    /// Pull-based evaluation on the host
    Local,
    /// Bulk transforms over a row-distributed collection
    ParallelRowWise,
    /// Bulk transforms over a columnar frame
    ParallelColumnar,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Unset => "UNSET",
            ExecutionMode::Local => "LOCAL",
            ExecutionMode::ParallelRowWise => "PARALLEL_ROWWISE",
            ExecutionMode::ParallelColumnar => "PARALLEL_COLUMNAR",
        }
    }

    pub fn is_local(&self) -> bool {
        *self == ExecutionMode::Local
    }

    pub fn is_parallel(&self) -> bool {
        matches!(
            self,
            ExecutionMode::ParallelRowWise | ExecutionMode::ParallelColumnar
        )
    }

    pub fn is_columnar(&self) -> bool {
        *self == ExecutionMode::ParallelColumnar
    }

    /// Parallel inputs become row-wise; local stays local
    pub fn row_wise(&self) -> ExecutionMode {
        if self.is_parallel() {
            ExecutionMode::ParallelRowWise
        } else {
            ExecutionMode::Local
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Write-once slot holding a node's execution mode
#[derive(Default)]
pub struct ModeCell(OnceLock<ExecutionMode>);

impl ModeCell {
    /// Records the computed mode; a second write is ignored
    pub fn set(&self, mode: ExecutionMode) -> ExecutionMode {
        *self.0.get_or_init(|| mode)
    }

    /// Reads the mode, failing if analysis has not run
    pub fn get(&self, node: &str) -> EngineResult<ExecutionMode> {
        match self.0.get() {
            Some(mode) => Ok(*mode),
            None => Err(EngineError::flow(format!(
                "Execution mode of {} read before it was computed",
                node
            ))),
        }
    }

    /// Reads the mode for diagnostics, reporting Unset when not computed
    pub fn get_tolerating_unset(&self) -> ExecutionMode {
        self.0.get().copied().unwrap_or(ExecutionMode::Unset)
    }

    pub fn is_computed(&self) -> bool {
        self.0.get().is_some()
    }
}

impl Clone for ModeCell {
    fn clone(&self) -> Self {
        let cell = ModeCell::default();
        if let Some(mode) = self.0.get() {
            cell.set(*mode);
        }
        cell
    }
}

impl fmt::Debug for ModeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_tolerating_unset())
    }
}

impl PartialEq for ModeCell {
    fn eq(&self, other: &Self) -> bool {
        self.get_tolerating_unset() == other.get_tolerating_unset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_ordering() {
        assert!(ExecutionMode::Unset < ExecutionMode::Local);
        assert!(ExecutionMode::Local < ExecutionMode::ParallelRowWise);
        assert!(ExecutionMode::ParallelRowWise < ExecutionMode::ParallelColumnar);
    }

    #[test]
    fn test_unset_read_is_flow_error() {
        let cell = ModeCell::default();
        let err = cell.get("literal").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(cell.get_tolerating_unset(), ExecutionMode::Unset);
    }

    #[test]
    fn test_mode_is_write_once() {
        let cell = ModeCell::default();
        assert_eq!(cell.set(ExecutionMode::ParallelRowWise), ExecutionMode::ParallelRowWise);
        assert_eq!(cell.set(ExecutionMode::Local), ExecutionMode::ParallelRowWise);
        assert_eq!(cell.get("x").unwrap(), ExecutionMode::ParallelRowWise);
    }

    #[test]
    fn test_row_wise() {
        assert_eq!(ExecutionMode::ParallelColumnar.row_wise(), ExecutionMode::ParallelRowWise);
        assert_eq!(ExecutionMode::Local.row_wise(), ExecutionMode::Local);
    }
}
