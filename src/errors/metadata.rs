//! Source positions carried by tree nodes for diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line and column of a node in the query text that produced the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    /// 1-based line, 0 when unknown
    #[serde(default)]
    pub line: u32,
    /// 1-based column, 0 when unknown
    #[serde(default)]
    pub column: u32,
    /// Module or file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Returns true if no position information is present
    pub fn is_unknown(&self) -> bool {
        self.line == 0 && self.column == 0 && self.location.is_none()
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}:", location)?;
        }
        write!(f, "line {}:{}", self.line, self.column)
    }
}
