//! Observable engine events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events during engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Session lifecycle
    /// Session construction begins
    SessionStart,
    /// Session is ready to evaluate queries
    SessionReady,
    /// Session teardown
    SessionShutdown,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
    /// User type declarations registered
    TypesDeclared,

    // Query processing
    /// Query module received
    QueryReceived,
    /// Execution modes computed for the whole tree
    QueryAnalysed,
    /// Query evaluated successfully
    QueryExecuted,
    /// Query failed
    QueryRejected,

    // Distributed boundary
    /// Distributed collection pulled into a local sequence
    CollectionMaterialized,
    /// Shuffle for a grouping begins
    ShuffleBegin,
    /// Shuffle for a grouping complete
    ShuffleComplete,
    /// External source read into a collection
    SourceIngested,

    // Explain
    /// Explain begins
    ExplainBegin,
    /// Explain complete
    ExplainComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SessionStart => "SESSION_BEGIN",
            Event::SessionReady => "SESSION_READY",
            Event::SessionShutdown => "SESSION_SHUTDOWN",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::TypesDeclared => "TYPES_DECLARED",

            Event::QueryReceived => "QUERY_BEGIN",
            Event::QueryAnalysed => "QUERY_ANALYSED",
            Event::QueryExecuted => "QUERY_COMPLETE",
            Event::QueryRejected => "QUERY_REJECTED",

            Event::CollectionMaterialized => "COLLECTION_MATERIALIZED",
            Event::ShuffleBegin => "SHUFFLE_BEGIN",
            Event::ShuffleComplete => "SHUFFLE_COMPLETE",
            Event::SourceIngested => "SOURCE_INGESTED",

            Event::ExplainBegin => "EXPLAIN_BEGIN",
            Event::ExplainComplete => "EXPLAIN_COMPLETE",
        }
    }

    /// Returns true if this event is routine detail rather than lifecycle
    pub fn is_detail(&self) -> bool {
        matches!(
            self,
            Event::CollectionMaterialized
                | Event::ShuffleBegin
                | Event::ShuffleComplete
                | Event::SourceIngested
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
