//! tidequery - a hybrid local/distributed query engine for JSON data
//!
//! A query module is analysed once to give every node a static execution
//! mode, compiled into a tree of pull iterators, and evaluated either as a
//! local pull loop or as bulk transforms over partitioned collections on
//! an in-process worker pool.

pub mod cli;
pub mod cluster;
pub mod context;
pub mod errors;
pub mod expression;
pub mod flwor;
pub mod functions;
pub mod item;
pub mod observability;
pub mod runtime;
pub mod session;
pub mod types;
