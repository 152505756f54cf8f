//! Error Types
//!
//! Every failure the runtime can report goes through [`Error`]. Construction
//! failures are returned by the combinator that detected them; propagation
//! failures abort the current pass and are returned to whoever called
//! `send_event`.
//!
//! A pass that fails part-way is not rolled back. Nodes evaluated before the
//! failing one keep their new values (best-effort partial update).

use crate::adapters::http::TransportError;
use crate::graph::NodeId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or propagating through a graph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Adding an edge would close a cycle, or a node was asked to evaluate
    /// while its own updater was still running.
    #[error("cyclic dependency detected at node {node}")]
    CyclicDependency { node: NodeId },

    /// A stream created with `zero_e` received a pulse.
    #[error("zero stream received a value")]
    ZeroStreamFired,

    /// A stream created with `one_e` received a second pulse.
    #[error("one-shot stream fired more than once")]
    OneShotRefired,

    /// Deferred sends kept feeding the graph past the configured limit.
    #[error("more than {limit} deferred pulses in a single cascade")]
    RunawayCascade { limit: usize },

    /// A pulse carried a value of a type its receiving node did not expect.
    #[error("expected a pulse of type {expected}")]
    PulseType { expected: &'static str },

    /// A user callback passed to a fallible combinator failed.
    #[error("callback failed: {0}")]
    Callback(String),

    /// A value did not have the shape a combinator needs, such as indexing
    /// into a JSON value that is not an object.
    #[error("unexpected value: {0}")]
    UnexpectedValue(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// Build a callback error from anything printable.
    pub fn callback(message: impl std::fmt::Display) -> Self {
        Error::Callback(message.to_string())
    }

    /// Whether this error reports a dependency cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Error::CyclicDependency { .. })
    }
}
