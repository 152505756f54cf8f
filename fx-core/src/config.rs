//! Graph Configuration
//!
//! Tunables for a [`Graph`](crate::Graph). Every field has a default, so a
//! partial JSON document is enough to override a single setting.

use serde::Deserialize;

use crate::error::Result;

fn default_max_cascade() -> usize {
    10_000
}

/// Configuration for a single dataflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphConfig {
    /// Maximum number of deferred stimuli drained after one top-level send.
    ///
    /// A deferred stimulus is a `send_event` issued from inside an updater.
    /// Feedback loops that keep re-sending forever hit this limit and fail
    /// with [`Error::RunawayCascade`](crate::Error::RunawayCascade).
    #[serde(default = "default_max_cascade")]
    pub max_cascade: usize,

    /// Emit a `trace!` event for every node evaluated during propagation.
    #[serde(default)]
    pub trace_pulses: bool,
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override the cascade limit.
    pub fn with_max_cascade(mut self, max_cascade: usize) -> Self {
        self.max_cascade = max_cascade;
        self
    }

    /// Turn per-node tracing on or off.
    pub fn with_trace_pulses(mut self, trace_pulses: bool) -> Self {
        self.trace_pulses = trace_pulses;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_cascade: default_max_cascade(),
            trace_pulses: false,
        }
    }
}
