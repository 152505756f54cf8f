//! Fx Core
//!
//! This crate provides the runtime for Fx, a push-based functional reactive
//! library. It implements:
//!
//! - Event streams and behaviors with glitch-free, rank-ordered propagation
//! - Switching combinators that rewire the graph while it runs
//! - Time-based combinators (debounce, delay, throttle, timers)
//! - Adapters for form elements, HTTP requests and JSON
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: untyped nodes, pulses, the priority queue and the scheduler
//! - `reactive`: typed `EventStream` / `Behavior` handles and combinators
//! - `adapters`: boundary code for elements, transports and JSON
//! - `config`: per-graph settings
//! - `error`: the crate-wide error type
//!
//! # Runtime Requirements
//!
//! Graphs without time-based combinators or HTTP streams need no runtime.
//! The others must be built and driven inside a `tokio::task::LocalSet` on a
//! current-thread runtime; see [`reactive::Graph`] for what happens
//! otherwise.
//!
//! # Example
//!
//! ```rust
//! use fx_core::Graph;
//!
//! let graph = Graph::new();
//! let celsius = graph.source(20.0_f64);
//! let fahrenheit = celsius.lift_b(|c| c * 9.0 / 5.0 + 32.0);
//!
//! celsius.send(100.0).unwrap();
//! assert_eq!(fahrenheit.value_now(), 212.0);
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::GraphConfig;
pub use error::{Error, Result};
pub use reactive::{Behavior, EventStream, Graph, Interval};
