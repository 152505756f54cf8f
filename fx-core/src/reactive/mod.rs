//! Reactive Primitives
//!
//! This module implements the typed layer of the runtime: event streams,
//! behaviors and the combinators that connect them.
//!
//! # Concepts
//!
//! ## Event Streams
//!
//! An [`EventStream`] carries discrete occurrences such as clicks or
//! responses. It has no current value; code that cares about its events
//! builds a combinator on top of it.
//!
//! ## Behaviors
//!
//! A [`Behavior`] is a value that varies over time. It always has a current
//! value, readable with [`Behavior::value_now`], and exposes its changes as
//! an event stream.
//!
//! ## Graphs
//!
//! Every stream and behavior belongs to one [`Graph`]. The graph owns the
//! rank and stamp counters and runs propagation passes.
//!
//! # Implementation Notes
//!
//! Dependencies are explicit: a combinator registers its node with exactly
//! the inputs it was given. Nothing is tracked by reading values, so calling
//! `value_now` inside a closure never subscribes to anything.

mod behavior;
mod lift;
mod runtime;
mod stream;
mod switch;
mod time;

pub use behavior::Behavior;
pub use runtime::Graph;
pub use stream::EventStream;
pub use time::Interval;
