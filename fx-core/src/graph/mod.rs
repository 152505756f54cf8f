//! Dataflow Graph
//!
//! This module implements the untyped layer of the runtime: nodes, pulses,
//! the rank-ordered priority queue and the propagation scheduler.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes hold an updater that maps an incoming pulse to an outgoing pulse,
//!   or stops propagation along that branch
//! - Edges run from a node to its listeners, and every listener outranks its
//!   inputs
//!
//! The typed `EventStream` and `Behavior` handles in [`crate::reactive`] are
//! thin wrappers over [`Node`].
//!
//! # Design Decisions
//!
//! 1. Payloads are type-erased (`Rc<dyn Any>`). Typing lives in the handles,
//!    so one queue can hold nodes of every value type.
//!
//! 2. Ranks come from a per-graph counter. A new node always outranks every
//!    existing node; only rewiring (switching combinators, explicit attach)
//!    ever needs to re-rank.
//!
//! 3. Glitch freedom comes from rank ordering plus per-stamp deduplication in
//!    the multi-input combinators.

mod node;
mod queue;
mod scheduler;

pub use node::{Node, NodeId, Pulse, Updater};
pub use queue::PriorityQueue;
pub use scheduler::Scheduler;
