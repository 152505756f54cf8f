//! Graph Nodes
//!
//! This module defines the type-erased node that every stream and behavior
//! is built on, together with the [`Pulse`] envelope that flows between nodes.
//!
//! A node owns strong references to its listeners. Upstream nodes therefore
//! keep downstream nodes alive, and a detached subgraph is freed as soon as
//! nothing else refers to it.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::scheduler::Scheduler;
use crate::error::{Error, Result};

/// Identifier for a node, unique within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One timestamped value travelling through the graph.
///
/// All pulses produced while propagating a single stimulus share a stamp.
#[derive(Clone)]
pub struct Pulse {
    stamp: u64,
    value: Rc<dyn Any>,
}

impl Pulse {
    /// Wrap a value in a pulse with the given stamp.
    pub fn new<T: 'static>(stamp: u64, value: T) -> Self {
        Self {
            stamp,
            value: Rc::new(value),
        }
    }

    /// Build a pulse around an already type-erased value.
    pub fn from_raw(stamp: u64, value: Rc<dyn Any>) -> Self {
        Self { stamp, value }
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Borrow the payload as `T`, if that is what it holds.
    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// A pulse with the same stamp carrying a different value.
    pub fn with_value<T: 'static>(&self, value: T) -> Pulse {
        Pulse::new(self.stamp, value)
    }
}

impl fmt::Debug for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pulse").field("stamp", &self.stamp).finish_non_exhaustive()
    }
}

/// Maps an incoming pulse to an outgoing one. `Ok(None)` stops the branch.
pub type Updater = Box<dyn FnMut(Pulse) -> Result<Option<Pulse>>>;

/// A node in the dataflow graph.
///
/// Invariant: `rank` is strictly smaller than the rank of every listener.
pub struct Node {
    id: NodeId,

    /// Combinator that built this node, for tracing.
    name: &'static str,

    /// Topological priority inside a propagation pass.
    rank: Cell<u64>,

    /// Nodes that receive this node's output, in registration order.
    listeners: RefCell<IndexMap<NodeId, Rc<Node>>>,

    updater: RefCell<Updater>,

    scheduler: Rc<Scheduler>,
}

impl Node {
    /// Create a node listening to `inputs`.
    ///
    /// A fresh node outranks every existing node, so wiring it below its
    /// inputs never needs re-ranking.
    pub fn new(
        scheduler: &Rc<Scheduler>,
        name: &'static str,
        inputs: &[&Rc<Node>],
        updater: Updater,
    ) -> Rc<Node> {
        let node = Rc::new(Node {
            id: scheduler.next_node_id(),
            name,
            rank: Cell::new(scheduler.next_rank()),
            listeners: RefCell::new(IndexMap::new()),
            updater: RefCell::new(updater),
            scheduler: Rc::clone(scheduler),
        });
        for input in inputs {
            input
                .listeners
                .borrow_mut()
                .insert(node.id, Rc::clone(&node));
        }
        node
    }

    /// A node that forwards every pulse unchanged.
    pub fn relay(scheduler: &Rc<Scheduler>, name: &'static str, inputs: &[&Rc<Node>]) -> Rc<Node> {
        Node::new(scheduler, name, inputs, Box::new(|pulse| Ok(Some(pulse))))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rank(&self) -> u64 {
        self.rank.get()
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    /// Number of nodes currently listening to this one.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Whether `dependent` is registered as a listener.
    pub fn has_listener(&self, dependent: &Node) -> bool {
        self.listeners.borrow().contains_key(&dependent.id)
    }

    /// Snapshot of the listener set. Updaters may rewire the graph, so the
    /// engine never iterates the live set.
    pub fn listeners(&self) -> SmallVec<[Rc<Node>; 4]> {
        self.listeners.borrow().values().cloned().collect()
    }

    /// Register `dependent` as a listener of this node.
    ///
    /// If this node does not already rank below `dependent`, the dependent
    /// and everything downstream of it receive fresh ranks, preserving their
    /// relative order. An edge that would close a cycle is refused and the
    /// graph is left untouched.
    pub fn attach_listener(&self, dependent: &Rc<Node>) -> Result<()> {
        if self.has_listener(dependent) {
            return Ok(());
        }

        if self.rank() >= dependent.rank() {
            let mut downstream = dependent.downstream();
            if downstream.iter().any(|node| node.id == self.id) {
                tracing::warn!(
                    from = %self.id,
                    to = %dependent.id,
                    "refusing edge that would close a cycle"
                );
                return Err(Error::CyclicDependency { node: dependent.id });
            }

            downstream.sort_by_key(|node| node.rank());
            for node in &downstream {
                node.rank.set(self.scheduler.next_rank());
            }
            tracing::debug!(
                from = %self.id,
                to = %dependent.id,
                reranked = downstream.len(),
                "re-ranked subgraph"
            );
        }

        self.listeners
            .borrow_mut()
            .insert(dependent.id, Rc::clone(dependent));
        Ok(())
    }

    /// Remove `dependent` from the listener set. Returns whether it was there.
    pub fn remove_listener(&self, dependent: &Node) -> bool {
        self.listeners
            .borrow_mut()
            .shift_remove(&dependent.id)
            .is_some()
    }

    /// Run the updater on `pulse`.
    ///
    /// A node whose updater is already running cannot be evaluated again.
    pub fn evaluate(&self, pulse: Pulse) -> Result<Option<Pulse>> {
        let mut updater = self
            .updater
            .try_borrow_mut()
            .map_err(|_| Error::CyclicDependency { node: self.id })?;
        (*updater)(pulse)
    }

    /// This node and every node reachable through listener edges.
    fn downstream(self: &Rc<Self>) -> Vec<Rc<Node>> {
        let mut seen = HashSet::new();
        let mut stack = vec![Rc::clone(self)];
        let mut found = Vec::new();

        while let Some(node) = stack.pop() {
            if !seen.insert(node.id) {
                continue;
            }
            stack.extend(node.listeners());
            found.push(node);
        }
        found
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("rank", &self.rank())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
