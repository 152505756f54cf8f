//! Behaviors
//!
//! A [`Behavior`] is a time-varying value: a node whose every pulse is cached
//! so the current value can be read synchronously with
//! [`Behavior::value_now`].
//!
//! # Design Decisions
//!
//! 1. The cache is written inside the node's updater, before any listener is
//!    queued. A listener evaluated later in the same pass always observes the
//!    new value.
//!
//! 2. [`Behavior::send`] injects an `Assign` marker rather than a bare value.
//!    The updater recognises it and stores the value directly, so sending
//!    works on derived behaviors whose input type differs from `T`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::Graph;
use super::stream::EventStream;
use crate::error::Result;
use crate::graph::{Node, NodeId, Pulse, Scheduler};

/// Payload injected by [`Behavior::send`].
struct Assign<T>(T);

/// A value that changes over time.
pub struct Behavior<T> {
    node: Rc<Node>,
    current: Rc<RefCell<T>>,
}

impl<T> Clone for Behavior<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
            current: Rc::clone(&self.current),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Behavior<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("id", &self.node.id())
            .field("rank", &self.node.rank())
            .field("current", &*self.current.borrow())
            .finish()
    }
}

impl<T: Clone + 'static> Behavior<T> {
    /// Build a behavior listening to `input`.
    ///
    /// `update` turns each incoming pulse into the new value; an error aborts
    /// the pass and leaves the cached value unchanged.
    pub(crate) fn hold<F>(input: &Rc<Node>, name: &'static str, init: T, update: F) -> Self
    where
        F: FnMut(&Pulse) -> Result<T> + 'static,
    {
        Self::hold_many(input.scheduler(), name, &[input], init, update)
    }

    pub(crate) fn hold_many<F>(
        scheduler: &Rc<Scheduler>,
        name: &'static str,
        inputs: &[&Rc<Node>],
        init: T,
        mut update: F,
    ) -> Self
    where
        F: FnMut(&Pulse) -> Result<T> + 'static,
    {
        let current = Rc::new(RefCell::new(init));
        let cell = Rc::clone(&current);
        let node = Node::new(
            scheduler,
            name,
            inputs,
            Box::new(move |pulse| {
                let value = match pulse.value::<Assign<T>>() {
                    Some(Assign(value)) => value.clone(),
                    None => update(&pulse)?,
                };
                *cell.borrow_mut() = value.clone();
                Ok(Some(pulse.with_value(value)))
            }),
        );
        Self { node, current }
    }

    pub(crate) fn node(&self) -> &Rc<Node> {
        &self.node
    }

    pub(crate) fn cell(&self) -> &Rc<RefCell<T>> {
        &self.current
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn rank(&self) -> u64 {
        self.node.rank()
    }

    pub fn graph(&self) -> Graph {
        Graph::from_scheduler(Rc::clone(self.node.scheduler()))
    }

    /// The current value.
    pub fn value_now(&self) -> T {
        self.current.borrow().clone()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.current.borrow())
    }

    /// A stream that fires with every new value.
    pub fn changes(&self) -> EventStream<T> {
        EventStream::from_node(Rc::clone(&self.node))
    }

    /// Set the value as a new stimulus and propagate it to dependents.
    pub fn send(&self, value: T) -> Result<()> {
        self.node
            .scheduler()
            .send(&self.node, Rc::new(Assign(value)))
    }

    /// Suppress changes that do not alter the value.
    pub fn filter_repeats_b(&self) -> Behavior<T>
    where
        T: PartialEq,
    {
        self.changes()
            .filter_repeats_e(Some(self.value_now()))
            .starts_with(self.value_now())
    }

    /// Sample this behavior whenever `trigger` fires.
    pub fn snapshot_on<E: 'static>(&self, trigger: &EventStream<E>) -> EventStream<T> {
        trigger.snapshot_e(self)
    }
}
