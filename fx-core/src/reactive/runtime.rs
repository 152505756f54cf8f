//! Reactive Runtime
//!
//! [`Graph`] is the handle user code builds streams and behaviors from. It
//! wraps the per-graph [`Scheduler`], so two graphs never share stamps,
//! ranks or deferred sends.
//!
//! # How It Works
//!
//! 1. Constructors such as [`Graph::receiver_e`] and [`Graph::source`] create
//!    nodes with no inputs. They are the only places stimuli enter.
//!
//! 2. Combinators on [`EventStream`] and [`Behavior`] create derived nodes
//!    inside the same graph.
//!
//! 3. `send_event` (or `Behavior::send`) starts a propagation pass. Sends
//!    made from inside a pass are queued and run after it.
//!
//! # Threading
//!
//! A graph is single-threaded. Handles are `Rc`-based and not `Send`; timers
//! and HTTP completions run as local tasks on the same thread.

use std::rc::{Rc, Weak};

use super::behavior::Behavior;
use super::stream::EventStream;
use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::graph::{Node, Scheduler};

/// Handle to one dataflow graph.
///
/// Cloning is cheap and every clone refers to the same graph.
///
/// # Panics
///
/// Time-based combinators and HTTP streams spawn tasks with
/// `tokio::task::spawn_local`, some of them from inside a pass. Sending into
/// a graph that contains one, from outside a `tokio::task::LocalSet`, panics
/// in the middle of the pass instead of returning an error. The pass is
/// abandoned and the sends it deferred are discarded.
#[derive(Clone)]
pub struct Graph {
    scheduler: Rc<Scheduler>,
}

impl Graph {
    /// Create a graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            scheduler: Scheduler::new(config),
        }
    }

    pub(crate) fn from_scheduler(scheduler: Rc<Scheduler>) -> Self {
        Self { scheduler }
    }

    pub(crate) fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &GraphConfig {
        self.scheduler.config()
    }

    /// Whether a propagation pass is running.
    pub fn is_propagating(&self) -> bool {
        self.scheduler.is_propagating()
    }

    /// Errors raised by propagations started from timers or I/O completions,
    /// which have no caller to return them to.
    pub fn take_errors(&self) -> Vec<Error> {
        self.scheduler.take_errors()
    }

    /// A stream fed only by [`EventStream::send_event`].
    ///
    /// This is the bridge from callback-driven code into the graph.
    pub fn receiver_e<T: 'static>(&self) -> EventStream<T> {
        EventStream::from_node(Node::relay(&self.scheduler, "receiver_e", &[]))
    }

    /// A stream that never fires. Sending into it fails with
    /// [`Error::ZeroStreamFired`].
    pub fn zero_e<T: 'static>(&self) -> EventStream<T> {
        EventStream::from_node(Node::new(
            &self.scheduler,
            "zero_e",
            &[],
            Box::new(|_| Err(Error::ZeroStreamFired)),
        ))
    }

    /// Fires whenever any of `streams` fires.
    ///
    /// At most one event per stimulus is forwarded: the first one to arrive in
    /// rank order. Merging a stream with something derived from it therefore
    /// yields the original stream's value.
    pub fn merge_e<'a, T: 'static>(
        &self,
        streams: impl IntoIterator<Item = &'a EventStream<T>>,
    ) -> EventStream<T> {
        let inputs: Vec<&Rc<Node>> = streams.into_iter().map(|stream| stream.node()).collect();
        if inputs.is_empty() {
            return self.zero_e();
        }

        let mut last_stamp = 0;
        EventStream::from_node(Node::new(
            &self.scheduler,
            "merge_e",
            &inputs,
            Box::new(move |pulse| {
                if pulse.stamp() == last_stamp {
                    return Ok(None);
                }
                last_stamp = pulse.stamp();
                Ok(Some(pulse))
            }),
        ))
    }

    /// A behavior driven directly by [`Behavior::send`], starting at `init`.
    pub fn source<T: Clone + 'static>(&self, init: T) -> Behavior<T> {
        self.receiver_e().starts_with(init)
    }

    /// A behavior that always holds `value`.
    pub fn constant_b<T: Clone + 'static>(&self, value: T) -> Behavior<T> {
        self.receiver_e().starts_with(value)
    }

    /// Alias for [`Graph::constant_b`].
    pub fn constant<T: Clone + 'static>(&self, value: T) -> Behavior<T> {
        self.constant_b(value)
    }

    /// Build a stream that feeds back into itself.
    ///
    /// `build` receives a placeholder stream and returns the real one; every
    /// event of the returned stream is re-sent into the placeholder as a new
    /// stimulus after the current pass.
    pub fn rec_e<T, F>(&self, build: F) -> EventStream<T>
    where
        T: Clone + 'static,
        F: FnOnce(&EventStream<T>) -> EventStream<T>,
    {
        let input = self.receiver_e::<T>();
        let output = build(&input);

        let feedback: Weak<Node> = Rc::downgrade(input.node());
        output.try_map_e(move |value: &T| -> Result<()> {
            match feedback.upgrade() {
                Some(node) => EventStream::<T>::from_node(node).send_event(value.clone()),
                None => Ok(()),
            }
        });

        output
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("config", self.config())
            .field("propagating", &self.is_propagating())
            .finish()
    }
}
