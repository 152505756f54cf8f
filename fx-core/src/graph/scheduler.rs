//! Propagation Scheduler
//!
//! The scheduler is the per-graph context: it hands out ranks, stamps and
//! node IDs, and it runs propagation passes.
//!
//! # Algorithm
//!
//! One external stimulus becomes one pass:
//!
//! 1. Wrap the value in a [`Pulse`] carrying a fresh stamp.
//! 2. Queue `(root.rank, root, pulse)` in a fresh priority queue.
//! 3. Pop the lowest rank and run that node's updater.
//!    - A returned pulse is queued for every listener at the listener's rank.
//!    - `None` stops this branch.
//! 4. Repeat until the queue drains.
//!
//! Because every listener outranks its inputs, a node is only evaluated once
//! all of its ancestors in the same pass have been. Ranks may grow mid-pass
//! when a switching combinator rewires the graph; queue entries recorded
//! under an older rank are re-queued at the node's current rank instead of
//! being evaluated early.
//!
//! Sends issued while a pass is running are deferred and propagated after
//! it, each with its own stamp, in the order they were issued.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::node::{Node, NodeId, Pulse};
use super::queue::PriorityQueue;
use crate::config::GraphConfig;
use crate::error::{Error, Result};

/// A node waiting in the queue, with the rank it was queued under.
struct Scheduled {
    rank: u64,
    node: Rc<Node>,
    pulse: Pulse,
}

/// Per-graph counters and propagation driver.
pub struct Scheduler {
    config: GraphConfig,

    next_rank: Cell<u64>,
    next_stamp: Cell<u64>,
    next_node: Cell<u64>,

    /// Whether a pass is currently running.
    in_flight: Cell<bool>,

    /// Stimuli sent while a pass was running.
    deferred: RefCell<VecDeque<(Rc<Node>, Rc<dyn Any>)>>,

    /// Failures from propagations that had no caller to report to.
    errors: RefCell<Vec<Error>>,
}

/// Ends the outermost send, whether it returns or unwinds. Deferred sends
/// left over by a failed pass are discarded.
struct InFlight<'a>(&'a Scheduler);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.deferred.borrow_mut().clear();
        self.0.in_flight.set(false);
    }
}

impl Scheduler {
    /// Create a scheduler with the given configuration.
    pub fn new(config: GraphConfig) -> Rc<Self> {
        Rc::new(Self {
            config,
            next_rank: Cell::new(0),
            next_stamp: Cell::new(0),
            next_node: Cell::new(0),
            in_flight: Cell::new(false),
            deferred: RefCell::new(VecDeque::new()),
            errors: RefCell::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Allocate a rank above every rank handed out so far.
    pub fn next_rank(&self) -> u64 {
        let rank = self.next_rank.get() + 1;
        self.next_rank.set(rank);
        rank
    }

    /// Allocate the stamp for a new stimulus.
    pub fn next_stamp(&self) -> u64 {
        let stamp = self.next_stamp.get() + 1;
        self.next_stamp.set(stamp);
        stamp
    }

    pub fn next_node_id(&self) -> NodeId {
        let id = self.next_node.get();
        self.next_node.set(id + 1);
        NodeId::from(id)
    }

    /// Whether a propagation pass is running right now.
    pub fn is_propagating(&self) -> bool {
        self.in_flight.get()
    }

    /// Inject `value` at `node` as a new stimulus.
    ///
    /// Called from inside a running pass, the stimulus is queued and this
    /// returns immediately; the outermost send propagates it later.
    pub fn send(&self, node: &Rc<Node>, value: Rc<dyn Any>) -> Result<()> {
        if self.in_flight.get() {
            tracing::trace!(node = %node.id(), "deferring send issued during propagation");
            self.deferred
                .borrow_mut()
                .push_back((Rc::clone(node), value));
            return Ok(());
        }

        self.in_flight.set(true);
        let _guard = InFlight(self);

        self.drain(node, value)
    }

    fn drain(&self, node: &Rc<Node>, value: Rc<dyn Any>) -> Result<()> {
        self.propagate(Pulse::from_raw(self.next_stamp(), value), node)?;

        let limit = self.config.max_cascade;
        let mut cascade = 0;
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some((node, value)) = next else {
                return Ok(());
            };
            cascade += 1;
            if cascade > limit {
                return Err(Error::RunawayCascade { limit });
            }
            self.propagate(Pulse::from_raw(self.next_stamp(), value), &node)?;
        }
    }

    /// Run one pass starting at `root`.
    fn propagate(&self, pulse: Pulse, root: &Rc<Node>) -> Result<()> {
        let mut queue = PriorityQueue::new();
        let rank = root.rank();
        queue.insert(
            rank,
            Scheduled {
                rank,
                node: Rc::clone(root),
                pulse,
            },
        );

        while let Some(Scheduled { rank, node, pulse }) = queue.pop() {
            let current = node.rank();
            if current != rank {
                queue.insert(
                    current,
                    Scheduled {
                        rank: current,
                        node,
                        pulse,
                    },
                );
                continue;
            }

            if self.config.trace_pulses {
                tracing::trace!(
                    node = %node.id(),
                    name = node.name(),
                    rank,
                    stamp = pulse.stamp(),
                    "evaluate"
                );
            }

            let Some(next) = node.evaluate(pulse)? else {
                continue;
            };
            for listener in node.listeners() {
                let rank = listener.rank();
                queue.insert(
                    rank,
                    Scheduled {
                        rank,
                        node: listener,
                        pulse: next.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Keep an error raised by a propagation with no caller, such as a
    /// timer or an HTTP completion.
    pub fn record_error(&self, error: Error) {
        tracing::error!(%error, "asynchronous propagation failed");
        self.errors.borrow_mut().push(error);
    }

    /// Take every recorded asynchronous error.
    pub fn take_errors(&self) -> Vec<Error> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> Rc<Scheduler> {
        Scheduler::new(GraphConfig::default())
    }

    fn recorder(
        scheduler: &Rc<Scheduler>,
        name: &'static str,
        input: &Rc<Node>,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> Rc<Node> {
        let log = Rc::clone(log);
        Node::new(
            scheduler,
            name,
            &[input],
            Box::new(move |pulse| {
                log.borrow_mut().push(name);
                Ok(Some(pulse))
            }),
        )
    }

    #[test]
    fn counters_are_monotonic() {
        let scheduler = scheduler();
        assert!(scheduler.next_rank() < scheduler.next_rank());
        assert!(scheduler.next_stamp() < scheduler.next_stamp());
        assert_ne!(scheduler.next_node_id(), scheduler.next_node_id());
    }

    #[test]
    fn evaluates_in_rank_order() {
        let scheduler = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        let root = Node::relay(&scheduler, "root", &[]);
        let a = recorder(&scheduler, "a", &root, &log);
        let b = recorder(&scheduler, "b", &a, &log);
        let _c = recorder(&scheduler, "c", &root, &log);
        let _d = recorder(&scheduler, "d", &b, &log);

        scheduler.send(&root, Rc::new(1)).unwrap();

        assert_eq!(*log.borrow(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn stop_halts_the_branch() {
        let scheduler = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        let root = Node::relay(&scheduler, "root", &[]);
        let stop = Node::new(&scheduler, "stop", &[&root], Box::new(|_| Ok(None)));
        let _after = recorder(&scheduler, "after", &stop, &log);

        scheduler.send(&root, Rc::new(())).unwrap();

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn sends_during_a_pass_are_deferred() {
        let scheduler = scheduler();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let root = Node::relay(&scheduler, "root", &[]);
        let other = Node::relay(&scheduler, "other", &[]);

        let seen_clone = Rc::clone(&seen);
        let _sink = Node::new(
            &scheduler,
            "sink",
            &[&other],
            Box::new(move |pulse| {
                seen_clone.borrow_mut().push(pulse.stamp());
                Ok(None)
            }),
        );

        let inner = Rc::clone(&scheduler);
        let other_clone = Rc::clone(&other);
        let stamps = Rc::new(RefCell::new(Vec::new()));
        let stamps_clone = Rc::clone(&stamps);
        let _forward = Node::new(
            &scheduler,
            "forward",
            &[&root],
            Box::new(move |pulse| {
                stamps_clone.borrow_mut().push(pulse.stamp());
                assert!(inner.is_propagating());
                inner.send(&other_clone, Rc::new(()))?;
                Ok(None)
            }),
        );

        scheduler.send(&root, Rc::new(())).unwrap();

        assert!(!scheduler.is_propagating());
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0] > stamps.borrow()[0]);
    }

    #[test]
    fn unbounded_feedback_is_a_runaway_cascade() {
        let scheduler = Scheduler::new(GraphConfig::default().with_max_cascade(5));
        let root = Node::relay(&scheduler, "root", &[]);
        let inner = Rc::clone(&scheduler);
        let root_weak = Rc::downgrade(&root);
        let _loop = Node::new(
            &scheduler,
            "loop",
            &[&root],
            Box::new(move |_| {
                if let Some(root) = root_weak.upgrade() {
                    inner.send(&root, Rc::new(()))?;
                }
                Ok(None)
            }),
        );

        let err = scheduler.send(&root, Rc::new(())).unwrap_err();
        assert!(matches!(err, Error::RunawayCascade { limit: 5 }));
        assert!(!scheduler.is_propagating());
    }

    #[test]
    fn updater_errors_reach_the_sender() {
        let scheduler = scheduler();
        let root = Node::relay(&scheduler, "root", &[]);
        let _failing = Node::new(
            &scheduler,
            "failing",
            &[&root],
            Box::new(|_| Err(Error::callback("boom"))),
        );

        let err = scheduler.send(&root, Rc::new(())).unwrap_err();
        assert!(matches!(err, Error::Callback(ref message) if message == "boom"));
        assert!(!scheduler.is_propagating());
    }

    #[test]
    fn panicking_updater_discards_deferred_sends() {
        let scheduler = scheduler();
        let root = Node::relay(&scheduler, "root", &[]);
        let other = Node::relay(&scheduler, "other", &[]);
        let hits = Rc::new(Cell::new(0));

        let counter = Rc::clone(&hits);
        let _sink = Node::new(
            &scheduler,
            "sink",
            &[&other],
            Box::new(move |_| {
                counter.set(counter.get() + 1);
                Ok(None)
            }),
        );

        let inner = Rc::clone(&scheduler);
        let other_clone = Rc::clone(&other);
        let _panicking = Node::new(
            &scheduler,
            "panicking",
            &[&root],
            Box::new(move |_| {
                inner.send(&other_clone, Rc::new(()))?;
                panic!("updater failed");
            }),
        );

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = scheduler.send(&root, Rc::new(()));
        }));
        assert!(unwound.is_err());
        assert!(!scheduler.is_propagating());

        scheduler.send(&other, Rc::new(())).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn recorded_errors_are_taken_once() {
        let scheduler = scheduler();
        scheduler.record_error(Error::callback("late"));
        assert_eq!(scheduler.take_errors().len(), 1);
        assert!(scheduler.take_errors().is_empty());
    }
}
