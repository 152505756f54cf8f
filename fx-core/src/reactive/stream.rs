//! Event Streams
//!
//! An [`EventStream`] is a typed handle to a graph node that emits discrete
//! values. Combinators never mutate their input; each one creates a new node
//! listening to the input and returns a handle to it.
//!
//! # Lifetime
//!
//! Inputs keep their listeners alive, not the other way round. A derived
//! stream therefore lives as long as its source does, even if its own handle
//! is dropped, while a receiver lives only as long as something that can send
//! into it holds a handle.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::behavior::Behavior;
use super::runtime::Graph;
use crate::error::{Error, Result};
use crate::graph::{Node, NodeId, Pulse};

/// Borrow a pulse payload as `T`.
pub(crate) fn payload<T: 'static>(pulse: &Pulse) -> Result<&T> {
    pulse.value::<T>().ok_or(Error::PulseType {
        expected: std::any::type_name::<T>(),
    })
}

/// A stream of discrete values of type `T`.
pub struct EventStream<T> {
    node: Rc<Node>,
    _marker: PhantomData<T>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.node.id())
            .field("rank", &self.node.rank())
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: 'static> EventStream<T> {
    pub(crate) fn from_node(node: Rc<Node>) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    pub(crate) fn node(&self) -> &Rc<Node> {
        &self.node
    }

    /// Derive a stream from this one with a typed updater.
    ///
    /// `update` returns `Ok(None)` to stop propagation along this branch.
    pub(crate) fn derive<U, F>(&self, name: &'static str, mut update: F) -> EventStream<U>
    where
        U: 'static,
        F: FnMut(&T) -> Result<Option<U>> + 'static,
    {
        EventStream::from_node(Node::new(
            self.node.scheduler(),
            name,
            &[&self.node],
            Box::new(move |pulse| {
                let next = update(payload::<T>(&pulse)?)?;
                Ok(next.map(|value| pulse.with_value(value)))
            }),
        ))
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn rank(&self) -> u64 {
        self.node.rank()
    }

    /// The graph this stream belongs to.
    pub fn graph(&self) -> Graph {
        Graph::from_scheduler(Rc::clone(self.node.scheduler()))
    }

    /// Start a new propagation pass with `value` entering at this stream.
    ///
    /// The value goes through this stream's own updater first, so it is
    /// meant for receivers and other streams whose input and output types
    /// agree. Called during a pass, the send is deferred until the pass ends.
    pub fn send_event(&self, value: T) -> Result<()> {
        self.node.scheduler().send(&self.node, Rc::new(value))
    }

    /// Send from a context with no caller to report to, such as a timer or
    /// an I/O completion. Failures go to the graph's error log.
    pub(crate) fn deliver(&self, value: T) {
        if let Err(error) = self.send_event(value) {
            self.node.scheduler().record_error(error);
        }
    }

    /// Forward every event of this stream into `target` as well.
    ///
    /// Used for two-phase wiring: create a receiver first, build whatever
    /// depends on it, then attach the real producer.
    pub fn attach(&self, target: &EventStream<T>) -> Result<()> {
        self.node.attach_listener(&target.node)
    }

    /// Undo [`EventStream::attach`]. Returns whether the edge existed.
    pub fn detach(&self, target: &EventStream<T>) -> bool {
        self.node.remove_listener(&target.node)
    }

    /// Emits `f(v)` for every `v`.
    pub fn map_e<U, F>(&self, mut f: F) -> EventStream<U>
    where
        U: 'static,
        F: FnMut(&T) -> U + 'static,
    {
        self.derive("map_e", move |value| Ok(Some(f(value))))
    }

    /// Like [`EventStream::map_e`], but an `Err` from `f` aborts the pass and
    /// is returned to the sender.
    pub fn try_map_e<U, E, F>(&self, mut f: F) -> EventStream<U>
    where
        U: 'static,
        E: Into<Error>,
        F: FnMut(&T) -> std::result::Result<U, E> + 'static,
    {
        self.derive("try_map_e", move |value| f(value).map(Some).map_err(Into::into))
    }

    /// Forwards only the events for which `pred` holds.
    pub fn filter_e<F>(&self, mut pred: F) -> EventStream<T>
    where
        T: Clone,
        F: FnMut(&T) -> bool + 'static,
    {
        EventStream::from_node(Node::new(
            self.node.scheduler(),
            "filter_e",
            &[&self.node],
            Box::new(move |pulse| {
                if pred(payload::<T>(&pulse)?) {
                    Ok(Some(pulse))
                } else {
                    Ok(None)
                }
            }),
        ))
    }

    /// Replaces every event with `value`.
    pub fn constant_e<U: Clone + 'static>(&self, value: U) -> EventStream<U> {
        self.map_e(move |_| value.clone())
    }

    pub fn not_e(&self) -> EventStream<T::Output>
    where
        T: Clone + std::ops::Not,
        T::Output: 'static,
    {
        self.map_e(|value| !value.clone())
    }

    /// Fires when either stream fires, preferring this one for simultaneous
    /// events.
    pub fn merge_e(&self, other: &EventStream<T>) -> EventStream<T> {
        self.graph().merge_e([self, other])
    }

    /// Running accumulation: emits `combine(event, previous)` seeded with
    /// `init`.
    pub fn collect_e<A, F>(&self, init: A, mut combine: F) -> EventStream<A>
    where
        A: Clone + 'static,
        F: FnMut(&T, &A) -> A + 'static,
    {
        let mut acc = init;
        self.map_e(move |value| {
            acc = combine(value, &acc);
            acc.clone()
        })
    }

    /// Only the first event.
    pub fn once_e(&self) -> EventStream<T>
    where
        T: Clone,
    {
        let mut done = false;
        self.filter_e(move |_| !std::mem::replace(&mut done, true))
    }

    /// Every event except the first.
    pub fn skip_first_e(&self) -> EventStream<T>
    where
        T: Clone,
    {
        let mut skipped = false;
        self.filter_e(move |_| std::mem::replace(&mut skipped, true))
    }

    /// Drops events equal to the previously forwarded one. `start`, when
    /// given, counts as already forwarded.
    pub fn filter_repeats_e(&self, start: Option<T>) -> EventStream<T>
    where
        T: Clone + PartialEq,
    {
        let mut prev = start;
        self.filter_e(move |value| {
            if prev.as_ref() == Some(value) {
                return false;
            }
            prev = Some(value.clone());
            true
        })
    }

    /// Samples `behavior` on every event.
    pub fn snapshot_e<U: Clone + 'static>(&self, behavior: &Behavior<U>) -> EventStream<U> {
        let current = Rc::clone(behavior.cell());
        self.map_e(move |_| current.borrow().clone())
    }

    /// A behavior that starts at `init` and then holds the latest event.
    pub fn starts_with(&self, init: T) -> Behavior<T>
    where
        T: Clone,
    {
        Behavior::hold(&self.node, "starts_with", init, |pulse| {
            payload::<T>(pulse).cloned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn map_transforms_each_event() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let doubled = source.map_e(|v| v * 2).starts_with(0);

        source.send_event(21).unwrap();
        assert_eq!(doubled.value_now(), 42);
    }

    #[test]
    fn filter_stops_propagation() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _evens = source
            .filter_e(|v| v % 2 == 0)
            .map_e(move |v| seen_clone.borrow_mut().push(*v));

        for value in [1, 2, 7, 10, 99] {
            source.send_event(value).unwrap();
        }
        assert_eq!(*seen.borrow(), vec![2, 10]);
    }

    #[test]
    fn filter_on_initial_value_does_not_fire() {
        let graph = Graph::new();
        let behavior = graph
            .receiver_e::<i32>()
            .filter_e(|v| v % 2 == 0)
            .map_e(|v| Some(*v))
            .starts_with(None);
        assert_eq!(behavior.value_now(), None);
    }

    #[test]
    fn collect_accumulates() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let sum = source.collect_e(0, |v, acc| v + acc).starts_with(0);

        source.send_event(1).unwrap();
        source.send_event(2).unwrap();
        source.send_event(3).unwrap();
        assert_eq!(sum.value_now(), 6);
    }

    #[test]
    fn collect_builds_history_newest_first() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let history = source
            .collect_e(Vec::new(), |v, acc: &Vec<i32>| {
                let mut next = vec![*v];
                next.extend(acc.iter().copied());
                next
            })
            .starts_with(Vec::new());

        source.send_event(1).unwrap();
        source.send_event(2).unwrap();
        assert_eq!(history.value_now(), vec![2, 1]);
    }

    #[test]
    fn once_and_skip_first() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let first = source.once_e().collect_e(0, |_, n| n + 1).starts_with(0);
        let rest = source.skip_first_e().collect_e(0, |_, n| n + 1).starts_with(0);

        for value in 0..4 {
            source.send_event(value).unwrap();
        }
        assert_eq!(first.value_now(), 1);
        assert_eq!(rest.value_now(), 3);
    }

    #[test]
    fn filter_repeats_drops_duplicates() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);
        let _distinct = source
            .filter_repeats_e(Some(1))
            .map_e(move |_| count_clone.set(count_clone.get() + 1));

        for value in [1, 1, 2, 2, 1] {
            source.send_event(value).unwrap();
        }
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn constant_and_not() {
        let graph = Graph::new();
        let source = graph.receiver_e::<bool>();
        let flipped = source.not_e().starts_with(false);
        let tagged = source.constant_e("hit").starts_with("none");

        source.send_event(false).unwrap();
        assert!(flipped.value_now());
        assert_eq!(tagged.value_now(), "hit");
    }

    #[test]
    fn snapshot_samples_behavior() {
        let graph = Graph::new();
        let clicks = graph.receiver_e::<()>();
        let text = graph.source(String::from("draft"));
        let sampled = clicks.snapshot_e(&text).starts_with(String::new());

        text.send(String::from("final")).unwrap();
        assert_eq!(sampled.value_now(), "");
        clicks.send_event(()).unwrap();
        assert_eq!(sampled.value_now(), "final");
    }

    #[test]
    fn try_map_error_aborts_the_pass() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let checked = source
            .try_map_e(|v| if *v < 0 { Err(Error::callback("negative")) } else { Ok(*v) })
            .starts_with(0);

        source.send_event(4).unwrap();
        assert!(matches!(source.send_event(-1), Err(Error::Callback(_))));
        assert_eq!(checked.value_now(), 4);
    }

    #[test]
    fn attach_and_detach_receivers() {
        let graph = Graph::new();
        let producer = graph.receiver_e::<i32>();
        let placeholder = graph.receiver_e::<i32>();
        let held = placeholder.starts_with(0);

        producer.attach(&placeholder).unwrap();
        assert!(producer.rank() < placeholder.rank());
        producer.send_event(3).unwrap();
        assert_eq!(held.value_now(), 3);

        assert!(producer.detach(&placeholder));
        producer.send_event(4).unwrap();
        assert_eq!(held.value_now(), 3);
    }

    #[test]
    fn sending_wrong_type_into_derived_stream_fails() {
        let graph = Graph::new();
        let source = graph.receiver_e::<i32>();
        let labels = source.map_e(|v| v.to_string());
        assert!(matches!(
            labels.send_event(String::from("x")),
            Err(Error::PulseType { .. })
        ));
    }
}
