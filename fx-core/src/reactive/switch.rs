//! Switching Combinators
//!
//! Switching combinators rewire the graph while a pass is running: the
//! stream or behavior they follow is chosen by an upstream value.
//!
//! # How It Works
//!
//! Every switch owns a join node that is detached from the previous inner
//! stream and attached to the next one. Attaching re-ranks the join and
//! everything below it when the new inner outranks it, and the scheduler
//! re-queues any entry recorded under an old rank. Dependents of the switch
//! therefore still run after everything they read from in the same pass.
//!
//! The new inner is attached before the old one is detached. If attaching
//! fails (the new inner is downstream of the switch itself) the error is
//! returned to the sender and the switch keeps following the old inner.
//!
//! Re-ranking can move the join below an inner that fires later in the same
//! pass, after the old inner already reached it. The join therefore forwards
//! at most one pulse per stamp.
//!
//! The selector refers to the current inner through a `Weak` handle only.
//! The inner owns the join, and the join's own inputs may own the selector.

use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};

use super::behavior::Behavior;
use super::stream::{payload, EventStream};
use crate::graph::{Node, Scheduler};

/// A node forwarding the first pulse of every stamp it receives.
fn join_once(scheduler: &Rc<Scheduler>, name: &'static str, inputs: &[&Rc<Node>]) -> Rc<Node> {
    let mut last_stamp = 0;
    Node::new(
        scheduler,
        name,
        inputs,
        Box::new(move |pulse| {
            if pulse.stamp() == last_stamp {
                return Ok(None);
            }
            last_stamp = pulse.stamp();
            Ok(Some(pulse))
        }),
    )
}

/// Point `join` at `next` instead of whatever `current` refers to.
///
/// Returns `Ok(false)` without touching the graph when `next` is already
/// the current input.
fn rewire(current: &mut Weak<Node>, next: &Rc<Node>, join: &Rc<Node>) -> crate::error::Result<bool> {
    let prev = current.upgrade();
    if prev.as_ref().is_some_and(|prev| Rc::ptr_eq(prev, next)) {
        return Ok(false);
    }

    next.attach_listener(join)?;
    if let Some(prev) = prev {
        prev.remove_listener(join);
    }
    *current = Rc::downgrade(next);
    Ok(true)
}

impl<T: 'static> EventStream<T> {
    /// For every event `v`, switch the output to follow `k(v)`.
    ///
    /// The triggering event itself is not forwarded; the output fires only
    /// when the currently selected inner stream does. The selected stream is
    /// not kept alive by the switch, so a stream `k` creates must be owned
    /// by its own inputs or by the caller.
    pub fn bind_e<U, F>(&self, mut k: F) -> EventStream<U>
    where
        U: 'static,
        F: FnMut(&T) -> EventStream<U> + 'static,
    {
        let scheduler = self.node().scheduler();
        let output = join_once(scheduler, "bind_e", &[]);
        let target = Rc::clone(&output);
        let mut current: Weak<Node> = Weak::new();

        Node::new(
            scheduler,
            "bind_e_select",
            &[self.node()],
            Box::new(move |pulse| {
                let next = k(payload::<T>(&pulse)?);
                if rewire(&mut current, next.node(), &target)? {
                    tracing::debug!(output = %target.id(), inner = %next.id(), "bind_e switched");
                }
                Ok(None)
            }),
        );

        EventStream::from_node(output)
    }
}

impl<T: 'static> EventStream<EventStream<T>> {
    /// Follow the most recent stream this stream has carried.
    pub fn switch_e(&self) -> EventStream<T> {
        self.bind_e(|inner| inner.clone())
    }
}

impl<T: Clone + 'static> Behavior<Behavior<T>> {
    /// Flatten a behavior of behaviors.
    ///
    /// The result follows the current inner behavior. When the outer value
    /// changes, the result takes the new inner's value within the same pass
    /// and stops listening to the old one.
    pub fn switch_b(&self) -> Behavior<T> {
        let scheduler = self.node().scheduler();
        let initial = self.value_now();

        let shared = Rc::new(RefCell::new(Rc::clone(initial.cell())));
        let join_slot: Rc<OnceCell<Rc<Node>>> = Rc::new(OnceCell::new());

        let selector = {
            let shared = Rc::clone(&shared);
            let join_slot = Rc::clone(&join_slot);
            let mut inner: Weak<Node> = Rc::downgrade(initial.node());
            Node::new(
                scheduler,
                "switch_b_select",
                &[self.node()],
                Box::new(move |pulse| {
                    let next = payload::<Behavior<T>>(&pulse)?;
                    let Some(join) = join_slot.get() else {
                        return Ok(None);
                    };
                    if rewire(&mut inner, next.node(), join)? {
                        *shared.borrow_mut() = Rc::clone(next.cell());
                        tracing::debug!(join = %join.id(), to = %next.id(), "switch_b switched");
                    }
                    Ok(Some(pulse.with_value(())))
                }),
            )
        };

        let join = join_once(scheduler, "switch_b_join", &[&selector, initial.node()]);
        let _ = join_slot.set(Rc::clone(&join));

        let init = initial.value_now();
        Behavior::hold(&join, "switch_b", init, move |_| Ok(shared.borrow().borrow().clone()))
    }
}

impl<T: Clone + 'static> Behavior<T> {
    /// `lift_b(k).switch_b()`: follow the behavior `k` picks for the current
    /// value.
    pub fn bind_b<U, F>(&self, k: F) -> Behavior<U>
    where
        U: Clone + 'static,
        F: FnMut(&T) -> Behavior<U> + 'static,
    {
        self.lift_b(k).switch_b()
    }
}
