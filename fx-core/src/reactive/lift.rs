//! Lifting
//!
//! Lifting turns a plain function over values into a behavior over
//! behaviors. The result recomputes whenever any input changes.
//!
//! # How It Works
//!
//! A lifted behavior over several inputs is two nodes:
//!
//! 1. A join node listening to every input. It forwards at most one pulse
//!    per stamp, so a stimulus reaching several inputs triggers a single
//!    recomputation.
//!
//! 2. A behavior node below the join that reads every input's cached value
//!    and applies the function.
//!
//! The join is created after its inputs and therefore outranks them; by the
//! time it runs every input that will change in this pass already has.
//!
//! The recompute closure captures only the inputs' value cells, never their
//! nodes. The inputs own the join through their listener sets, so capturing
//! a node would make the subgraph own itself.

use std::cell::RefCell;
use std::rc::Rc;

use super::behavior::Behavior;
use super::runtime::Graph;
use super::stream::payload;
use crate::graph::{Node, Scheduler};

/// Build a lifted behavior over `inputs`, recomputed by `compute`.
fn lift_nodes<U, F>(scheduler: &Rc<Scheduler>, inputs: &[&Rc<Node>], mut compute: F) -> Behavior<U>
where
    U: Clone + 'static,
    F: FnMut() -> U + 'static,
{
    let mut last_stamp = 0;
    let join = Node::new(
        scheduler,
        "lift_join",
        inputs,
        Box::new(move |pulse| {
            if pulse.stamp() == last_stamp {
                return Ok(None);
            }
            last_stamp = pulse.stamp();
            Ok(Some(pulse))
        }),
    );

    let init = compute();
    Behavior::hold(&join, "lift_b", init, move |_| Ok(compute()))
}

impl<T: Clone + 'static> Behavior<T> {
    /// Apply `f` to the current value and to every later value.
    pub fn lift_b<U, F>(&self, mut f: F) -> Behavior<U>
    where
        U: Clone + 'static,
        F: FnMut(&T) -> U + 'static,
    {
        let init = self.with_value(&mut f);
        Behavior::hold(self.node(), "lift_b", init, move |pulse| {
            Ok(f(payload::<T>(pulse)?))
        })
    }

    /// Alias for [`Behavior::lift_b`].
    pub fn map_b<U, F>(&self, f: F) -> Behavior<U>
    where
        U: Clone + 'static,
        F: FnMut(&T) -> U + 'static,
    {
        self.lift_b(f)
    }

    pub fn not_b(&self) -> Behavior<T::Output>
    where
        T: std::ops::Not,
        T::Output: Clone + 'static,
    {
        self.lift_b(|value| !value.clone())
    }
}

impl Behavior<bool> {
    /// `then` while this behavior is true, `otherwise` while it is false.
    pub fn if_b<T: Clone + 'static>(&self, then: &Behavior<T>, otherwise: &Behavior<T>) -> Behavior<T> {
        let (cond, then_b, else_b) = (
            Rc::clone(self.cell()),
            Rc::clone(then.cell()),
            Rc::clone(otherwise.cell()),
        );
        lift_nodes(
            self.node().scheduler(),
            &[self.node(), then.node(), otherwise.node()],
            move || {
                if *cond.borrow() {
                    then_b.borrow().clone()
                } else {
                    else_b.borrow().clone()
                }
            },
        )
    }
}

impl Graph {
    /// Combine two behaviors with `f`.
    pub fn lift_b2<A, B, U, F>(&self, a: &Behavior<A>, b: &Behavior<B>, mut f: F) -> Behavior<U>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        U: Clone + 'static,
        F: FnMut(&A, &B) -> U + 'static,
    {
        let (left, right) = (Rc::clone(a.cell()), Rc::clone(b.cell()));
        lift_nodes(self.scheduler(), &[a.node(), b.node()], move || {
            f(&*left.borrow(), &*right.borrow())
        })
    }

    /// Combine three behaviors with `f`.
    pub fn lift_b3<A, B, C, U, F>(
        &self,
        a: &Behavior<A>,
        b: &Behavior<B>,
        c: &Behavior<C>,
        mut f: F,
    ) -> Behavior<U>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        C: Clone + 'static,
        U: Clone + 'static,
        F: FnMut(&A, &B, &C) -> U + 'static,
    {
        let (first, second, third) = (Rc::clone(a.cell()), Rc::clone(b.cell()), Rc::clone(c.cell()));
        lift_nodes(self.scheduler(), &[a.node(), b.node(), c.node()], move || {
            f(&*first.borrow(), &*second.borrow(), &*third.borrow())
        })
    }

    /// Combine any number of same-typed behaviors.
    pub fn lift_all<T, U, F>(&self, inputs: &[Behavior<T>], mut f: F) -> Behavior<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
        F: FnMut(&[T]) -> U + 'static,
    {
        let nodes: Vec<&Rc<Node>> = inputs.iter().map(Behavior::node).collect();
        let cells: Vec<Rc<RefCell<T>>> = inputs.iter().map(|input| Rc::clone(input.cell())).collect();
        lift_nodes(self.scheduler(), &nodes, move || {
            let values: Vec<T> = cells.iter().map(|cell| cell.borrow().clone()).collect();
            f(&values)
        })
    }

    /// True while every input is true. With no inputs, always true.
    pub fn and_b(&self, inputs: &[Behavior<bool>]) -> Behavior<bool> {
        self.lift_all(inputs, |values| values.iter().all(|v| *v))
    }

    /// True while any input is true. With no inputs, always false.
    pub fn or_b(&self, inputs: &[Behavior<bool>]) -> Behavior<bool> {
        self.lift_all(inputs, |values| values.iter().any(|v| *v))
    }

    /// The value of the first branch whose condition holds, or `None`.
    pub fn cond_b<T: Clone + 'static>(
        &self,
        branches: &[(Behavior<bool>, Behavior<T>)],
    ) -> Behavior<Option<T>> {
        let nodes: Vec<&Rc<Node>> = branches
            .iter()
            .flat_map(|(cond, value)| [cond.node(), value.node()])
            .collect();
        let cells: Vec<(Rc<RefCell<bool>>, Rc<RefCell<T>>)> = branches
            .iter()
            .map(|(cond, value)| (Rc::clone(cond.cell()), Rc::clone(value.cell())))
            .collect();
        lift_nodes(self.scheduler(), &nodes, move || {
            cells
                .iter()
                .find(|(cond, _)| *cond.borrow())
                .map(|(_, value)| value.borrow().clone())
        })
    }
}
