//! Time-Based Combinators
//!
//! Debouncing, delaying, throttling and periodic timers.
//!
//! # Design Decisions
//!
//! 1. Deferred work runs as `tokio::task::spawn_local` tasks and re-enters
//!    the graph through an ordinary send. A task can only run while the
//!    thread is idle, so it never interleaves with a propagation pass.
//!
//! 2. Failures from those sends have no caller. They are logged and kept in
//!    the graph's error log (see [`Graph::take_errors`]).
//!
//! 3. Durations may be fixed or read from a `Behavior<Duration>` at the
//!    moment each event arrives.
//!
//! # Panics
//!
//! Everything here that schedules a task (`calm_e`, `delay_e`, `timer_e`,
//! `one_e` and their behavior forms) panics when called outside a
//! `tokio::task::LocalSet`.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::behavior::Behavior;
use super::runtime::Graph;
use super::stream::EventStream;
use crate::error::Error;
use crate::graph::Node;

/// How long a time-based combinator waits.
#[derive(Debug, Clone)]
pub enum Interval {
    Fixed(Duration),
    /// Sampled each time an event arrives.
    Varying(Behavior<Duration>),
}

impl Interval {
    /// The interval as of now.
    pub fn now(&self) -> Duration {
        match self {
            Interval::Fixed(duration) => *duration,
            Interval::Varying(behavior) => behavior.value_now(),
        }
    }
}

impl From<Duration> for Interval {
    fn from(duration: Duration) -> Self {
        Interval::Fixed(duration)
    }
}

impl From<Behavior<Duration>> for Interval {
    fn from(behavior: Behavior<Duration>) -> Self {
        Interval::Varying(behavior)
    }
}

impl From<&Behavior<Duration>> for Interval {
    fn from(behavior: &Behavior<Duration>) -> Self {
        Interval::Varying(behavior.clone())
    }
}

impl<T: Clone + 'static> EventStream<T> {
    /// Debounce: fire with the latest event once `interval` has passed
    /// without another one.
    pub fn calm_e(&self, interval: impl Into<Interval>) -> EventStream<T> {
        let interval = interval.into();
        let output = self.graph().receiver_e::<T>();
        let target = output.clone();
        let generation = Rc::new(Cell::new(0_u64));
        let mut pending: Option<JoinHandle<()>> = None;

        self.derive::<(), _>("calm_e", move |value| {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
            let ticket = generation.get() + 1;
            generation.set(ticket);

            let wait = interval.now();
            let value = value.clone();
            let target = target.clone();
            let generation = Rc::clone(&generation);
            pending = Some(tokio::task::spawn_local(async move {
                tokio::time::sleep(wait).await;
                if generation.get() == ticket {
                    target.deliver(value);
                }
            }));
            Ok(None)
        });

        output
    }

    /// Fire every event again after `interval`.
    ///
    /// With a varying interval, events still waiting when the interval
    /// changes are dropped.
    pub fn delay_e(&self, interval: impl Into<Interval>) -> EventStream<T> {
        let interval = interval.into();
        let output = self.graph().receiver_e::<T>();
        let target = output.clone();
        let epoch = Rc::new(Cell::new(0_u64));

        if let Interval::Varying(behavior) = &interval {
            let epoch = Rc::clone(&epoch);
            behavior.changes().map_e(move |_| epoch.set(epoch.get() + 1));
        }

        self.derive::<(), _>("delay_e", move |value| {
            let wait = interval.now();
            let scheduled = epoch.get();
            let value = value.clone();
            let target = target.clone();
            let epoch = Rc::clone(&epoch);
            tokio::task::spawn_local(async move {
                tokio::time::sleep(wait).await;
                if epoch.get() == scheduled {
                    target.deliver(value);
                }
            });
            Ok(None)
        });

        output
    }

    /// Throttle: forward an event only if more than `interval` has passed
    /// since the last forwarded one.
    pub fn blind_e(&self, interval: impl Into<Interval>) -> EventStream<T> {
        let interval = interval.into();
        let mut last: Option<Instant> = None;
        self.filter_e(move |_| {
            let now = Instant::now();
            match last {
                Some(at) if now.duration_since(at) <= interval.now() => false,
                _ => {
                    last = Some(now);
                    true
                }
            }
        })
    }
}

impl<T: Clone + 'static> Behavior<T> {
    /// Behavior form of [`EventStream::calm_e`].
    pub fn calm_b(&self, interval: impl Into<Interval>) -> Behavior<T> {
        self.changes().calm_e(interval).starts_with(self.value_now())
    }

    /// Behavior form of [`EventStream::delay_e`].
    pub fn delay_b(&self, interval: impl Into<Interval>) -> Behavior<T> {
        self.changes().delay_e(interval).starts_with(self.value_now())
    }

    /// Behavior form of [`EventStream::blind_e`].
    pub fn blind_b(&self, interval: impl Into<Interval>) -> Behavior<T> {
        self.changes().blind_e(interval).starts_with(self.value_now())
    }
}

impl Graph {
    /// Fires every `period` with the tick time.
    ///
    /// The timer stops once nothing holds the stream and nothing listens to
    /// it.
    pub fn timer_e(&self, period: Duration) -> EventStream<Instant> {
        let period = period.max(Duration::from_millis(1));
        let output = self.receiver_e::<Instant>();
        let ticks = output.clone();

        tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                let at = ticker.tick().await;
                if Rc::strong_count(ticks.node()) == 1 && ticks.node().listener_count() == 0 {
                    tracing::debug!(node = %ticks.id(), "timer released");
                    break;
                }
                ticks.deliver(at);
            }
        });

        output
    }

    /// The time of the latest tick, starting at the current time.
    pub fn timer_b(&self, period: Duration) -> Behavior<Instant> {
        self.timer_e(period).starts_with(Instant::now())
    }

    /// Fires `value` once, on the next turn of the event loop.
    ///
    /// Any later pulse into the stream fails with [`Error::OneShotRefired`].
    pub fn one_e<T: 'static>(&self, value: T) -> EventStream<T> {
        let mut fired = false;
        let output = EventStream::from_node(Node::new(
            self.scheduler(),
            "one_e",
            &[],
            Box::new(move |pulse| {
                if std::mem::replace(&mut fired, true) {
                    return Err(Error::OneShotRefired);
                }
                Ok(Some(pulse))
            }),
        ));

        let once = output.clone();
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            once.deliver(value);
        });

        output
    }
}
