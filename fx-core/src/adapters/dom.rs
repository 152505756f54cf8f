//! Form Controls and Element Events
//!
//! The graph never talks to a document directly. It sees elements through
//! the [`Element`] trait: something that can register event callbacks and
//! read and write a form value.
//!
//! # Ownership
//!
//! An element owns the callbacks registered on it, and each callback owns
//! the receiver it feeds. Graph nodes that read from or write to an element
//! only hold a `Weak` reference, so a wired element and its graph never keep
//! each other alive.

use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::reactive::{Behavior, EventStream, Graph};

/// The kind of form control an element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Text inputs, text areas, hidden and password fields.
    Text,
    /// Like `Text`, but every trigger produces a change even when the value
    /// is the same.
    Button,
    Select,
    SelectMultiple,
    Checkbox,
    Radio,
}

impl ControlKind {
    /// Events after which the control's value is read again.
    pub fn triggers(&self) -> &'static [&'static str] {
        match self {
            ControlKind::Text | ControlKind::Button => &["click", "keyup", "change"],
            ControlKind::Select | ControlKind::SelectMultiple => &["change"],
            ControlKind::Checkbox | ControlKind::Radio => &["click"],
        }
    }

    /// Whether identical consecutive readings are collapsed.
    pub fn filters_repeats(&self) -> bool {
        !matches!(self, ControlKind::Button | ControlKind::SelectMultiple)
    }
}

/// The value of a form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Checked(bool),
    /// Selected options, in document order.
    Selected(Vec<String>),
}

impl From<String> for FormValue {
    fn from(text: String) -> Self {
        FormValue::Text(text)
    }
}

impl From<&str> for FormValue {
    fn from(text: &str) -> Self {
        FormValue::Text(text.to_string())
    }
}

impl From<bool> for FormValue {
    fn from(checked: bool) -> Self {
        FormValue::Checked(checked)
    }
}

/// An element the graph can listen to and update.
pub trait Element {
    /// What the element's event callbacks receive.
    type Event: Clone + 'static;

    /// Register `callback` for every `event` on this element.
    fn listen(&self, event: &str, callback: Box<dyn FnMut(Self::Event)>);

    fn control(&self) -> ControlKind;

    /// Read the current form value.
    fn value(&self) -> FormValue;

    fn set_value(&self, value: &FormValue);
}

/// A stream of every `event` raised on `element`.
pub fn extract_event_e<E>(graph: &Graph, element: &E, event: &str) -> EventStream<E::Event>
where
    E: Element + ?Sized,
{
    let events = graph.receiver_e::<E::Event>();
    let sink = events.clone();
    element.listen(event, Box::new(move |raised| sink.deliver(raised)));
    events
}

/// A stream of every event named in `events`, merged.
pub fn extract_events_e<E>(graph: &Graph, element: &E, events: &[&str]) -> EventStream<E::Event>
where
    E: Element + ?Sized,
{
    let streams: Vec<_> = events
        .iter()
        .map(|event| extract_event_e(graph, element, event))
        .collect();
    graph.merge_e(&streams)
}

/// The value of `element`, read again whenever `trigger` fires.
///
/// Starts at the value the element has right now.
pub fn extract_value_on_event_b<X, E>(trigger: &EventStream<X>, element: &Rc<E>) -> Behavior<FormValue>
where
    X: 'static,
    E: Element + 'static,
{
    let initial = element.value();
    let target: Weak<E> = Rc::downgrade(element);
    let readings =
        trigger.derive("extract_value", move |_| Ok(target.upgrade().map(|element| element.value())));

    if element.control().filters_repeats() {
        readings
            .filter_repeats_e(Some(initial.clone()))
            .starts_with(initial)
    } else {
        readings.starts_with(initial)
    }
}

/// The value of a form control, refreshed on the triggers of its
/// [`ControlKind`].
pub fn extract_value_b<E>(graph: &Graph, element: &Rc<E>) -> Behavior<FormValue>
where
    E: Element + 'static,
{
    let trigger = extract_events_e(graph, element.as_ref(), element.control().triggers());
    extract_value_on_event_b(&trigger, element)
}

/// Write every event of `stream` into `element`.
pub fn insert_value_e<T, E>(stream: &EventStream<T>, element: &Rc<E>)
where
    T: Clone + Into<FormValue> + 'static,
    E: Element + 'static,
{
    let target: Weak<E> = Rc::downgrade(element);
    stream.map_e(move |value| {
        if let Some(element) = target.upgrade() {
            element.set_value(&value.clone().into());
        }
    });
}

/// Write the current value of `behavior` into `element` now and again on
/// every change.
pub fn insert_value_b<T, E>(behavior: &Behavior<T>, element: &Rc<E>)
where
    T: Clone + Into<FormValue> + 'static,
    E: Element + 'static,
{
    element.set_value(&behavior.value_now().into());
    insert_value_e(&behavior.changes(), element);
}

/// Build an element whose own events are inputs to its construction.
///
/// One placeholder stream per name in `events` is handed to `maker`; once
/// the element exists, its real events are attached to the placeholders.
pub fn tag_rec<E, F>(graph: &Graph, events: &[&str], maker: F) -> Result<Rc<E>>
where
    E: Element + 'static,
    F: FnOnce(&[EventStream<E::Event>]) -> Rc<E>,
{
    let placeholders: Vec<EventStream<E::Event>> = events.iter().map(|_| graph.receiver_e()).collect();
    let element = maker(&placeholders);

    for (event, placeholder) in events.iter().zip(&placeholders) {
        extract_event_e(graph, element.as_ref(), event).attach(placeholder)?;
    }
    Ok(element)
}
