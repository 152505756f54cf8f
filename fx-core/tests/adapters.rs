//! Integration Tests for Boundary Adapters
//!
//! HTTP streams run against an in-memory transport; form bindings run
//! against a scripted element.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::{json, Value};
use tokio::task::LocalSet;
use tokio::time::sleep;

use fx_core::adapters::dom::{self, ControlKind, Element, FormValue};
use fx_core::adapters::http::{
    Completion, Method, Params, RawResponse, Transport, TransportError,
};
use fx_core::{Error, Graph};

/// Answers after a short delay. URLs containing `missing` get a 404 and
/// URLs containing `offline` fail outright; everything else echoes the body.
#[derive(Default)]
struct MemoryTransport {
    requests: RefCell<Vec<(Method, String, String)>>,
}

impl Transport for MemoryTransport {
    fn send(
        &self,
        method: Method,
        url: &str,
        body: String,
    ) -> LocalBoxFuture<'static, Result<RawResponse, TransportError>> {
        self.requests
            .borrow_mut()
            .push((method, url.to_string(), body.clone()));
        let url = url.to_string();

        async move {
            sleep(Duration::from_millis(10)).await;
            if url.contains("offline") {
                Err(TransportError::Request(String::from("connection refused")))
            } else if url.contains("missing") {
                Ok(RawResponse {
                    status: 404,
                    body: String::new(),
                })
            } else {
                Ok(RawResponse { status: 200, body })
            }
        }
        .boxed_local()
    }
}

fn latest<T: Clone + 'static>(stream: &fx_core::EventStream<T>) -> fx_core::Behavior<Option<T>> {
    stream.map_e(|value| Some(value.clone())).starts_with(None)
}

#[tokio::test(start_paused = true)]
async fn post_completes_with_request_and_response() {
    LocalSet::new()
        .run_until(async {
            let graph = Graph::new();
            let transport = Rc::new(MemoryTransport::default());
            let bodies = graph.receiver_e::<String>();
            let done = latest(&bodies.post(&transport, "https://api.test/items"));

            bodies.send_event(String::from(r#"{"id":7}"#)).unwrap();
            assert_eq!(done.value_now(), None);

            sleep(Duration::from_millis(20)).await;
            let completion = done.value_now().expect("request completed");
            assert_eq!(completion.request, r#"{"id":7}"#);
            assert_eq!(completion.response, r#"{"id":7}"#);
            assert_eq!(completion.raw.status, Some(200));
            assert!(completion.is_success());

            let requests = transport.requests.borrow();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].0, Method::Post);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn get_encodes_query_string() {
    LocalSet::new()
        .run_until(async {
            let graph = Graph::new();
            let transport = Rc::new(MemoryTransport::default());
            let queries = graph.receiver_e::<Params>();
            let done = latest(&queries.get(&transport, "https://api.test/search"));

            let mut params = Params::new();
            params.insert(String::from("q"), String::from("fx streams"));
            params.insert(String::from("page"), String::from("2"));
            queries.send_event(params.clone()).unwrap();
            sleep(Duration::from_millis(20)).await;

            let (method, url, body) = transport.requests.borrow()[0].clone();
            assert_eq!(method, Method::Get);
            assert_eq!(url, "https://api.test/search?page=2&q=fx%20streams");
            assert!(body.is_empty());

            let completion: Completion<Params> = done.value_now().expect("request completed");
            assert_eq!(completion.request, params);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn failures_are_ordinary_completions() {
    LocalSet::new()
        .run_until(async {
            let graph = Graph::new();
            let transport: Rc<dyn Transport> = Rc::new(MemoryTransport::default());
            let bodies = graph.receiver_e::<String>();
            let missing = latest(&bodies.put(&transport, "https://api.test/missing"));
            let offline = latest(&bodies.post(&transport, "https://offline.test/"));

            bodies.send_event(String::from("x")).unwrap();
            sleep(Duration::from_millis(20)).await;

            let missing = missing.value_now().expect("request completed");
            assert_eq!(missing.raw.status, Some(404));
            assert!(missing.raw.error.is_none());
            assert!(!missing.is_success());

            let offline = offline.value_now().expect("request completed");
            assert_eq!(offline.raw.status, None);
            assert!(offline.raw.error.is_some());
            assert!(offline.response.is_empty());

            assert!(graph.take_errors().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn response_bodies_parse_as_json() {
    LocalSet::new()
        .run_until(async {
            let graph = Graph::new();
            let transport = Rc::new(MemoryTransport::default());
            let payloads = graph.receiver_e::<Value>();
            let names = payloads
                .json_stringify()
                .post(&transport, "https://api.test/echo")
                .map_e(|completion| completion.response.clone())
                .json_parse::<Value>()
                .index("name");
            let name = latest(&names);

            payloads.send_event(json!({ "name": "fx" })).unwrap();
            sleep(Duration::from_millis(20)).await;
            assert_eq!(name.value_now(), Some(json!("fx")));

            payloads.send_event(json!(["not", "an", "object"])).unwrap();
            sleep(Duration::from_millis(20)).await;
            let errors = graph.take_errors();
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], Error::UnexpectedValue(_)));
        })
        .await;
}

/// A text field whose value is set by tests before firing its events.
struct Field {
    kind: ControlKind,
    value: RefCell<FormValue>,
    callbacks: RefCell<Vec<(String, Box<dyn FnMut(String)>)>>,
}

impl Field {
    fn new(kind: ControlKind, value: impl Into<FormValue>) -> Rc<Self> {
        Rc::new(Self {
            kind,
            value: RefCell::new(value.into()),
            callbacks: RefCell::new(Vec::new()),
        })
    }

    fn fire(&self, event: &str) {
        for (name, callback) in self.callbacks.borrow_mut().iter_mut() {
            if name == event {
                callback(event.to_string());
            }
        }
    }

    fn change_to(&self, value: impl Into<FormValue>, event: &str) {
        *self.value.borrow_mut() = value.into();
        self.fire(event);
    }
}

impl Element for Field {
    type Event = String;

    fn listen(&self, event: &str, callback: Box<dyn FnMut(String)>) {
        self.callbacks.borrow_mut().push((event.to_string(), callback));
    }

    fn control(&self) -> ControlKind {
        self.kind
    }

    fn value(&self) -> FormValue {
        self.value.borrow().clone()
    }

    fn set_value(&self, value: &FormValue) {
        *self.value.borrow_mut() = value.clone();
    }
}

#[test]
fn form_fields_drive_a_preview() {
    let graph = Graph::new();
    let first = Field::new(ControlKind::Text, "Ada");
    let last = Field::new(ControlKind::Text, "Lovelace");
    let preview = Field::new(ControlKind::Text, "");

    let first_b = dom::extract_value_b(&graph, &first);
    let last_b = dom::extract_value_b(&graph, &last);
    let full = graph.lift_b2(&first_b, &last_b, |a, b| match (a, b) {
        (FormValue::Text(a), FormValue::Text(b)) => format!("{a} {b}"),
        _ => String::new(),
    });
    dom::insert_value_b(&full, &preview);
    assert_eq!(preview.value(), FormValue::from("Ada Lovelace"));

    first.change_to("Grace", "keyup");
    last.change_to("Hopper", "change");
    assert_eq!(preview.value(), FormValue::from("Grace Hopper"));
}

#[test]
fn select_reads_on_explicit_trigger() {
    let graph = Graph::new();
    let select = Field::new(ControlKind::SelectMultiple, FormValue::Selected(vec![]));
    let refresh = graph.receiver_e::<()>();
    let chosen = dom::extract_value_on_event_b(&refresh, &select);

    select.change_to(FormValue::Selected(vec![String::from("red")]), "change");
    assert_eq!(chosen.value_now(), FormValue::Selected(vec![]));

    refresh.send_event(()).unwrap();
    assert_eq!(chosen.value_now(), FormValue::Selected(vec![String::from("red")]));
}

#[test]
fn element_events_merge_in_order() {
    let graph = Graph::new();
    let field = Field::new(ControlKind::Text, "");
    let log = dom::extract_events_e(&graph, field.as_ref(), &["focus", "blur"])
        .collect_e(Vec::new(), |event: &String, acc: &Vec<String>| {
            let mut next = acc.clone();
            next.push(event.clone());
            next
        })
        .starts_with(Vec::new());

    field.fire("focus");
    field.fire("keyup");
    field.fire("blur");
    assert_eq!(log.value_now(), vec![String::from("focus"), String::from("blur")]);
}
