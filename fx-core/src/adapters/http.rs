//! HTTP Requests as Event Streams
//!
//! Each event of a request stream becomes one HTTP request; each finished
//! request becomes one event of the returned completion stream.
//!
//! # Design Decisions
//!
//! 1. The transport is a trait returning a local boxed future, so tests can
//!    answer requests from memory and the `reqwest` feature can plug in a
//!    real client.
//!
//! 2. A failed request is a normal completion. Its `raw.error` is set and
//!    `raw.status` is empty; nothing is thrown into the graph.
//!
//! 3. Requests run as local tasks and complete through an ordinary send,
//!    never inside the pass that issued them.
//!
//! # Panics
//!
//! [`EventStream::post`], [`EventStream::put`] and [`EventStream::get`]
//! spawn a local task per event and panic if an event arrives outside a
//! `tokio::task::LocalSet`.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;

use crate::error::{Error, Result};
use crate::reactive::EventStream;

/// Query parameters for [`EventStream::get`], encoded in key order.
pub type Params = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transport hands back for a request that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server answered with status {0}")]
    Status(u16),
}

/// Status and failure details of one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// One finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<R> {
    /// The event that triggered the request.
    pub request: R,
    /// Response body; empty when the request failed.
    pub response: String,
    pub raw: Exchange,
}

impl<R> Completion<R> {
    /// Whether the server answered with a 2xx status.
    pub fn is_success(&self) -> bool {
        matches!(self.raw.status, Some(status) if (200..300).contains(&status))
    }

    /// Turn failed requests and non-2xx answers into errors.
    pub fn error_for_status(self) -> Result<Self> {
        if let Some(error) = &self.raw.error {
            return Err(TransportError::Request(error.clone()).into());
        }
        match self.raw.status {
            Some(status) if !(200..300).contains(&status) => {
                Err(Error::Transport(TransportError::Status(status)))
            }
            _ => Ok(self),
        }
    }
}

/// Something that can perform an HTTP request.
pub trait Transport {
    fn send(
        &self,
        method: Method,
        url: &str,
        body: String,
    ) -> LocalBoxFuture<'static, std::result::Result<RawResponse, TransportError>>;
}

/// Characters a URI component may carry unescaped that `urlencoding`
/// escapes anyway.
const COMPONENT_MARKS: [(&str, &str); 5] = [("%21", "!"), ("%27", "'"), ("%28", "("), ("%29", ")"), ("%2A", "*")];

/// Percent-encode one query value, leaving `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
/// as they are.
fn encode_component(value: &str) -> String {
    let mut encoded = urlencoding::encode(value).into_owned();
    for (escaped, mark) in COMPONENT_MARKS {
        if encoded.contains(escaped) {
            encoded = encoded.replace(escaped, mark);
        }
    }
    encoded
}

/// Encode parameters as `key=value` pairs joined by `&`. Values are
/// percent-encoded; keys are used as given.
pub fn encode_params(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Issue one request per event of `source` and stream the completions.
fn request<R, X, F>(
    source: &EventStream<R>,
    transport: &Rc<X>,
    method: Method,
    mut build: F,
) -> EventStream<Completion<R>>
where
    R: Clone + 'static,
    X: Transport + ?Sized + 'static,
    F: FnMut(&R) -> (String, String) + 'static,
{
    let completions = source.graph().receiver_e::<Completion<R>>();
    let target = completions.clone();
    let transport = Rc::clone(transport);

    source.map_e(move |request| {
        let (url, body) = build(request);
        tracing::debug!(%method, %url, "sending request");
        let pending = transport.send(method, &url, body);
        let request = request.clone();
        let target = target.clone();

        tokio::task::spawn_local(async move {
            let completion = match pending.await {
                Ok(raw) => Completion {
                    request,
                    response: raw.body,
                    raw: Exchange {
                        status: Some(raw.status),
                        error: None,
                    },
                },
                Err(error) => {
                    tracing::warn!(%method, %url, %error, "request failed");
                    Completion {
                        request,
                        response: String::new(),
                        raw: Exchange {
                            status: None,
                            error: Some(error.to_string()),
                        },
                    }
                }
            };
            target.deliver(completion);
        });
    });

    completions
}

impl EventStream<String> {
    /// POST every event to `url` as the request body.
    pub fn post<X>(&self, transport: &Rc<X>, url: impl Into<String>) -> EventStream<Completion<String>>
    where
        X: Transport + ?Sized + 'static,
    {
        let url = url.into();
        request(self, transport, Method::Post, move |body| (url.clone(), body.clone()))
    }

    /// PUT every event to `url` as the request body.
    pub fn put<X>(&self, transport: &Rc<X>, url: impl Into<String>) -> EventStream<Completion<String>>
    where
        X: Transport + ?Sized + 'static,
    {
        let url = url.into();
        request(self, transport, Method::Put, move |body| (url.clone(), body.clone()))
    }
}

impl EventStream<Params> {
    /// GET `url` with every event encoded as the query string.
    pub fn get<X>(&self, transport: &Rc<X>, url: impl Into<String>) -> EventStream<Completion<Params>>
    where
        X: Transport + ?Sized + 'static,
    {
        let url = url.into();
        request(self, transport, Method::Get, move |params| {
            (format!("{url}?{}", encode_params(params)), String::new())
        })
    }
}

/// [`Transport`] backed by a `reqwest` client.
#[cfg(feature = "reqwest")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
    fn send(
        &self,
        method: Method,
        url: &str,
        body: String,
    ) -> LocalBoxFuture<'static, std::result::Result<RawResponse, TransportError>> {
        use futures_util::FutureExt;

        let builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url).body(body),
            Method::Put => self.client.put(url).body(body),
        };

        async move {
            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;
            Ok(RawResponse { status, body })
        }
        .boxed_local()
    }
}
