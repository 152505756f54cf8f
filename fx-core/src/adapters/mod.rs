//! Boundary Adapters
//!
//! Adapters connect the graph to the outside world. They create receivers,
//! feed them from callbacks or completed requests, and apply graph values
//! back to external objects.
//!
//! - `dom`: element events and form values through the [`dom::Element`] trait
//! - `http`: request streams over a pluggable [`http::Transport`]
//! - `json`: parsing and serializing stream values with `serde_json`

pub mod dom;
pub mod http;
pub mod json;

pub use dom::{ControlKind, Element, FormValue};
pub use http::{Completion, Exchange, Method, Params, RawResponse, Transport, TransportError};

#[cfg(feature = "reqwest")]
pub use http::ReqwestTransport;
