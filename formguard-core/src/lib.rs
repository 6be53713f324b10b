//! Request plumbing shared by the formguard crates: a minimal
//! [`HttpRequest`]/[`HttpResponse`] pair, an [`Error`] with HTTP status
//! mapping, and an async [`Middleware`] chain.

pub mod error;
pub mod form;
pub mod http;
pub mod middleware;

pub use cookie::{Cookie, SameSite};
pub use error::{Error, INVALID_AUTHENTICITY_TOKEN};
pub use form::{escape_attribute, parse_form, parse_form_map};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use middleware::{HandlerFn, Middleware, MiddlewareChain, Next, handler};
