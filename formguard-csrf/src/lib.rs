//! # formguard CSRF protection
//!
//! Synchronizer-token CSRF protection for HTML forms. Each session holds
//! one opaque authenticity token; every rendered form embeds it in a
//! hidden field and every state-changing request must send it back.
//!
//! ## Features
//!
//! - ✅ **Session-bound tokens** - stored through an injected [`SessionStore`]
//! - ✅ **OS randomness** - at least 128 bits per token, URL-safe base64
//! - ✅ **Optional rotation** - one-shot tokens with atomic swap on verify
//! - ✅ **Uniform rejection** - every failure is a 422 "Invalid authenticity token"
//! - ✅ **Middleware integration** - header, form field or JSON body
//! - ✅ **Path exclusion** - skip webhooks and other token-less endpoints
//!
//! ## Quick Start
//!
//! ```rust
//! use formguard_csrf::{CsrfConfig, CsrfGuard, CsrfMiddleware, RotationPolicy};
//! use formguard_session::MemorySessionStore;
//! use std::sync::Arc;
//!
//! let config = CsrfConfig::default()
//!     .with_rotation(RotationPolicy::PerVerification)
//!     .with_exclude_paths(vec!["/webhooks".to_string()]);
//!
//! let store = Arc::new(MemorySessionStore::default());
//! let guard = CsrfGuard::new(config, store).unwrap();
//! let csrf = CsrfMiddleware::new(guard);
//! ```
//!
//! ## Rendering a form
//!
//! ```rust,ignore
//! async fn new_post(req: HttpRequest) -> Result<HttpResponse, Error> {
//!     let token = request_token(&req).expect("CsrfMiddleware runs first");
//!     let field = guard.embed(token);
//!     Ok(HttpResponse::ok().with_html(format!(
//!         r#"<form method="post" action="/posts">{}<input name="title"></form>"#,
//!         field
//!     )))
//! }
//! ```
//!
//! [`SessionStore`]: formguard_session::SessionStore

pub mod config;
pub mod error;
pub mod field;
pub mod guard;
pub mod middleware;
pub mod token;

pub use config::{CsrfConfig, ENV_PREFIX, RotationPolicy, SameSite};
pub use error::{CsrfError, Result};
pub use field::{HiddenField, MetaTags};
pub use guard::{CsrfGuard, Verification};
pub use middleware::{CsrfMiddleware, SessionId, request_session, request_token};
pub use token::{CsrfToken, MIN_TOKEN_BYTES};
