// Formguard - cross-site request forgery protection for form submissions
//
// Every state-changing form submission must carry the authenticity token that
// was issued into the submitter's session. The pieces live in member crates and
// are re-exported here behind features.

// Re-export core functionality
pub use formguard_core::*;

pub use formguard_log;

#[cfg(feature = "session")]
pub use formguard_session;

#[cfg(feature = "csrf")]
pub use formguard_csrf;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Cookie, Error, HandlerFn, HttpMethod, HttpRequest, HttpResponse, Middleware,
        MiddlewareChain, Next, handler,
    };

    #[cfg(feature = "session")]
    pub use formguard_session::{MemorySessionStore, Session, SessionConfig, SessionStore};

    #[cfg(feature = "csrf")]
    pub use formguard_csrf::{
        CsrfConfig, CsrfError, CsrfGuard, CsrfMiddleware, CsrfToken, HiddenField, RotationPolicy,
        Verification, request_session, request_token,
    };
}
