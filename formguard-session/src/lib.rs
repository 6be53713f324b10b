//! Session storage for formguard.
//!
//! A [`SessionStore`] is the capability the CSRF guard is handed to keep
//! one token per session. [`MemorySessionStore`] is the bundled backend;
//! shared caches plug in by implementing the trait.
//!
//! ```
//! use formguard_session::*;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), SessionError> {
//! let config = SessionConfig::new().with_default_ttl(Duration::from_secs(1800));
//! let store = MemorySessionStore::new(config)?;
//!
//! let mut session = store.create(None).await?;
//! session.set("user_id", 123)?;
//! store.save(&session).await?;
//!
//! // Logout
//! store.delete(&session.id).await?;
//! assert!(!store.exists(&session.id).await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use memory::MemorySessionStore;
pub use traits::{Session, SessionStore, generate_session_id};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::memory::MemorySessionStore;
    pub use crate::traits::{Session, SessionStore, generate_session_id};
}
