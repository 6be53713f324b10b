use crate::error::CsrfError;
use crate::guard::CsrfGuard;
use crate::token::CsrfToken;
use async_trait::async_trait;
use formguard_core::{
    Cookie, Error as HttpError, HttpRequest, HttpResponse, Middleware, Next,
};
use formguard_log::{debug, error, warn};
use formguard_session::SessionStore;

/// Session identifier resolved by [`CsrfMiddleware`], stored in request
/// extensions next to the current [`CsrfToken`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

/// CSRF protection middleware
///
/// Safe requests get a session (created on first visit) and its token in
/// the request extensions, ready for [`CsrfGuard::embed`]. Every other
/// request must carry the token in the configured header, form field or
/// JSON field; otherwise the chain stops with
/// `Error::InvalidAuthenticityToken` and the handler never runs.
pub struct CsrfMiddleware<S> {
    guard: CsrfGuard<S>,
}

impl<S> Clone for CsrfMiddleware<S> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
        }
    }
}

impl<S: SessionStore> CsrfMiddleware<S> {
    pub fn new(guard: CsrfGuard<S>) -> Self {
        Self { guard }
    }

    pub fn guard(&self) -> &CsrfGuard<S> {
        &self.guard
    }

    /// Check if request needs CSRF protection
    pub fn needs_protection(&self, request: &HttpRequest) -> bool {
        let config = self.guard.config();
        !config.is_safe_method(&request.method) && !config.is_excluded(&request.path)
    }

    /// Token submitted with the request: a non-empty header first, then the
    /// body field.
    pub fn submitted_token(&self, request: &HttpRequest) -> Option<String> {
        let config = self.guard.config();

        if let Some(value) = request.header(&config.header_name)
            && !value.trim().is_empty()
        {
            return Some(value.to_string());
        }

        match request.media_type().as_deref() {
            Some("application/json") => {
                let json: serde_json::Value = serde_json::from_slice(&request.body).ok()?;
                json.get(&config.field_name)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            }
            None | Some("application/x-www-form-urlencoded") => {
                request.form().ok()?.remove(&config.field_name)
            }
            Some(_) => None,
        }
    }

    /// Live session named by the request cookie, if any.
    async fn resolve_session(&self, request: &HttpRequest) -> Result<Option<String>, CsrfError> {
        let Some(id) = request.cookie(&self.guard.config().cookie_name) else {
            return Ok(None);
        };
        Ok(self.guard.store().exists(&id).await?.then_some(id))
    }

    fn session_cookie(&self, session_id: &str) -> Cookie<'static> {
        let config = self.guard.config();
        let mut builder = Cookie::build((config.cookie_name.clone(), session_id.to_string()))
            .path(config.cookie_path.clone())
            .secure(config.cookie_secure)
            .http_only(config.cookie_http_only)
            .same_site(config.cookie_same_site.into());

        if let Some(domain) = &config.cookie_domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }

    async fn admit_safe(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, HttpError> {
        let (session_id, token, fresh) = match self.resolve_session(&req).await? {
            Some(id) => {
                let token = self.guard.issue(&id).await?;
                (id, token, false)
            }
            None => {
                let (id, token) = self.guard.create_session().await?;
                (id, token, true)
            }
        };

        req.extensions.insert(token);
        req.extensions.insert(SessionId(session_id.clone()));

        match next(req).await {
            Ok(mut response) => {
                if fresh {
                    response.append_cookie(&self.session_cookie(&session_id));
                }
                Ok(response)
            }
            Err(e) => {
                // The client never learns a fresh session's id.
                if fresh && let Err(cleanup) = self.guard.store().delete(&session_id).await {
                    warn!(
                        target: "formguard::csrf",
                        "Could not drop unused session {}: {}",
                        session_id,
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    async fn admit_unsafe(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, HttpError> {
        let outcome = async {
            let submitted = self.submitted_token(&req).ok_or(CsrfError::MissingToken)?;
            let session_id = self
                .resolve_session(&req)
                .await?
                .ok_or(CsrfError::ExpiredSession)?;
            let verification = self.guard.verify(&session_id, Some(&submitted)).await?;
            Ok::<_, CsrfError>((session_id, verification))
        }
        .await;

        match outcome {
            Ok((session_id, verification)) => {
                req.extensions.insert(verification.token().clone());
                req.extensions.insert(SessionId(session_id));
                next(req).await
            }
            Err(e) if e.is_rejection() => {
                warn!(
                    target: "formguard::csrf",
                    "Rejected {} {}: {}",
                    req.method,
                    req.path,
                    e.reason()
                );
                Err(e.into_http_error())
            }
            Err(e) => {
                error!(target: "formguard::csrf", "CSRF check failed for {}: {}", req.path, e);
                Err(e.into_http_error())
            }
        }
    }
}

#[async_trait]
impl<S: SessionStore + 'static> Middleware for CsrfMiddleware<S> {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, HttpError> {
        if self.guard.config().is_excluded(&req.path) {
            debug!(target: "formguard::csrf", "Skipping excluded path {}", req.path);
            return next(req).await;
        }

        if self.needs_protection(&req) {
            self.admit_unsafe(req, next).await
        } else {
            self.admit_safe(req, next).await
        }
    }
}

/// Token placed in the request by [`CsrfMiddleware`].
pub fn request_token(request: &HttpRequest) -> Option<&CsrfToken> {
    request.extensions.get::<CsrfToken>()
}

/// Session placed in the request by [`CsrfMiddleware`].
pub fn request_session(request: &HttpRequest) -> Option<&SessionId> {
    request.extensions.get::<SessionId>()
}
