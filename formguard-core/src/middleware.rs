// Middleware system for request/response processing

use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use formguard_log::{debug, trace};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// Type alias for the next handler in the middleware chain
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture + Send>;

/// Type alias for handler functions
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxFuture + Send + Sync>;

/// Wrap an async function as a [`HandlerFn`].
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest| -> BoxFuture { Box::pin(f(req)) })
}

/// Middleware trait for processing requests before they reach the handler.
///
/// Returning `Err` without calling `next` stops the chain: neither later
/// middleware nor the handler runs.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Middleware chain executor
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the end of the chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        let mut mws = (*self.middlewares).clone();
        mws.push(Arc::new(middleware));
        self.middlewares = Arc::new(mws);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the middleware chain with a handler
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            "Executing middleware chain ({} middleware) for {} {}",
            self.middlewares.len(),
            req.method,
            req.path
        );
        self.execute_from(0, req, handler).await
    }

    /// Like [`apply`](Self::apply) but renders errors into responses.
    pub async fn respond(&self, req: HttpRequest, handler: HandlerFn) -> HttpResponse {
        match self.apply(req, handler).await {
            Ok(response) => response,
            Err(error) => HttpResponse::from_error(&error),
        }
    }

    fn execute_from(&self, index: usize, req: HttpRequest, handler: HandlerFn) -> BoxFuture {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            return handler(req);
        }

        let middleware = self.middlewares[index].clone();
        let chain = self.clone();
        trace!("Executing middleware {}", index);
        Box::pin(async move {
            middleware
                .handle(
                    req,
                    Box::new(move |req| chain.execute_from(index + 1, req, handler)),
                )
                .await
        })
    }
}
