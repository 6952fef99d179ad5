//! Application-wide middlewares and the chain that runs them.
//!
//! A [`Middleware`] sees every request before routing. It may write the response itself and
//! return, or delegate to the rest of the pipeline through [`MiddlewareChain::proceed`]. When the
//! pipeline is exhausted without any middleware producing a result, `proceed` fails with
//! [`DispatchError::NotFound`], which travels back out to the dispatcher's exception handler.
//!
//! The [`Router`](crate::Router) is itself a middleware: it handles the requests it has a route
//! for and delegates the rest.

use crate::error::{BoxError, DispatchError};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace};

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        req: &mut Request,
        resp: &mut Response,
        next: &mut MiddlewareChain<'_>,
    ) -> Result<(), BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    Pending(usize),
    /// A middleware returned without exhausting the chain; holds the next index.
    Halted(usize),
    Done,
}

/// The per-dispatch continuation over the registered middlewares.
pub struct MiddlewareChain<'m> {
    middlewares: &'m [Arc<dyn Middleware>],
    state: ChainState,
}

impl<'m> MiddlewareChain<'m> {
    pub fn new(middlewares: &'m [Arc<dyn Middleware>]) -> Self {
        Self { middlewares, state: ChainState::Pending(0) }
    }

    /// Number of middlewares not yet invoked.
    pub fn remaining(&self) -> usize {
        match self.state {
            ChainState::Pending(index) | ChainState::Halted(index) => self.middlewares.len().saturating_sub(index),
            ChainState::Done => 0,
        }
    }

    /// Invokes the next middleware with this chain as its continuation.
    ///
    /// With no middleware left this fails with [`DispatchError::NotFound`]. Once the chain was
    /// exhausted, or any middleware returned, a further call from any level fails with
    /// [`DispatchError::ChainCompleted`].
    pub fn proceed<'a>(
        &'a mut self,
        req: &'a mut Request,
        resp: &'a mut Response,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            match self.state {
                ChainState::Pending(index) if index < self.middlewares.len() => {
                    self.state = ChainState::Pending(index + 1);
                    let middlewares = self.middlewares;
                    trace!(index, "invoke middleware");
                    let result = middlewares[index].handle(req, resp, self).await;
                    if let ChainState::Pending(next) = self.state {
                        self.state = ChainState::Halted(next);
                    }
                    result.map_err(DispatchError::from)
                }
                ChainState::Pending(_) => {
                    self.state = ChainState::Done;
                    Err(DispatchError::not_found(req.method().clone(), req.path()))
                }
                ChainState::Halted(_) | ChainState::Done => Err(DispatchError::ChainCompleted),
            }
        })
    }
}

impl fmt::Debug for MiddlewareChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("middlewares", &self.middlewares.len())
            .field("state", &self.state)
            .finish()
    }
}

/// Middleware that logs every request with its final status and elapsed time.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(
        &self,
        req: &mut Request,
        resp: &mut Response,
        next: &mut MiddlewareChain<'_>,
    ) -> Result<(), BoxError> {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_string();

        let result = next.proceed(req, resp).await;

        let elapsed = start.elapsed();
        match &result {
            Ok(()) => {
                let status = resp.status().map(|status| status.as_u16());
                info!(%method, %path, ?status, ?elapsed, "request handled");
            }
            Err(e) => info!(%method, %path, ?elapsed, cause = %e, "request failed"),
        }

        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use std::sync::Mutex;

    struct Tracing {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Tracing {
        async fn handle(
            &self,
            req: &mut Request,
            resp: &mut Response,
            next: &mut MiddlewareChain<'_>,
        ) -> Result<(), BoxError> {
            self.log.lock().unwrap().push(format!("{} in", self.name));
            let result = next.proceed(req, resp).await;
            self.log.lock().unwrap().push(format!("{} out", self.name));
            Ok(result?)
        }
    }

    struct Respond;

    #[async_trait]
    impl Middleware for Respond {
        async fn handle(
            &self,
            _req: &mut Request,
            resp: &mut Response,
            _next: &mut MiddlewareChain<'_>,
        ) -> Result<(), BoxError> {
            resp.set_status(StatusCode::ACCEPTED);
            Ok(())
        }
    }

    struct Retry;

    #[async_trait]
    impl Middleware for Retry {
        async fn handle(
            &self,
            req: &mut Request,
            resp: &mut Response,
            next: &mut MiddlewareChain<'_>,
        ) -> Result<(), BoxError> {
            next.proceed(req, resp).await?;
            Ok(next.proceed(req, resp).await?)
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_not_found() {
        let middlewares: Vec<Arc<dyn Middleware>> = vec![];
        let mut chain = MiddlewareChain::new(&middlewares);

        let mut req = Request::with_method(Method::POST, "/nothing");
        let mut resp = Response::new();
        let error = chain.proceed(&mut req, &mut resp).await.unwrap_err();

        match error {
            DispatchError::NotFound { method, path } => {
                assert_eq!(method, Method::POST);
                assert_eq!(path, "/nothing");
            }
            other => panic!("unexpected error: {other}"),
        }

        let again = chain.proceed(&mut req, &mut resp).await.unwrap_err();
        assert!(matches!(again, DispatchError::ChainCompleted));
    }

    #[tokio::test]
    async fn test_exhausted_chain_unwinds_with_not_found() {
        let log = Arc::new(Mutex::new(vec![]));
        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Tracing { name: "a", log: Arc::clone(&log) }),
            Arc::new(Tracing { name: "b", log: Arc::clone(&log) }),
        ];
        let mut chain = MiddlewareChain::new(&middlewares);

        let mut req = Request::get("/");
        let mut resp = Response::new();
        let error = chain.proceed(&mut req, &mut resp).await.unwrap_err();

        assert!(error.is_not_found());
        assert_eq!(*log.lock().unwrap(), ["a in", "b in", "b out", "a out"]);
        assert_eq!(resp.status(), None);
    }

    #[tokio::test]
    async fn test_middleware_short_circuits() {
        let log = Arc::new(Mutex::new(vec![]));
        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(RequestLogger),
            Arc::new(Respond),
            Arc::new(Tracing { name: "never", log: Arc::clone(&log) }),
        ];
        let mut chain = MiddlewareChain::new(&middlewares);

        let mut req = Request::get("/");
        let mut resp = Response::new();
        chain.proceed(&mut req, &mut resp).await.unwrap();

        assert_eq!(resp.status(), Some(StatusCode::ACCEPTED));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(chain.remaining(), 1);
    }

    #[tokio::test]
    async fn test_proceed_after_inner_short_circuit_fails() {
        let log = Arc::new(Mutex::new(vec![]));
        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Retry),
            Arc::new(Respond),
            Arc::new(Tracing { name: "never", log: Arc::clone(&log) }),
        ];
        let mut chain = MiddlewareChain::new(&middlewares);

        let mut req = Request::get("/");
        let mut resp = Response::new();
        let error = chain.proceed(&mut req, &mut resp).await.unwrap_err();

        assert!(matches!(error, DispatchError::ChainCompleted));
        assert_eq!(resp.status(), Some(StatusCode::ACCEPTED));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(chain.remaining(), 1);
    }
}
