//! The outer dispatch boundary.
//!
//! A [`Dispatcher`] runs every request through the application's middlewares. It is the single
//! place where a failed dispatch is caught: the [`DispatchError`], including the not-found
//! condition of an exhausted middleware chain, is handed once to the configured
//! [`ExceptionHandler`]. Without an exception handler the error is returned to the caller, which
//! is usually the transport.
//!
//! In development mode the middlewares come from a [`MiddlewareFactory`] called on every request,
//! so a factory that rebuilds its router picks up changed routes without a restart.

use crate::body::ResponseBody;
use crate::config::DispatcherConfig;
use crate::error::{BoxError, DispatchError};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Turns a failed dispatch into a response.
#[async_trait]
pub trait ExceptionHandler: Send + Sync {
    async fn handle(&self, error: DispatchError, req: &mut Request, resp: &mut Response) -> Result<(), BoxError>;
}

/// Declares the application's middlewares.
pub trait MiddlewareFactory: Send + Sync {
    fn create(&self) -> Result<Vec<Arc<dyn Middleware>>, BoxError>;
}

impl<F> MiddlewareFactory for F
where
    F: Fn() -> Result<Vec<Arc<dyn Middleware>>, BoxError> + Send + Sync,
{
    fn create(&self) -> Result<Vec<Arc<dyn Middleware>>, BoxError> {
        (self)()
    }
}

type Middlewares = Arc<[Arc<dyn Middleware>]>;

enum MiddlewareSource {
    Fixed(Middlewares),
    Reloading { fixed: Middlewares, factory: Arc<dyn MiddlewareFactory> },
}

pub struct Dispatcher {
    config: DispatcherConfig,
    middlewares: MiddlewareSource,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatches one request, writing the outcome into `resp`.
    ///
    /// A failure is passed to the exception handler exactly once; its own failure, or the
    /// original one when no handler is configured, is returned.
    pub async fn dispatch(&self, req: &mut Request, resp: &mut Response) -> Result<(), DispatchError> {
        let error = match self.run(req, resp).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if error.is_not_found() {
            warn!(method = %req.method(), path = req.path(), "no middleware handled the request");
        }

        let Some(exception_handler) = &self.exception_handler else {
            return Err(error);
        };

        exception_handler.handle(error, req, resp).await.map_err(|e| {
            error!(method = %req.method(), path = req.path(), cause = %e, "exception handler failed");
            DispatchError::from(e)
        })
    }

    /// Dispatches an `http` request and converts the outcome into an `http` response.
    pub async fn call(&self, req: http::Request<Bytes>) -> Result<http::Response<ResponseBody>, DispatchError> {
        let mut req = Request::from(req);
        let mut resp = Response::new();
        self.dispatch(&mut req, &mut resp).await?;
        Ok(resp.into_http())
    }

    async fn run(&self, req: &mut Request, resp: &mut Response) -> Result<(), DispatchError> {
        let middlewares = self.middlewares()?;
        let mut chain = MiddlewareChain::new(&middlewares);
        chain.proceed(req, resp).await
    }

    fn middlewares(&self) -> Result<Middlewares, DispatchError> {
        match &self.middlewares {
            MiddlewareSource::Fixed(middlewares) => Ok(Arc::clone(middlewares)),
            MiddlewareSource::Reloading { fixed, factory } => {
                let created = factory.create().map_err(DispatchError::build)?;
                Ok(fixed.iter().cloned().chain(created).collect())
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let middlewares = match &self.middlewares {
            MiddlewareSource::Fixed(middlewares) => format!("fixed({})", middlewares.len()),
            MiddlewareSource::Reloading { fixed, .. } => format!("reloading({} + factory)", fixed.len()),
        };
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("middlewares", &middlewares)
            .field("exception_handler", &self.exception_handler.is_some())
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to create middlewares: {source}")]
    Middleware { source: BoxError },
}

pub struct DispatcherBuilder {
    config: DispatcherConfig,
    middlewares: Vec<Arc<dyn Middleware>>,
    factory: Option<Arc<dyn MiddlewareFactory>>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self { config: DispatcherConfig::default(), middlewares: Vec::new(), factory: None, exception_handler: None }
    }

    #[must_use]
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.dev_mode = dev_mode;
        self
    }

    /// Appends a middleware; explicit middlewares run before the factory's.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    #[must_use]
    pub fn shared_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    #[must_use]
    pub fn middleware_factory(mut self, factory: impl MiddlewareFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    #[must_use]
    pub fn exception_handler(mut self, exception_handler: impl ExceptionHandler + 'static) -> Self {
        self.exception_handler = Some(Arc::new(exception_handler));
        self
    }

    /// Builds the dispatcher. Outside development mode the factory is called here, once.
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let fixed: Middlewares = self.middlewares.into();

        let middlewares = match self.factory {
            Some(factory) if self.config.dev_mode => MiddlewareSource::Reloading { fixed, factory },
            Some(factory) => {
                let created = factory.create().map_err(|source| BuildError::Middleware { source })?;
                MiddlewareSource::Fixed(fixed.iter().cloned().chain(created).collect())
            }
            None => MiddlewareSource::Fixed(fixed),
        };

        let dispatcher = Dispatcher { config: self.config, middlewares, exception_handler: self.exception_handler };
        info!(
            dev_mode = dispatcher.config.dev_mode,
            exception_handler = dispatcher.exception_handler.is_some(),
            "dispatcher built"
        );
        Ok(dispatcher)
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("middlewares", &self.middlewares.len())
            .field("factory", &self.factory.is_some())
            .field("exception_handler", &self.exception_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::router::{Router, get};
    use http::{Method, StatusCode};
    use mockall::mock;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        ErrorPage {}

        #[async_trait]
        impl ExceptionHandler for ErrorPage {
            async fn handle(
                &self,
                error: DispatchError,
                req: &mut Request,
                resp: &mut Response,
            ) -> Result<(), BoxError>;
        }
    }

    fn hello_router() -> Router {
        Router::builder()
            .route(
                "/hello",
                get(handler_fn(|_req, resp| {
                    Box::pin(async move {
                        resp.text("hello");
                        Ok(())
                    })
                })),
            )
            .route("/fail", get(handler_fn(|_req, _resp| Box::pin(async { Err(io::Error::other("broken").into()) }))))
            .build()
            .unwrap()
    }

    fn hello_middlewares() -> Vec<Arc<dyn Middleware>> {
        vec![Arc::new(hello_router())]
    }

    struct Teapot;

    #[async_trait]
    impl Middleware for Teapot {
        async fn handle(
            &self,
            _req: &mut Request,
            resp: &mut Response,
            _next: &mut MiddlewareChain<'_>,
        ) -> Result<(), BoxError> {
            resp.set_status(StatusCode::IM_A_TEAPOT);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_not_found_reaches_exception_handler_once() {
        let mut error_page = MockErrorPage::new();
        error_page.expect_handle().withf(|error, _, _| error.is_not_found()).times(1).returning(|_, _, resp| {
            resp.set_status(StatusCode::NOT_FOUND);
            Ok(())
        });

        let dispatcher = Dispatcher::builder().exception_handler(error_page).build().unwrap();

        let mut req = Request::get("/anything");
        let mut resp = Response::new();
        dispatcher.dispatch(&mut req, &mut resp).await.unwrap();

        assert_eq!(resp.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_application_error_reaches_exception_handler() {
        let mut error_page = MockErrorPage::new();
        error_page
            .expect_handle()
            .withf(|error, _, _| error.application().is_some_and(|e| e.to_string() == "broken"))
            .times(1)
            .returning(|_, _, resp| {
                resp.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                Ok(())
            });

        let dispatcher =
            Dispatcher::builder().middleware(hello_router()).exception_handler(error_page).build().unwrap();

        let mut req = Request::get("/fail");
        let mut resp = Response::new();
        dispatcher.dispatch(&mut req, &mut resp).await.unwrap();

        assert_eq!(resp.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_error_without_exception_handler_is_returned() {
        let dispatcher = Dispatcher::builder().build().unwrap();

        let mut req = Request::with_method(Method::DELETE, "/x");
        let mut resp = Response::new();
        let error = dispatcher.dispatch(&mut req, &mut resp).await.unwrap_err();

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_failing_exception_handler() {
        let mut error_page = MockErrorPage::new();
        error_page.expect_handle().times(1).returning(|_, _, _| Err(io::Error::other("template missing").into()));

        let dispatcher = Dispatcher::builder().exception_handler(error_page).build().unwrap();

        let mut req = Request::get("/");
        let mut resp = Response::new();
        let error = dispatcher.dispatch(&mut req, &mut resp).await.unwrap_err();

        assert_eq!(error.application().unwrap().to_string(), "template missing");
    }

    #[tokio::test]
    async fn test_call_converts_response() {
        let dispatcher = Dispatcher::builder().middleware(hello_router()).build().unwrap();

        let req = http::Request::get("/hello").body(Bytes::new()).unwrap();
        let resp = dispatcher.call(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().as_bytes(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_factory_called_once_outside_dev_mode() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory = move || -> Result<Vec<Arc<dyn Middleware>>, BoxError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(hello_middlewares())
        };

        let dispatcher = Dispatcher::builder().middleware_factory(factory).build().unwrap();
        for _ in 0..3 {
            let mut resp = Response::new();
            dispatcher.dispatch(&mut Request::get("/hello"), &mut resp).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dev_mode_rebuilds_per_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory = move || -> Result<Vec<Arc<dyn Middleware>>, BoxError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(hello_middlewares())
        };

        let dispatcher = Dispatcher::builder().dev_mode(true).middleware_factory(factory).build().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            let mut resp = Response::new();
            dispatcher.dispatch(&mut Request::get("/hello"), &mut resp).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_explicit_middlewares_run_before_factory() {
        let factory = || -> Result<Vec<Arc<dyn Middleware>>, BoxError> { Ok(hello_middlewares()) };
        let dispatcher = Dispatcher::builder().middleware(Teapot).middleware_factory(factory).build().unwrap();

        let mut resp = Response::new();
        dispatcher.dispatch(&mut Request::get("/hello"), &mut resp).await.unwrap();

        assert_eq!(resp.status(), Some(StatusCode::IM_A_TEAPOT));
    }

    #[tokio::test]
    async fn test_factory_failure() {
        let factory = || -> Result<Vec<Arc<dyn Middleware>>, BoxError> { Err(io::Error::other("bad routes").into()) };

        let error = Dispatcher::builder().middleware_factory(factory).build().unwrap_err();
        assert_eq!(error.to_string(), "failed to create middlewares: bad routes");

        let dispatcher = Dispatcher::builder().dev_mode(true).middleware_factory(factory).build().unwrap();
        let mut resp = Response::new();
        let error = dispatcher.dispatch(&mut Request::get("/"), &mut resp).await.unwrap_err();
        assert!(matches!(error, DispatchError::Build { .. }));
    }
}
