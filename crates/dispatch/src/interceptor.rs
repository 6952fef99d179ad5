//! Route-scoped interceptors wrapping the invocation of the matched handler.
//!
//! Interceptors run after routing, in registration order, around the handler of the matched
//! route. Each one receives the [`InterceptorChain`] as its continuation:
//! - calling [`InterceptorChain::proceed`] runs the next interceptor, or the handler once every
//!   interceptor ran, and returns when that finished
//! - not calling it stops the request right there, the interceptor owns the response
//!
//! Code after `proceed` runs while unwinding, so with interceptors `[a, b]` the order is
//! `a`, `b`, handler, the rest of `b`, the rest of `a`.
//!
//! Every interceptor can read the matched route's [`HandlerMetadata`] from the chain, which
//! makes per-action concerns such as authentication declarative:
//!
//! ```
//! use async_trait::async_trait;
//! use http::StatusCode;
//! use micro_dispatch::{BoxError, Interceptor, InterceptorChain, Request, Response};
//!
//! #[derive(Clone)]
//! struct RequiresAuth;
//!
//! struct AuthInterceptor;
//!
//! #[async_trait]
//! impl Interceptor for AuthInterceptor {
//!     async fn intercept(
//!         &self,
//!         req: &mut Request,
//!         resp: &mut Response,
//!         chain: &mut InterceptorChain<'_>,
//!     ) -> Result<(), BoxError> {
//!         let secured = chain.action_tag::<RequiresAuth>().is_some();
//!         if secured && !req.headers().contains_key(http::header::AUTHORIZATION) {
//!             resp.set_status(StatusCode::UNAUTHORIZED);
//!             return Ok(());
//!         }
//!         Ok(chain.proceed(req, resp).await?)
//!     }
//! }
//! ```
//!
//! ## Thread Safety
//!
//! One interceptor instance serves all requests concurrently, so implementations must not keep
//! per-request state in their fields. The chain itself is created per dispatch and never shared.

use crate::error::{BoxError, DispatchError};
use crate::metadata::HandlerMetadata;
use crate::path::normalize_path;
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        req: &mut Request,
        resp: &mut Response,
        chain: &mut InterceptorChain<'_>,
    ) -> Result<(), BoxError>;
}

/// An interceptor with the request paths it applies to.
#[derive(Clone)]
pub struct InterceptorEntry {
    interceptor: Arc<dyn Interceptor>,
    scope: Vec<String>,
}

impl InterceptorEntry {
    /// An entry applying to every path.
    pub fn new<I: Interceptor + 'static>(interceptor: I) -> Self {
        Self { interceptor: Arc::new(interceptor), scope: Vec::new() }
    }

    /// An entry applying only to the given paths, compared after slash-normalization and,
    /// like route matching, ignoring ASCII case. An empty set of paths applies to every path.
    pub fn scoped<I, P, S>(interceptor: I, paths: P) -> Self
    where
        I: Interceptor + 'static,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scope: Vec<String> = Vec::new();
        for path in paths {
            let path = normalize_path(path.as_ref()).into_owned();
            if !scope.iter().any(|scoped: &String| scoped.eq_ignore_ascii_case(&path)) {
                scope.push(path);
            }
        }
        Self { interceptor: Arc::new(interceptor), scope }
    }

    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Returns true if this entry applies to `path`.
    pub fn applies_to(&self, path: &str) -> bool {
        if self.scope.is_empty() {
            return true;
        }
        let path = normalize_path(path);
        self.scope.iter().any(|scoped| scoped.eq_ignore_ascii_case(&path))
    }
}

impl fmt::Debug for InterceptorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorEntry").field("scope", &self.scope).finish_non_exhaustive()
    }
}

/// Selects, in registration order, the interceptors applying to `path`.
pub fn scoped_interceptors(entries: &[InterceptorEntry], path: &str) -> Vec<Arc<dyn Interceptor>> {
    entries.iter().filter(|entry| entry.applies_to(path)).map(|entry| Arc::clone(&entry.interceptor)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    /// The index of the next interceptor to run, the handler when it equals the length.
    Pending(usize),
    /// An interceptor returned without the handler having run.
    Halted,
    Done,
}

/// The per-dispatch continuation over the scoped interceptors and the route's handler.
pub struct InterceptorChain<'r> {
    route: &'r Route,
    interceptors: Vec<Arc<dyn Interceptor>>,
    state: ChainState,
}

impl<'r> InterceptorChain<'r> {
    pub fn new(route: &'r Route, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { route, interceptors, state: ChainState::Pending(0) }
    }

    /// The matched route.
    pub fn route(&self) -> &'r Route {
        self.route
    }

    /// Metadata of the matched route's handler.
    pub fn metadata(&self) -> &'r HandlerMetadata {
        self.route.metadata()
    }

    /// A tag declared on the handler's controller type.
    pub fn controller_tag<T: Send + Sync + 'static>(&self) -> Option<&'r T> {
        self.metadata().controller_tag::<T>()
    }

    /// A tag declared on the handler's action, or inherited along its override chain.
    pub fn action_tag<T: Send + Sync + 'static>(&self) -> Option<&'r T> {
        self.metadata().action_tag::<T>()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Returns true once the handler was invoked.
    pub fn is_done(&self) -> bool {
        self.state == ChainState::Done
    }

    /// Runs the next interceptor, or the handler when every interceptor already ran.
    ///
    /// Errors from interceptors and from the handler are returned unchanged. Once an interceptor
    /// returned, or the handler was invoked, any further `proceed` from any level of the chain
    /// fails with [`DispatchError::ChainCompleted`].
    pub fn proceed<'a>(
        &'a mut self,
        req: &'a mut Request,
        resp: &'a mut Response,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            match self.state {
                ChainState::Pending(index) if index < self.interceptors.len() => {
                    self.state = ChainState::Pending(index + 1);
                    let interceptor = Arc::clone(&self.interceptors[index]);
                    trace!(index, path = self.route.path(), "invoke interceptor");
                    let result = interceptor.intercept(req, resp, self).await;
                    if self.state != ChainState::Done {
                        self.state = ChainState::Halted;
                    }
                    result.map_err(DispatchError::from)
                }
                ChainState::Pending(_) => {
                    self.state = ChainState::Done;
                    let route = self.route;
                    trace!(method = %route.method(), path = route.path(), "invoke handler");
                    route.handler().invoke(req, resp).await.map_err(DispatchError::from)
                }
                ChainState::Halted | ChainState::Done => Err(DispatchError::ChainCompleted),
            }
        })
    }
}

impl fmt::Debug for InterceptorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("route", self.route)
            .field("interceptors", &self.interceptors.len())
            .field("state", &self.state)
            .finish()
    }
}
