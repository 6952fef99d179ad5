//! The router: a [`Middleware`] dispatching matched requests to route handlers.
//!
//! For every request the router normalizes the path and looks it up in its [`RouteTable`]. A
//! request without a route is handed to the rest of the middleware chain untouched. A matched
//! request gets its path variables bound, a default `200 OK` status, and runs through the
//! interceptors scoped to its path before the handler is invoked.
//!
//! ```
//! use micro_dispatch::handler_fn;
//! use micro_dispatch::router::{get, post, Router};
//!
//! let router = Router::builder()
//!     .route("/", get(handler_fn(|_req, resp| Box::pin(async move {
//!         resp.text("index");
//!         Ok(())
//!     }))))
//!     .route("/users/{id}", post(handler_fn(|req, resp| Box::pin(async move {
//!         let id = req.path_variable("id").unwrap_or_default().to_string();
//!         resp.text(format!("updated {id}"));
//!         Ok(())
//!     }))))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(router.routes().len(), 2);
//! ```

use crate::error::{BoxError, RouteError};
use crate::handler::{Controller, Handler};
use crate::interceptor::{InterceptorChain, InterceptorEntry, scoped_interceptors};
use crate::metadata::HandlerMetadata;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::path::normalize_path;
use crate::request::Request;
use crate::response::Response;
use crate::route::{Route, RouteTable};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Routes requests to handlers through path-scoped interceptors.
pub struct Router {
    routes: RouteTable,
    interceptors: ArcSwap<Vec<InterceptorEntry>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// A router with no routes and no interceptors.
    pub fn new() -> Self {
        Self::from_table(RouteTable::new())
    }

    pub fn from_table(routes: RouteTable) -> Self {
        Self { routes, interceptors: ArcSwap::from_pointee(Vec::new()) }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Appends a route, visible to every request dispatched afterwards.
    pub fn add_route(&self, route: Route) {
        self.routes.add(route);
    }

    /// Swaps in a complete new set of routes, keeping the interceptors.
    pub fn replace_routes(&self, routes: impl IntoIterator<Item = Route>) {
        self.routes.replace(routes);
    }

    /// Appends an interceptor after every registered one.
    pub fn add_interceptor(&self, entry: InterceptorEntry) {
        self.interceptors.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(entry.clone());
            next
        });
    }

    /// The registered interceptors as of now.
    pub fn interceptors(&self) -> Arc<Vec<InterceptorEntry>> {
        self.interceptors.load_full()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("interceptors", &self.interceptors.load().len())
            .finish()
    }
}

#[async_trait]
impl Middleware for Router {
    async fn handle(
        &self,
        req: &mut Request,
        resp: &mut Response,
        next: &mut MiddlewareChain<'_>,
    ) -> Result<(), BoxError> {
        let path = normalize_path(req.path()).into_owned();

        let Some(route) = self.routes.find(req.method().as_str(), &path) else {
            debug!(method = %req.method(), path = %path, "no route matched, delegating");
            return Ok(next.proceed(req, resp).await?);
        };

        debug!(
            method = %req.method(),
            path = %path,
            route = route.path(),
            target = ?route.metadata().target(),
            "route matched"
        );
        if let Some(variables) = route.path_variables(&path) {
            req.set_path_variables(variables);
        }
        resp.set_status(StatusCode::OK);

        let interceptors = scoped_interceptors(&self.interceptors.load(), &path);
        let mut chain = InterceptorChain::new(&route, interceptors);
        Ok(chain.proceed(req, resp).await?)
    }
}

/// A handler bound to an http method, waiting for its path.
pub struct MethodHandler {
    method: Method,
    handler: Arc<dyn Handler>,
    metadata: HandlerMetadata,
}

impl MethodHandler {
    pub fn new<H: Handler + 'static>(method: Method, handler: H) -> Self {
        Self { method, handler: Arc::new(handler), metadata: HandlerMetadata::empty() }
    }

    /// Attaches metadata for interceptors to inspect.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HandlerMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandler").field("method", &self.method).finish_non_exhaustive()
    }
}

macro_rules! method_handler {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Routes `", stringify!($method), "` requests to `handler`.")]
        pub fn $name<H: Handler + 'static>(handler: H) -> MethodHandler {
            MethodHandler::new(Method::$method, handler)
        }
    };
}

method_handler!(get, GET);
method_handler!(post, POST);
method_handler!(put, PUT);
method_handler!(delete, DELETE);
method_handler!(options, OPTIONS);
method_handler!(head, HEAD);
method_handler!(patch, PATCH);

enum PendingRoute {
    Handler { path: String, item: MethodHandler },
    Action { method: Method, path: String, controller: Arc<dyn Controller>, action: String },
    Ready(Route),
}

impl PendingRoute {
    fn build(self) -> Result<Route, RouteError> {
        match self {
            PendingRoute::Handler { path, item } => {
                Ok(Route::from_arc(item.method, &path, item.handler)?.with_metadata(item.metadata))
            }
            PendingRoute::Action { method, path, controller, action } => {
                Route::bind(method, &path, controller, &action)
            }
            PendingRoute::Ready(route) => Ok(route),
        }
    }
}

/// Collects routes and interceptors; nothing is compiled or resolved until [`build`](Self::build).
pub struct RouterBuilder {
    routes: Vec<PendingRoute>,
    interceptors: Vec<InterceptorEntry>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: Vec::new(), interceptors: Vec::new() }
    }

    #[must_use]
    pub fn route(mut self, path: impl Into<String>, item: MethodHandler) -> Self {
        self.routes.push(PendingRoute::Handler { path: path.into(), item });
        self
    }

    /// Routes `method` and `path` to a named action of `controller`.
    #[must_use]
    pub fn action(
        mut self,
        method: Method,
        path: impl Into<String>,
        controller: Arc<dyn Controller>,
        action: impl Into<String>,
    ) -> Self {
        self.routes.push(PendingRoute::Action { method, path: path.into(), controller, action: action.into() });
        self
    }

    /// Appends already built routes, such as the ones loaded from route definitions.
    #[must_use]
    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes.into_iter().map(PendingRoute::Ready));
        self
    }

    #[must_use]
    pub fn interceptor(mut self, entry: InterceptorEntry) -> Self {
        self.interceptors.push(entry);
        self
    }

    /// Compiles every path and binds every action in declaration order, failing on the first
    /// route that cannot be registered.
    pub fn build(self) -> Result<Router, RouteError> {
        let routes = self.routes.into_iter().map(PendingRoute::build).collect::<Result<Vec<_>, _>>()?;
        debug!(routes = routes.len(), interceptors = self.interceptors.len(), "router built");
        Ok(Router { routes: RouteTable::from_routes(routes), interceptors: ArcSwap::from_pointee(self.interceptors) })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("routes", &self.routes.len())
            .field("interceptors", &self.interceptors)
            .finish()
    }
}
