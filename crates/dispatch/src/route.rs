//! Routes and the route table.
//!
//! A [`Route`] pairs an http method and a compiled [`PathPattern`] with a handler and the
//! handler's metadata. The [`RouteTable`] keeps routes in declaration order and returns the
//! first one matching a request, so a later route with the same method and pattern is shadowed.
//!
//! ## Thread Safety
//!
//! The table is a copy-on-write snapshot behind an [`ArcSwap`]: every mutation publishes a new,
//! fully built list, and every lookup iterates exactly one snapshot. A lookup running during
//! `add` or `replace` sees either the old or the new list, never a partial one.

use crate::error::{PatternError, RouteError};
use crate::handler::{Controller, ControllerAction, Handler};
use crate::loader::ControllerLoader;
use crate::metadata::HandlerMetadata;
use crate::path::PathPattern;
use crate::request::PathVariables;
use crate::routes_file::{self, RouteDefinition};
use arc_swap::ArcSwap;
use http::Method;
use std::fmt;
use std::sync::Arc;

/// An immutable route: method, path pattern, handler and handler metadata.
pub struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
    metadata: HandlerMetadata,
}

impl Route {
    pub fn new<H: Handler + 'static>(method: Method, path: &str, handler: H) -> Result<Self, PatternError> {
        Self::from_arc(method, path, Arc::new(handler))
    }

    pub fn from_arc(method: Method, path: &str, handler: Arc<dyn Handler>) -> Result<Self, PatternError> {
        let pattern = PathPattern::compile(path)?;
        Ok(Self { method, pattern, handler, metadata: HandlerMetadata::empty() })
    }

    /// Binds `action` of `controller` to `method` and `path`.
    ///
    /// The action and its metadata are resolved here, an unknown action fails the registration.
    pub fn bind(method: Method, path: &str, controller: Arc<dyn Controller>, action: &str) -> Result<Self, RouteError> {
        let pattern = PathPattern::compile(path)?;
        let action = ControllerAction::bind(controller, action)?;
        let metadata = action.metadata().clone();
        Ok(Self { method, pattern, handler: Arc::new(action), metadata })
    }

    /// Replaces the metadata, for handlers that are not controller actions.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HandlerMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path as declared.
    pub fn path(&self) -> &str {
        self.pattern.pattern()
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    pub fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }

    /// Returns true if the method matches ignoring ASCII case and the whole path matches.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.method.as_str().eq_ignore_ascii_case(method) && self.pattern.matches(path)
    }

    /// Binds this route's variables against a concrete request path.
    pub fn path_variables(&self, path: &str) -> Option<PathVariables> {
        self.pattern.match_path(path)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path())
            .field("target", &self.metadata.target())
            .finish_non_exhaustive()
    }
}

/// Ordered, concurrently readable collection of routes.
pub struct RouteTable {
    routes: ArcSwap<Vec<Arc<Route>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self { routes: ArcSwap::from_pointee(Vec::new()) }
    }

    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Self {
        let routes = routes.into_iter().map(Arc::new).collect::<Vec<_>>();
        Self { routes: ArcSwap::from_pointee(routes) }
    }

    /// Builds a table from parsed route definitions, resolving every controller and action.
    pub fn load(definitions: &[RouteDefinition], loader: &dyn ControllerLoader) -> Result<Self, RouteError> {
        routes_file::load(definitions, loader).map(Self::from_routes)
    }

    /// Appends a route after every existing one.
    pub fn add(&self, route: Route) {
        let route = Arc::new(route);
        self.routes.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&route));
            next
        });
    }

    /// Keeps only the routes for which `f` returns true, preserving their order.
    pub fn retain<F: Fn(&Route) -> bool>(&self, f: F) {
        self.routes.rcu(|current| current.iter().filter(|route| f(route)).cloned().collect::<Vec<_>>());
    }

    /// Swaps in a complete new set of routes.
    pub fn replace(&self, routes: impl IntoIterator<Item = Route>) {
        let routes = routes.into_iter().map(Arc::new).collect::<Vec<_>>();
        self.routes.store(Arc::new(routes));
    }

    /// Returns the first route, in declaration order, whose method and pattern match.
    pub fn find(&self, method: &str, path: &str) -> Option<Arc<Route>> {
        self.routes.load().iter().find(|route| route.matches(method, path)).cloned()
    }

    /// The routes as of now.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Route>>> {
        self.routes.load_full()
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.load().iter()).finish()
    }
}
