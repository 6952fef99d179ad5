//! A request-dispatch engine for HTTP application servers.
//!
//! Given a request, the engine decides which handler processes it and runs the cross-cutting
//! processors around that handler. Three chains nest inside each other:
//!
//! - the [`Dispatcher`] runs the application-wide [`Middleware`]s, catches whatever fails and
//!   hands it to a single [`ExceptionHandler`](dispatcher::ExceptionHandler)
//! - the [`Router`] is one of those middlewares; it looks the request up in its route table and
//!   delegates to the next middleware when nothing matches
//! - for a matched route, the [`InterceptorChain`] runs the interceptors scoped to the request
//!   path and finally the route's [`Handler`]
//!
//! Every processor decides on its own whether to continue: returning without calling `proceed`
//! ends the request with whatever it wrote into the [`Response`].
//!
//! Handlers are either closures wrapped by [`handler_fn`] or named actions of a [`Controller`].
//! Controller actions are resolved when the route is registered, together with their tags, so
//! interceptors can inspect the matched handler's metadata without any runtime lookup.
//!
//! ## Example
//!
//! ```
//! use micro_dispatch::router::get;
//! use micro_dispatch::{handler_fn, Dispatcher, Request, Response, Router};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let router = Router::builder()
//!     .route("/hello/{name}", get(handler_fn(|req, resp| Box::pin(async move {
//!         let name = req.path_variable("name").unwrap_or("world").to_string();
//!         resp.text(format!("hello {name}"));
//!         Ok(())
//!     }))))
//!     .build()
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::builder().middleware(router).build().unwrap();
//!
//! let mut req = Request::get("/hello/dispatch");
//! let mut resp = Response::new();
//! dispatcher.dispatch(&mut req, &mut resp).await.unwrap();
//!
//! assert_eq!(resp.body().as_bytes(), Some(&b"hello dispatch"[..]));
//! # }
//! ```

mod body;
mod error;
mod handler;
mod interceptor;
mod loader;
mod middleware;
mod request;
mod response;
mod route;

pub mod config;
pub mod dispatcher;
pub mod metadata;
pub mod path;
pub mod router;
pub mod routes_file;

pub use body::ResponseBody;
pub use dispatcher::Dispatcher;
pub use error::{BoxError, DispatchError, PatternError, ResolveError, RouteError, RouteParseError, RouteParseErrorKind};
pub use handler::{Controller, ControllerAction, FnHandler, Handler, handler_fn};
pub use interceptor::{Interceptor, InterceptorChain, InterceptorEntry, scoped_interceptors};
pub use loader::{ControllerLoader, ControllerRegistry};
pub use metadata::{ControllerType, HandlerMetadata, Tags};
pub use middleware::{Middleware, MiddlewareChain, RequestLogger};
pub use request::{PathVariables, Request};
pub use response::Response;
pub use route::{Route, RouteTable};
pub use router::Router;
