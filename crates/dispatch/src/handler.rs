//! Handlers: the operations that finally produce a response for a matched route.
//!
//! Two kinds of handlers exist:
//! - any type implementing [`Handler`], including closures wrapped by [`handler_fn`]
//! - a [`ControllerAction`]: a named action of a [`Controller`], resolved against the
//!   controller's [`ControllerType`] when the route is registered

use crate::error::{BoxError, ResolveError};
use crate::metadata::{ControllerType, HandlerMetadata};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Handles a request by writing into the response.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn invoke(&self, req: &mut Request, resp: &mut Response) -> Result<(), BoxError>;
}

/// A closure holder which represents a [`Handler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps a closure returning a boxed future into a [`Handler`].
///
/// ```
/// use micro_dispatch::handler_fn;
///
/// let hello = handler_fn(|_req, resp| {
///     Box::pin(async move {
///         resp.text("hello world");
///         Ok(())
///     })
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync,
{
    async fn invoke(&self, req: &mut Request, resp: &mut Response) -> Result<(), BoxError> {
        (self.f)(req, resp).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// A controller instance exposing named actions.
///
/// The actions a controller can serve are the ones its [`ControllerType`] declares or
/// inherits; `invoke` is only called with such names.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    fn controller_type(&self) -> &ControllerType;

    async fn invoke(&self, action: &str, req: &mut Request, resp: &mut Response) -> Result<(), BoxError>;
}

/// A controller bound to one of its actions.
#[derive(Clone)]
pub struct ControllerAction {
    controller: Arc<dyn Controller>,
    action: String,
    metadata: HandlerMetadata,
}

impl ControllerAction {
    /// Resolves `action` on the controller and its metadata, failing when neither the
    /// controller's type nor any ancestor declares it.
    pub fn bind(controller: Arc<dyn Controller>, action: impl Into<String>) -> Result<Self, ResolveError> {
        let action = action.into();
        let metadata = HandlerMetadata::introspect(controller.controller_type(), &action)?;
        Ok(Self { controller, action, metadata })
    }

    pub fn controller(&self) -> &dyn Controller {
        self.controller.as_ref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn metadata(&self) -> &HandlerMetadata {
        &self.metadata
    }
}

#[async_trait]
impl Handler for ControllerAction {
    async fn invoke(&self, req: &mut Request, resp: &mut Response) -> Result<(), BoxError> {
        self.controller.invoke(&self.action, req, resp).await
    }
}

impl fmt::Debug for ControllerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerAction")
            .field("controller", &self.controller.controller_type().name())
            .field("action", &self.action)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Tags;
    use http::StatusCode;

    #[derive(Debug, Clone, PartialEq)]
    struct Secured;

    struct UserController {
        controller_type: Arc<ControllerType>,
    }

    impl UserController {
        fn new() -> Self {
            let base = ControllerType::builder("BaseController")
                .tagged_action("remove", Tags::new().with(Secured))
                .build();
            let controller_type = ControllerType::builder("UserController").extends(base).action("show").build();
            Self { controller_type }
        }
    }

    #[async_trait]
    impl Controller for UserController {
        fn controller_type(&self) -> &ControllerType {
            &self.controller_type
        }

        async fn invoke(&self, action: &str, _req: &mut Request, resp: &mut Response) -> Result<(), BoxError> {
            match action {
                "show" => resp.text("user"),
                "remove" => resp.set_status(StatusCode::NO_CONTENT),
                other => return Err(ResolveError::unknown_action("UserController", other).into()),
            }
            Ok(())
        }
    }

    fn assert_is_handler<T: Handler>(_handler: &T) {
        // no op
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = handler_fn(|req, resp| {
            Box::pin(async move {
                resp.text(req.path().to_string());
                Ok(())
            })
        });
        assert_is_handler(&handler);

        let mut req = Request::get("/hello");
        let mut resp = Response::new();
        handler.invoke(&mut req, &mut resp).await.unwrap();
        assert_eq!(resp.body().as_bytes(), Some(&b"/hello"[..]));
    }

    #[tokio::test]
    async fn test_bind_and_invoke_action() {
        let action = ControllerAction::bind(Arc::new(UserController::new()), "show").unwrap();
        assert_is_handler(&action);
        assert_eq!(action.metadata().target(), Some("UserController#show"));

        let mut req = Request::get("/users/1");
        let mut resp = Response::new();
        action.invoke(&mut req, &mut resp).await.unwrap();
        assert_eq!(resp.body().as_bytes(), Some(&b"user"[..]));
    }

    #[test]
    fn test_bind_inherited_action_keeps_metadata() {
        let action = ControllerAction::bind(Arc::new(UserController::new()), "remove").unwrap();
        assert_eq!(action.metadata().action_tag::<Secured>(), Some(&Secured));
    }

    #[test]
    fn test_bind_unknown_action_fails() {
        let error = ControllerAction::bind(Arc::new(UserController::new()), "destroy").unwrap_err();
        assert_eq!(error, ResolveError::unknown_action("UserController", "destroy"));
    }
}
