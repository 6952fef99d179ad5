use async_trait::async_trait;
use http::{StatusCode, header};
use micro_dispatch::config::{DispatcherConfig, init_tracing};
use micro_dispatch::dispatcher::ExceptionHandler;
use micro_dispatch::metadata::Tags;
use micro_dispatch::router::get;
use micro_dispatch::{
    BoxError, Controller, ControllerRegistry, ControllerType, DispatchError, Dispatcher, Interceptor, InterceptorChain,
    InterceptorEntry, Request, RequestLogger, Response, Router, handler_fn, routes_file,
};
use serde::Serialize;
use std::sync::Arc;

const ROUTES: &str = "
# method  path             target
GET       /users/{id}      UserController#show
DELETE    /users/{id}      UserController#remove
";

#[derive(Clone)]
struct RequiresAuth;

#[derive(Serialize)]
struct User<'a> {
    id: &'a str,
    name: String,
}

struct UserController {
    controller_type: Arc<ControllerType>,
}

impl UserController {
    fn new() -> Self {
        let controller_type = ControllerType::builder("UserController")
            .action("show")
            .tagged_action("remove", Tags::new().with(RequiresAuth))
            .build();
        Self { controller_type }
    }
}

#[async_trait]
impl Controller for UserController {
    fn controller_type(&self) -> &ControllerType {
        &self.controller_type
    }

    async fn invoke(&self, action: &str, req: &mut Request, resp: &mut Response) -> Result<(), BoxError> {
        let id = req.path_variable("id").unwrap_or_default();
        match action {
            "show" => resp.json(&User { id, name: format!("user-{id}") })?,
            "remove" => resp.set_status(StatusCode::NO_CONTENT),
            _ => resp.set_status(StatusCode::METHOD_NOT_ALLOWED),
        }
        Ok(())
    }
}

struct AuthInterceptor;

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn intercept(
        &self,
        req: &mut Request,
        resp: &mut Response,
        chain: &mut InterceptorChain<'_>,
    ) -> Result<(), BoxError> {
        if chain.action_tag::<RequiresAuth>().is_some() && !req.headers().contains_key(header::AUTHORIZATION) {
            resp.set_status(StatusCode::UNAUTHORIZED);
            return Ok(());
        }
        Ok(chain.proceed(req, resp).await?)
    }
}

struct ErrorPage;

#[async_trait]
impl ExceptionHandler for ErrorPage {
    async fn handle(&self, error: DispatchError, _req: &mut Request, resp: &mut Response) -> Result<(), BoxError> {
        if error.is_not_found() {
            resp.set_status(StatusCode::NOT_FOUND);
            resp.text("404 not found");
        } else {
            resp.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            resp.text(error.to_string());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing(&DispatcherConfig::default())?;

    let registry = ControllerRegistry::new().register(UserController::new());
    let router = Router::builder()
        .route("/", get(handler_fn(|_req, resp| Box::pin(async move {
            resp.text("hello world");
            Ok(())
        }))))
        .routes(routes_file::load_str(ROUTES, &registry)?)
        .interceptor(InterceptorEntry::new(AuthInterceptor))
        .build()?;

    let dispatcher = Dispatcher::builder()
        .middleware(RequestLogger)
        .middleware(router)
        .exception_handler(ErrorPage)
        .build()?;

    for (method, path) in [("GET", "/"), ("GET", "/users/7"), ("DELETE", "/users/7"), ("GET", "/missing")] {
        let req = http::Request::builder().method(method).uri(path).body(bytes::Bytes::new())?;
        let resp = dispatcher.call(req).await?;
        let body = resp.body().as_bytes().map(String::from_utf8_lossy).unwrap_or_default();
        println!("{method} {path} -> {} {body}", resp.status());
    }

    Ok(())
}
