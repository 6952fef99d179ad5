//! Textual route definitions.
//!
//! One route per line, fields separated by spaces or tabs:
//!
//! ```text
//! # method  path              target
//! GET       /                 Home#index
//! GET       /users/{id}       UserController#show
//! delete    /users/{id}       UserController#remove
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Methods are `GET`, `POST`, `PUT` and
//! `DELETE`, in any case. A path starts with `/` and contains no `?`, `#` or space; a `{name}`
//! placeholder contains neither `/` nor `{`.
//!
//! Parsing only checks the syntax; [`load`] then resolves every controller through a
//! [`ControllerLoader`] and binds every action, so unknown names fail before the first request.

use crate::error::{ResolveError, RouteError, RouteParseError, RouteParseErrorKind};
use crate::handler::Controller;
use crate::loader::ControllerLoader;
use crate::route::Route;
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// A parsed, not yet resolved, route definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    line: usize,
    method: Method,
    path: String,
    controller: String,
    action: String,
}

impl RouteDefinition {
    /// 1-based line the definition was read from.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// Parses every line of `source`, stopping at the first malformed one.
pub fn parse(source: &str) -> Result<Vec<RouteDefinition>, RouteParseError> {
    let mut definitions = Vec::new();
    for (index, line) in source.lines().enumerate() {
        if let Some(definition) = parse_line(index + 1, line)? {
            definitions.push(definition);
        }
    }
    Ok(definitions)
}

/// Parses a single line; blank and comment lines yield `None`.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<RouteDefinition>, RouteParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let error = |kind: RouteParseErrorKind| RouteParseError::new(line_number, kind);

    let mut fields = trimmed.split_whitespace();
    let method = fields.next().ok_or_else(|| error(RouteParseErrorKind::MissingField { field: "method" }))?;
    let path = fields.next().ok_or_else(|| error(RouteParseErrorKind::MissingField { field: "path" }))?;
    let target = fields.next().ok_or_else(|| error(RouteParseErrorKind::MissingField { field: "target" }))?;
    if let Some(extra) = fields.next() {
        return Err(error(RouteParseErrorKind::ExtraField { field: extra.to_string() }));
    }

    let method = parse_method(method).map_err(&error)?;
    validate_path(path).map_err(&error)?;
    let (controller, action) = parse_target(target).map_err(&error)?;

    Ok(Some(RouteDefinition {
        line: line_number,
        method,
        path: path.to_string(),
        controller: controller.to_string(),
        action: action.to_string(),
    }))
}

fn parse_method(method: &str) -> Result<Method, RouteParseErrorKind> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(RouteParseErrorKind::UnsupportedMethod { method: method.to_string() }),
    }
}

fn validate_path(path: &str) -> Result<(), RouteParseErrorKind> {
    let invalid =
        |reason: &str| RouteParseErrorKind::InvalidPath { path: path.to_string(), reason: reason.to_string() };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let mut in_placeholder = false;
    let mut placeholder_len = 0_usize;
    for c in path.chars() {
        match c {
            '?' | '#' | ' ' => return Err(invalid("contains a forbidden character")),
            '{' if in_placeholder => return Err(invalid("nested '{' in placeholder")),
            '{' => {
                in_placeholder = true;
                placeholder_len = 0;
            }
            '}' if !in_placeholder => return Err(invalid("unmatched '}'")),
            '}' if placeholder_len == 0 => return Err(invalid("empty placeholder")),
            '}' => in_placeholder = false,
            '/' if in_placeholder => return Err(invalid("'/' in placeholder")),
            _ if in_placeholder => placeholder_len += 1,
            _ => {}
        }
    }

    if in_placeholder {
        return Err(invalid("unclosed placeholder"));
    }
    Ok(())
}

fn parse_target(target: &str) -> Result<(&str, &str), RouteParseErrorKind> {
    match target.split_once('#') {
        Some((controller, action)) if !controller.is_empty() && !action.is_empty() && !action.contains('#') => {
            Ok((controller, action))
        }
        _ => Err(RouteParseErrorKind::InvalidTarget { target: target.to_string() }),
    }
}

/// Resolves and binds every definition, in order.
///
/// Each distinct controller name is loaded once and shared by its routes.
pub fn load(definitions: &[RouteDefinition], loader: &dyn ControllerLoader) -> Result<Vec<Route>, RouteError> {
    let mut controllers: HashMap<&str, Arc<dyn Controller>> = HashMap::new();
    let mut routes = Vec::with_capacity(definitions.len());

    for definition in definitions {
        let unresolved = |source: ResolveError| RouteError::Unresolved { line: definition.line, source };

        let controller = match controllers.get(definition.controller.as_str()) {
            Some(controller) => Arc::clone(controller),
            None => {
                let controller = loader.load(&definition.controller).map_err(unresolved)?;
                controllers.insert(definition.controller.as_str(), Arc::clone(&controller));
                controller
            }
        };

        let route = Route::bind(definition.method.clone(), &definition.path, controller, &definition.action).map_err(
            |e| match e {
                RouteError::Resolve(source) => unresolved(source),
                other => other,
            },
        )?;
        routes.push(route);
    }

    info!(routes = routes.len(), controllers = controllers.len(), "route definitions loaded");
    Ok(routes)
}

/// Parses `source` and loads the definitions in one step.
pub fn load_str(source: &str, loader: &dyn ControllerLoader) -> Result<Vec<Route>, RouteError> {
    let definitions = parse(source)?;
    load(&definitions, loader)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(line: &str) -> RouteParseErrorKind {
        parse_line(1, line).unwrap_err().kind().clone()
    }

    #[test]
    fn test_parse_routes() {
        let source = "\
# home
GET /   Home#index

\tget\t/users/{id}\t\tUserController#show
Delete /users/{id} UserController#remove
";
        let definitions = parse(source).unwrap();
        assert_eq!(definitions.len(), 3);

        assert_eq!(definitions[0].line(), 2);
        assert_eq!(definitions[0].method(), Method::GET);
        assert_eq!(definitions[0].path(), "/");
        assert_eq!(definitions[0].controller(), "Home");
        assert_eq!(definitions[0].action(), "index");

        assert_eq!(definitions[1].line(), 4);
        assert_eq!(definitions[1].path(), "/users/{id}");
        assert_eq!(definitions[2].method(), Method::DELETE);
        assert_eq!(definitions[2].action(), "remove");
    }

    #[test]
    fn test_error_reports_line_number() {
        let source = "GET / Home#index\n\nFETCH / Home#index\n";
        let error = parse(source).unwrap_err();
        assert_eq!(error.line(), 3);
        assert_eq!(error.kind(), &RouteParseErrorKind::UnsupportedMethod { method: "FETCH".to_string() });
    }

    #[test]
    fn test_missing_and_extra_fields() {
        assert_eq!(kind_of("GET /"), RouteParseErrorKind::MissingField { field: "target" });
        assert_eq!(kind_of("GET"), RouteParseErrorKind::MissingField { field: "path" });
        assert_eq!(kind_of("GET / Home#index extra"), RouteParseErrorKind::ExtraField { field: "extra".to_string() });
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["users", "/a?b", "/a#b", "/{a{b}}", "/{a/b}", "/{}", "/{open", "/close}"] {
            let kind = kind_of(&format!("GET {path} Home#index"));
            assert!(matches!(kind, RouteParseErrorKind::InvalidPath { .. }), "path {path}: {kind}");
        }
    }

    #[test]
    fn test_invalid_targets() {
        for target in ["Home", "Home#", "#index", "Home#index#more"] {
            let kind = kind_of(&format!("GET / {target}"));
            assert_eq!(kind, RouteParseErrorKind::InvalidTarget { target: target.to_string() });
        }
    }

    #[test]
    fn test_methods_outside_grammar_are_rejected() {
        assert!(matches!(kind_of("PATCH / Home#index"), RouteParseErrorKind::UnsupportedMethod { .. }));
        assert!(matches!(kind_of("OPTIONS / Home#index"), RouteParseErrorKind::UnsupportedMethod { .. }));
    }
}
