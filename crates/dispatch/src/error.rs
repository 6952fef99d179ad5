//! Error types shared by the dispatch engine.
//!
//! Errors fall into two groups:
//! - registration-time errors ([`PatternError`], [`RouteParseError`], [`ResolveError`], [`RouteError`]),
//!   raised while routes are declared, parsed or bound and never deferred to the first request
//! - the runtime [`DispatchError`], which travels outward through the interceptor chain and the
//!   middleware chain until the dispatcher hands it to the configured exception handler

use http::Method;
use thiserror::Error;

/// Boxed application error, as returned by handlers, interceptors and middlewares.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A route path pattern could not be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("path pattern must start with '/': {pattern}")]
    MissingLeadingSlash { pattern: String },

    #[error("path pattern '{pattern}' cannot be compiled: {reason}")]
    Invalid { pattern: String, reason: String },
}

impl PatternError {
    pub fn missing_leading_slash<S: ToString>(pattern: S) -> Self {
        Self::MissingLeadingSlash { pattern: pattern.to_string() }
    }

    pub fn invalid<S: ToString, R: ToString>(pattern: S, reason: R) -> Self {
        Self::Invalid { pattern: pattern.to_string(), reason: reason.to_string() }
    }
}

/// A line of a route-definition source is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("route definition error at line {line}: {kind}")]
pub struct RouteParseError {
    line: usize,
    kind: RouteParseErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteParseErrorKind {
    #[error("expected 'METHOD PATH Controller#action', missing {field}")]
    MissingField { field: &'static str },

    #[error("unexpected trailing field '{field}'")]
    ExtraField { field: String },

    #[error("unsupported http method '{method}'")]
    UnsupportedMethod { method: String },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid handler target '{target}', expected Controller#action")]
    InvalidTarget { target: String },
}

impl RouteParseError {
    pub fn new(line: usize, kind: RouteParseErrorKind) -> Self {
        Self { line, kind }
    }

    /// 1-based line number of the offending line.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn kind(&self) -> &RouteParseErrorKind {
        &self.kind
    }
}

/// A controller or one of its actions could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown controller '{name}'")]
    UnknownController { name: String },

    #[error("controller '{controller}' has no action '{action}'")]
    UnknownAction { controller: String, action: String },
}

impl ResolveError {
    pub fn unknown_controller<S: ToString>(name: S) -> Self {
        Self::UnknownController { name: name.to_string() }
    }

    pub fn unknown_action<C: ToString, A: ToString>(controller: C, action: A) -> Self {
        Self::UnknownAction { controller: controller.to_string(), action: action.to_string() }
    }
}

/// Registering a route failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Parse(#[from] RouteParseError),

    #[error("route definition at line {line} cannot be resolved: {source}")]
    Unresolved { line: usize, source: ResolveError },
}

/// Runtime failure of a single dispatch.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No middleware produced a result for the request.
    #[error("no route matched: {method} {path}")]
    NotFound { method: Method, path: String },

    /// `proceed` was called on a chain that already ran its terminal step.
    #[error("chain already completed, proceed called more than once")]
    ChainCompleted,

    /// The middleware list could not be built for this request.
    #[error("failed to build middlewares: {source}")]
    Build { source: BoxError },

    /// The original error raised by a handler, interceptor or middleware.
    #[error(transparent)]
    Application(BoxError),
}

impl DispatchError {
    pub fn not_found<S: ToString>(method: Method, path: S) -> Self {
        Self::NotFound { method, path: path.to_string() }
    }

    pub fn build(source: BoxError) -> Self {
        Self::Build { source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the application error if this is one.
    pub fn application(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Application(e) => Some(&**e),
            _ => None,
        }
    }
}

/// Restores a `DispatchError` that was boxed on its way through a handler,
/// interceptor or middleware, so it is never wrapped twice.
impl From<BoxError> for DispatchError {
    fn from(error: BoxError) -> Self {
        match error.downcast::<DispatchError>() {
            Ok(dispatch_error) => *dispatch_error,
            Err(other) => Self::Application(other),
        }
    }
}
