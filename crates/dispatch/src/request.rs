//! Request value passed through middlewares, interceptors and handlers.
//!
//! This module contains:
//! - `Request`: the request head, its body and the request-scoped state
//! - `PathVariables`: the values captured from the matched route's path pattern

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri, Version};

/// An inbound request as seen by the dispatch engine.
///
/// Besides the request head and body, a `Request` carries request-scoped state: the path
/// variables bound by the router and arbitrary attributes any processor may attach.
#[derive(Debug)]
pub struct Request {
    head: Parts,
    body: Bytes,
    path_variables: PathVariables,
}

impl Request {
    pub fn new(head: Parts, body: Bytes) -> Self {
        Self { head, body, path_variables: PathVariables::empty() }
    }

    /// Shortcut for a body-less request, mostly useful in tests.
    ///
    /// # Panics
    /// Panics if `uri` is not a valid uri.
    pub fn get(uri: &str) -> Self {
        Self::with_method(Method::GET, uri)
    }

    /// Shortcut for a body-less request with the given method.
    ///
    /// # Panics
    /// Panics if `uri` is not a valid uri.
    pub fn with_method(method: Method, uri: &str) -> Self {
        let request = http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap();
        Self::from(request)
    }

    pub fn head(&self) -> &Parts {
        &self.head
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// The path component of the uri, as received.
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.head.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Request-scoped attributes.
    pub fn extensions(&self) -> &Extensions {
        &self.head.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.head.extensions
    }

    pub fn path_variables(&self) -> &PathVariables {
        &self.path_variables
    }

    /// Gets a single path variable by name.
    pub fn path_variable(&self, name: impl AsRef<str>) -> Option<&str> {
        self.path_variables.get(name)
    }

    pub(crate) fn set_path_variables(&mut self, path_variables: PathVariables) {
        self.path_variables = path_variables;
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (head, body) = request.into_parts();
        Self::new(head, body)
    }
}

/// Named values captured from the request path, in the order the route declared them.
///
/// For example, the pattern `/users/{id}` matched against `/users/42` binds `id` to `42`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariables {
    inner: Vec<(String, String)>,
}

impl PathVariables {
    #[inline]
    pub fn empty() -> Self {
        Self { inner: Vec::new() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Gets the value of a variable by its name.
    /// If a name is declared twice, the first binding wins.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.inner.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Iterates `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl FromIterator<(String, String)> for PathVariables {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}
