//! Response value written by middlewares, interceptors and handlers.
//!
//! The status starts out unset: the router sets `200 OK` once a route matched, so that a
//! handler or interceptor can still override it, while an unmatched request travels back
//! through the middleware chain with no status assumed.

use crate::body::ResponseBody;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// The status set so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<ResponseBody>) {
        self.body = body.into();
    }

    /// Writes a `text/plain` body.
    pub fn text(&mut self, text: impl Into<String>) {
        self.set_content_type(&mime::TEXT_PLAIN_UTF_8);
        self.body = ResponseBody::from(text.into());
    }

    /// Serializes `value` as the `application/json` body.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        self.set_content_type(&mime::APPLICATION_JSON);
        self.body = ResponseBody::from(bytes);
        Ok(())
    }

    fn set_content_type(&mut self, mime: &mime::Mime) {
        self.headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_str(mime.as_ref()).unwrap_or_else(|_| {
            HeaderValue::from_static("application/octet-stream")
        }));
    }

    /// Converts into an `http::Response`, an unset status becomes `200 OK`.
    pub fn into_http(self) -> http::Response<ResponseBody> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_unset_by_default() {
        let response = Response::new();
        assert_eq!(response.status(), None);
        assert_eq!(response.into_http().status(), StatusCode::OK);
    }

    #[test]
    fn test_text() {
        let mut response = Response::new();
        response.set_status(StatusCode::CREATED);
        response.text("hello");

        let http_response = response.into_http();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(http_response.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
        assert_eq!(http_response.body().as_bytes(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_json() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let mut response = Response::new();
        response.json(&User { name: "zava" }).unwrap();

        assert_eq!(response.headers().get(http::header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(response.body().as_bytes(), Some(&br#"{"name":"zava"}"#[..]));
    }
}
