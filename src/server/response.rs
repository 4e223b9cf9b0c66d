//! HTTP responses

use log::warn;
use serde_json::{json, Value};
use std::io::Cursor;
use tiny_http::{Header, Response, StatusCode};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Transport-independent JSON response produced by the route handlers
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}

impl ApiResponse {
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// `{"success": false, "error": message}`
    #[must_use]
    pub fn error<S: AsRef<str>>(status: u16, message: S) -> Self {
        Self::json(status, json!({ "success": false, "error": message.as_ref() }))
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize into a tiny_http response
    #[must_use]
    pub fn into_http(self) -> Response<Cursor<Vec<u8>>> {
        let body = serde_json::to_vec(&self.body).unwrap_or_else(|_| b"{}".to_vec());
        let mut response = Response::from_data(body)
            .with_status_code(StatusCode(self.status))
            .with_header(make_header("Content-Type", JSON_CONTENT_TYPE));

        for (name, value) in &self.headers {
            if let Some(header) = make_header_checked(name, value) {
                response.add_header(header);
            }
        }
        response
    }
}

#[allow(clippy::expect_used)]
fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid")
}

fn make_header_checked(name: &str, value: &str) -> Option<Header> {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => Some(header),
        Err(()) => {
            warn!("Dropping invalid response header {:?}", name);
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let response = ApiResponse::error(400, "No image provided");
        assert_eq!(response.status, 400);
        assert_eq!(
            response.body,
            json!({ "success": false, "error": "No image provided" })
        );
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = ApiResponse::ok(json!({}))
            .with_headers(vec![("Access-Control-Allow-Origin".into(), "https://a.example".into())]);
        assert_eq!(
            response.header("access-control-allow-origin"),
            Some("https://a.example")
        );
    }

    #[test]
    fn test_into_http_sets_status() {
        let response = ApiResponse::error(413, "too large").into_http();
        assert_eq!(response.status_code(), StatusCode(413));
    }
}
