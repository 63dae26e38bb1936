//! In-memory `Transport` for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Answers requests from a fixed table keyed by URL path. Unknown paths get
/// a 404, the way the broker answers for a missing vhost.
#[derive(Debug, Default)]
pub struct CannedTransport {
    replies: HashMap<String, (u16, String)>,
    unreachable: bool,
    seen: RefCell<Vec<HttpRequest>>,
}

impl CannedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, path: &str, status: u16, body: &str) -> Self {
        self.replies.insert(path.to_string(), (status, body.to_string()));
        self
    }

    /// Fail every request as if the broker were down.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.borrow().clone()
    }
}

impl Transport for CannedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.seen.borrow_mut().push(request.clone());
        if self.unreachable {
            return Err(Error::Network("connection refused".to_string()));
        }
        let (status, body) = self
            .replies
            .get(url_path(&request.path))
            .cloned()
            .unwrap_or((404, r#"{"error":"Object Not Found","reason":"Not Found"}"#.to_string()));
        Ok(HttpResponse {
            status,
            reason: reason(status).to_string(),
            headers: Vec::new(),
            body,
        })
    }
}

fn url_path(url: &str) -> &str {
    let rest = url.strip_prefix("http://").unwrap_or(url);
    rest.find('/').map_or("/", |i| &rest[i..])
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}
