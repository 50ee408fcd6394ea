#![forbid(unsafe_code)]

//! A [`Transport`] that answers from a script instead of the network.
//!
//! Replies are registered per resource (the last path segment, e.g.
//! `videos`), optionally narrowed to a query parameter value, and each one
//! is served exactly once in registration order. Every request is recorded
//! so callers can assert on what was asked. Used by the unit tests and by
//! the binaries' tests.

use anyhow::{Result, bail};
use parking_lot::Mutex;
use serde_json::Value;

use crate::api::{HttpReply, Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn resource(&self) -> &str {
        resource_of(&self.url)
    }
}

#[derive(Debug)]
struct CannedReply {
    resource: String,
    matcher: Option<(String, String)>,
    reply: Option<HttpReply>,
}

impl CannedReply {
    fn matches(&self, resource: &str, query: &[(&str, &str)]) -> bool {
        if self.reply.is_none() || self.resource != resource {
            return false;
        }
        match &self.matcher {
            Some((name, expected)) => query
                .iter()
                .any(|(key, value)| key == name && value == expected),
            None => true,
        }
    }
}

#[derive(Debug, Default)]
pub struct CannedTransport {
    replies: Mutex<Vec<CannedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl CannedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a 200 reply for any request to `resource`.
    pub fn reply(self, resource: &str, body: Value) -> Self {
        self.push(resource, None, HttpReply::ok(body))
    }

    /// Queues a reply with an explicit status for any request to `resource`.
    pub fn reply_status(self, resource: &str, status: u16, body: Value) -> Self {
        self.push(resource, None, HttpReply { status, body })
    }

    /// Queues a 200 reply for requests to `resource` whose `param` equals `value`.
    pub fn reply_when(self, resource: &str, param: &str, value: &str, body: Value) -> Self {
        self.push(
            resource,
            Some((param.to_string(), value.to_string())),
            HttpReply::ok(body),
        )
    }

    fn push(self, resource: &str, matcher: Option<(String, String)>, reply: HttpReply) -> Self {
        self.replies.lock().push(CannedReply {
            resource: resource.to_string(),
            matcher,
            reply: Some(reply),
        });
        self
    }

    /// Everything requested so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of replies that were registered but never served.
    pub fn unused(&self) -> usize {
        self.replies
            .lock()
            .iter()
            .filter(|canned| canned.reply.is_some())
            .count()
    }
}

impl Transport for CannedTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply> {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            query: query
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        });

        let resource = resource_of(url);
        let mut replies = self.replies.lock();
        let Some(canned) = replies
            .iter_mut()
            .find(|canned| canned.matches(resource, query))
        else {
            bail!("no canned reply left for GET {url}");
        };
        match canned.reply.take() {
            Some(reply) => Ok(reply),
            None => bail!("no canned reply left for GET {url}"),
        }
    }
}

fn resource_of(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replies_are_served_once_in_order() {
        let transport = CannedTransport::new()
            .reply("videos", json!(1))
            .reply("videos", json!(2));
        assert_eq!(transport.get("https://x/videos", &[]).unwrap().body, json!(1));
        assert_eq!(transport.get("https://x/videos", &[]).unwrap().body, json!(2));
        assert!(transport.get("https://x/videos", &[]).is_err());
        assert_eq!(transport.unused(), 0);
    }

    #[test]
    fn matcher_narrows_by_parameter() {
        let transport = CannedTransport::new()
            .reply_when("videos", "id", "b", json!("b"))
            .reply_when("videos", "id", "a", json!("a"));
        assert_eq!(
            transport.get("https://x/videos", &[("id", "a")]).unwrap().body,
            json!("a")
        );
        assert_eq!(transport.unused(), 1);
        assert_eq!(transport.requests()[0].param("id"), Some("a"));
        assert_eq!(transport.requests()[0].resource(), "videos");
    }
}
