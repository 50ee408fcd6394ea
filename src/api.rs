#![forbid(unsafe_code)]

//! Raw access to the video platform's data API.
//!
//! Every request goes through [`YouTubeApi::get_json`], which owns the
//! rate-limit policy: an HTTP 429 pauses for the configured fixed delay and
//! re-issues the identical request, with no retry cap. Other error statuses
//! are logged and their payload is handed back untouched; callers find out
//! when the expected fields are missing.

use anyhow::{Context, Result};
use serde_json::Value;
use std::{sync::Arc, thread, time::Duration};

use crate::config::ApiSettings;

/// Status code the API uses to signal a temporary ban.
pub const RATE_LIMITED: u16 = 429;

/// Parts requested for trending listings.
const TRENDING_PARTS: &str = "id,statistics,snippet";
/// Parts requested for single-video lookups.
const VIDEO_PARTS: &str = "snippet,contentDetails,statistics,status,topicDetails";
const CHANNEL_PARTS: &str = "snippet,contentDetails,statistics";
const ACTIVITY_PARTS: &str = "contentDetails";
/// Page size for trending listings (the API maximum).
const TRENDING_PAGE_SIZE: &str = "50";

/// Status and decoded body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

impl HttpReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking HTTP GET. Implemented over `ureq` in production and by
/// [`crate::canned::CannedTransport`] in tests.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply>;
}

/// Production transport backed by a shared `ureq` agent. No timeouts are
/// configured, so a stalled upstream stalls the caller.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply> {
        let mut request = self.agent.get(url);
        for (name, value) in query {
            request = request.query(name, value);
        }

        // ureq reports 4xx/5xx as errors; we want the payload either way.
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(err) => return Err(err).with_context(|| format!("GET {url}")),
        };

        let status = response.status();
        let text = response
            .into_string()
            .with_context(|| format!("reading response body from {url}"))?;
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            Err(_) if !(200..300).contains(&status) => Value::Null,
            Err(err) => {
                return Err(err).with_context(|| format!("parsing JSON response from {url}"));
            }
        };
        Ok(HttpReply { status, body })
    }
}

/// Client for the handful of list endpoints this crate uses.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct YouTubeApi {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: String,
    rate_limit_delay: Duration,
}

impl YouTubeApi {
    pub fn new(settings: &ApiSettings) -> Self {
        Self::with_transport(settings, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(settings: &ApiSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            rate_limit_delay: settings.rate_limit_delay,
        }
    }

    /// Issues `GET {base}/{resource}` with `params` plus the API key.
    ///
    /// Blocks for the fixed rate-limit delay and repeats the same request
    /// for as long as the API keeps answering 429.
    pub fn get_json(&self, resource: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, resource);
        let mut query = params.to_vec();
        query.push(("key", self.api_key.as_str()));

        let mut attempt = 1u32;
        loop {
            let reply = self.transport.get(&url, &query)?;
            if reply.status == RATE_LIMITED {
                tracing::warn!(
                    resource,
                    attempt,
                    delay_secs = self.rate_limit_delay.as_secs(),
                    "temporarily banned for excess requests; waiting before retrying"
                );
                thread::sleep(self.rate_limit_delay);
                attempt += 1;
                continue;
            }
            if !reply.is_success() {
                tracing::warn!(resource, status = reply.status, "API returned an error status");
            }
            return Ok(reply.body);
        }
    }

    /// One page of the most-popular chart for `country_code`. The first page
    /// is requested without a token.
    pub fn trending_page(&self, country_code: &str, page_token: Option<&str>) -> Result<Value> {
        let mut params = vec![
            ("part", TRENDING_PARTS),
            ("chart", "mostPopular"),
            ("regionCode", country_code),
            ("maxResults", TRENDING_PAGE_SIZE),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.get_json("videos", &params)
    }

    pub fn video(&self, video_id: &str) -> Result<Value> {
        self.get_json("videos", &[("part", VIDEO_PARTS), ("id", video_id)])
    }

    pub fn channel(&self, channel_id: &str) -> Result<Value> {
        self.get_json("channels", &[("part", CHANNEL_PARTS), ("id", channel_id)])
    }

    /// Most recent activities of a channel, newest first.
    pub fn activities(&self, channel_id: &str, max_results: u32) -> Result<Value> {
        let max_results = max_results.to_string();
        self.get_json(
            "activities",
            &[
                ("part", ACTIVITY_PARTS),
                ("channelId", channel_id),
                ("maxResults", max_results.as_str()),
            ],
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canned::CannedTransport;
    use serde_json::json;

    pub(crate) fn test_settings() -> ApiSettings {
        ApiSettings {
            base_url: "https://api.test/v3/".into(),
            api_key: "test-key".into(),
            rate_limit_delay: Duration::ZERO,
        }
    }

    #[test]
    fn rate_limited_requests_are_repeated_until_success() {
        let transport = Arc::new(
            CannedTransport::new()
                .reply_status("videos", RATE_LIMITED, json!({}))
                .reply_status("videos", RATE_LIMITED, json!({}))
                .reply("videos", json!({"items": []})),
        );
        let api = YouTubeApi::with_transport(&test_settings(), transport.clone());

        let body = api.trending_page("TH", None).unwrap();
        assert_eq!(body, json!({"items": []}));

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|request| request.query == requests[0].query));
        assert_eq!(requests[0].url, "https://api.test/v3/videos");
    }

    #[test]
    fn error_status_returns_payload() {
        let error = json!({"error": {"code": 403, "message": "forbidden"}});
        let transport = Arc::new(CannedTransport::new().reply_status("channels", 403, error.clone()));
        let api = YouTubeApi::with_transport(&test_settings(), transport);
        assert_eq!(api.channel("UC1").unwrap(), error);
    }

    #[test]
    fn trending_query_carries_region_key_and_token() {
        let transport = Arc::new(
            CannedTransport::new()
                .reply("videos", json!({}))
                .reply("videos", json!({})),
        );
        let api = YouTubeApi::with_transport(&test_settings(), transport.clone());
        api.trending_page("US", None).unwrap();
        api.trending_page("US", Some("CDIQAA")).unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].param("regionCode"), Some("US"));
        assert_eq!(requests[0].param("chart"), Some("mostPopular"));
        assert_eq!(requests[0].param("part"), Some("id,statistics,snippet"));
        assert_eq!(requests[0].param("maxResults"), Some("50"));
        assert_eq!(requests[0].param("key"), Some("test-key"));
        assert_eq!(requests[0].param("pageToken"), None);
        assert_eq!(requests[1].param("pageToken"), Some("CDIQAA"));
    }

    #[test]
    fn activities_request_is_bounded() {
        let transport = Arc::new(CannedTransport::new().reply("activities", json!({})));
        let api = YouTubeApi::with_transport(&test_settings(), transport.clone());
        api.activities("UCx", 100).unwrap();
        let requests = transport.requests();
        assert_eq!(requests[0].param("channelId"), Some("UCx"));
        assert_eq!(requests[0].param("maxResults"), Some("100"));
        assert_eq!(requests[0].param("part"), Some("contentDetails"));
    }
}
