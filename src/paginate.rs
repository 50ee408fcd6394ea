#![forbid(unsafe_code)]

use anyhow::Result;

use crate::api::YouTubeApi;
use crate::resources::{ListResponse, Video, decode};
use crate::trending::extract_rows;

/// Walks the whole most-popular chart for `country_code` and returns one
/// formatted row per usable video, in API order.
///
/// The first request carries no page token; the walk ends on the first page
/// without `nextPageToken`. There is no page cap.
pub fn fetch_all_pages(
    api: &YouTubeApi,
    country_code: &str,
    trending_date: &str,
) -> Result<Vec<String>> {
    tracing::info!(country = country_code, date = trending_date, "fetching trending data");

    let mut rows = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let payload = api.trending_page(country_code, cursor.as_deref())?;
        let page: ListResponse<Video> = decode(payload, "trending videos")?;
        pages += 1;

        let page_rows = extract_rows(&page.items, trending_date);
        tracing::debug!(
            country = country_code,
            page = pages,
            items = page.items.len(),
            rows = page_rows.len(),
            "fetched trending page"
        );
        rows.extend(page_rows);

        match page.next_page_token {
            Some(token) => cursor = Some(token),
            None => break,
        }
    }

    tracing::info!(country = country_code, pages, videos = rows.len(), "videos found");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::test_settings;
    use crate::canned::CannedTransport;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn item(id: &str) -> Value {
        json!({"id": id, "snippet": {"title": id}, "statistics": {"viewCount": "1"}})
    }

    #[test]
    fn walks_every_page_until_token_is_absent() {
        let transport = Arc::new(
            CannedTransport::new()
                .reply("videos", json!({"items": [item("a"), item("b")], "nextPageToken": "P2"}))
                .reply(
                    "videos",
                    json!({"items": [item("c"), {"id": "private"}], "nextPageToken": "P3"}),
                )
                .reply("videos", json!({"items": [item("d")]})),
        );
        let api = YouTubeApi::with_transport(&test_settings(), transport.clone());

        let rows = fetch_all_pages(&api, "TH", "24.05.03").unwrap();
        let ids: Vec<_> = rows
            .iter()
            .map(|row| crate::trending::split_row(row)[0].clone())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);

        let tokens: Vec<_> = transport
            .requests()
            .iter()
            .map(|request| request.param("pageToken").map(str::to_string))
            .collect();
        assert_eq!(tokens, vec![None, Some("P2".into()), Some("P3".into())]);
        assert_eq!(transport.unused(), 0);
    }

    #[test]
    fn page_without_items_still_advances() {
        let transport = Arc::new(
            CannedTransport::new()
                .reply("videos", json!({"nextPageToken": "P2"}))
                .reply("videos", json!({"items": [item("z")]})),
        );
        let api = YouTubeApi::with_transport(&test_settings(), transport.clone());
        let rows = fetch_all_pages(&api, "US", "24.05.03").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn error_payload_ends_the_walk() {
        let transport = Arc::new(CannedTransport::new().reply_status(
            "videos",
            400,
            json!({"error": {"code": 400, "message": "invalid regionCode"}}),
        ));
        let api = YouTubeApi::with_transport(&test_settings(), transport);
        assert!(fetch_all_pages(&api, "ZZ", "24.05.03").unwrap().is_empty());
    }

    #[test]
    fn transport_failure_propagates() {
        let api = YouTubeApi::with_transport(&test_settings(), Arc::new(CannedTransport::new()));
        assert!(fetch_all_pages(&api, "TH", "24.05.03").is_err());
    }
}
