#![forbid(unsafe_code)]

//! Subsets of the data API's resource payloads.
//!
//! Only the fields this crate reads are modelled. Everything is optional or
//! defaulted because the API omits fields freely (disabled ratings, hidden
//! subscriber counts, videos deleted between listing and lookup).

use anyhow::{Context, Result};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope shared by every `*.list` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub items: Vec<T>,
    /// Token for the next page; absent on the last page.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `video` resource.
#[derive(Debug, Default, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub snippet: VideoSnippet,
    /// Missing when the video was removed or made private after listing.
    pub statistics: Option<VideoStatistics>,
    pub status: Option<VideoStatus>,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoSnippet {
    pub title: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(rename = "channelId")]
    pub channel_id: Option<String>,
    #[serde(rename = "channelTitle")]
    pub channel_title: Option<String>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Counters are sent as decimal strings; numbers are accepted too.
#[derive(Debug, Default, Deserialize)]
pub struct VideoStatistics {
    #[serde(rename = "viewCount", default, deserialize_with = "count")]
    pub view_count: Option<u64>,
    #[serde(rename = "likeCount", default, deserialize_with = "count")]
    pub like_count: Option<u64>,
    #[serde(rename = "dislikeCount", default, deserialize_with = "count")]
    pub dislike_count: Option<u64>,
    #[serde(rename = "favoriteCount", default, deserialize_with = "count")]
    pub favorite_count: Option<u64>,
    #[serde(rename = "commentCount", default, deserialize_with = "count")]
    pub comment_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoStatus {
    #[serde(rename = "madeForKids")]
    pub made_for_kids: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoContentDetails {
    pub duration: Option<String>,
    pub caption: Option<String>,
}

/// A `channel` resource.
#[derive(Debug, Default, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub snippet: ChannelSnippet,
    pub statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelSnippet {
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelStatistics {
    #[serde(rename = "viewCount", default, deserialize_with = "count")]
    pub view_count: Option<u64>,
    #[serde(rename = "videoCount", default, deserialize_with = "count")]
    pub video_count: Option<u64>,
    /// Hidden subscriber counts are simply left out by the API.
    #[serde(rename = "subscriberCount", default, deserialize_with = "count")]
    pub subscriber_count: Option<u64>,
}

/// An `activity` resource. Only upload events carry a video id.
#[derive(Debug, Default, Deserialize)]
pub struct Activity {
    #[serde(rename = "contentDetails", default)]
    pub content_details: ActivityContentDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityContentDetails {
    pub upload: Option<Upload>,
}

#[derive(Debug, Deserialize)]
pub struct Upload {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

/// Decodes a raw API payload into one of the resource types above.
pub fn decode<T: DeserializeOwned>(payload: Value, what: &str) -> Result<T> {
    serde_json::from_value(payload).with_context(|| format!("decoding {what} response"))
}

fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid count: {text:?}"))),
    }
}
