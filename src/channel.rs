#![forbid(unsafe_code)]

//! Channel and per-video metadata lookups behind the HTTP service.
//!
//! Videos are fetched one request per id, sequentially. A video that the
//! API no longer returns fails the whole batch; nothing is written for a
//! batch that did not complete.

use anyhow::{Result, anyhow};
use std::path::Path;

use crate::api::YouTubeApi;
use crate::resources::{Activity, Channel, ListResponse, Thumbnail, Video, decode};
use crate::sink::append_records;
use crate::trending::render_flag;

/// How many recent activities are scanned for uploads.
pub const ACTIVITY_LIMIT: u32 = 100;

pub const CHANNELS_FILE: &str = "channels.csv";
pub const VIDEOS_FILE: &str = "videos.csv";

pub const CHANNEL_COLUMNS: [&str; 7] = [
    "channel_name",
    "cid",
    "videoIds",
    "videoCount",
    "totalViews",
    "totalVideos",
    "subscriberCount",
];

pub const VIDEO_COLUMNS: [&str; 12] = [
    "vid",
    "viewCount",
    "channelId",
    "likeCount",
    "favoriteCount",
    "commentCount",
    "madeForKids",
    "duration",
    "publishedAt",
    "caption",
    "tags",
    "thumbnails",
];

const LIST_SEPARATOR: &str = "|";

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRecord {
    pub channel_name: String,
    pub cid: String,
    pub video_ids: Vec<String>,
    pub video_count: usize,
    pub total_views: Option<u64>,
    pub total_videos: Option<u64>,
    pub subscriber_count: Option<u64>,
}

impl ChannelRecord {
    /// Values in [`CHANNEL_COLUMNS`] order.
    pub fn csv_values(&self) -> [String; CHANNEL_COLUMNS.len()] {
        [
            self.channel_name.clone(),
            self.cid.clone(),
            self.video_ids.join(LIST_SEPARATOR),
            self.video_count.to_string(),
            optional(self.total_views),
            optional(self.total_videos),
            optional(self.subscriber_count),
        ]
    }
}

/// Per-video metadata; every field is `None` when the API left it out.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadataRecord {
    pub vid: String,
    pub view_count: Option<u64>,
    pub channel_id: Option<String>,
    pub like_count: Option<u64>,
    pub favorite_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub made_for_kids: Option<bool>,
    pub duration: Option<String>,
    pub published_at: Option<String>,
    pub caption: Option<String>,
    pub tags: Option<Vec<String>>,
    pub thumbnail: Option<Thumbnail>,
}

impl VideoMetadataRecord {
    fn from_video(vid: &str, video: Video) -> Self {
        let statistics = video.statistics.unwrap_or_default();
        let status = video.status.unwrap_or_default();
        let details = video.content_details.unwrap_or_default();
        let snippet = video.snippet;
        Self {
            vid: vid.to_string(),
            view_count: statistics.view_count,
            channel_id: snippet.channel_id,
            like_count: statistics.like_count,
            favorite_count: statistics.favorite_count,
            comment_count: statistics.comment_count,
            made_for_kids: status.made_for_kids,
            duration: details.duration,
            published_at: snippet.published_at,
            caption: details.caption,
            tags: snippet.tags,
            thumbnail: snippet.thumbnails.and_then(|thumbnails| thumbnails.default),
        }
    }

    /// Values in [`VIDEO_COLUMNS`] order. The thumbnail is rendered as
    /// compact JSON.
    pub fn csv_values(&self) -> [String; VIDEO_COLUMNS.len()] {
        [
            self.vid.clone(),
            optional(self.view_count),
            self.channel_id.clone().unwrap_or_default(),
            optional(self.like_count),
            optional(self.favorite_count),
            optional(self.comment_count),
            self.made_for_kids
                .map(|flag| render_flag(flag).to_string())
                .unwrap_or_default(),
            self.duration.clone().unwrap_or_default(),
            self.published_at.clone().unwrap_or_default(),
            self.caption.clone().unwrap_or_default(),
            self.tags
                .as_ref()
                .map(|tags| tags.join(LIST_SEPARATOR))
                .unwrap_or_default(),
            self.thumbnail
                .as_ref()
                .and_then(|thumbnail| serde_json::to_string(thumbnail).ok())
                .unwrap_or_default(),
        ]
    }
}

/// Everything gathered for one `/channel` request.
#[derive(Debug, Default)]
pub struct ChannelBatch {
    pub channels: Vec<ChannelRecord>,
    pub videos: Vec<VideoMetadataRecord>,
}

impl ChannelBatch {
    pub fn summary(&self) -> String {
        format!(
            "Successfully processed {} channels and {} videos",
            self.channels.len(),
            self.videos.len()
        )
    }

    /// Appends the batch to `channels.csv` and `videos.csv` under `data_dir`.
    /// Empty collections leave their file untouched.
    pub fn append_to(&self, data_dir: &Path) -> Result<()> {
        if !self.channels.is_empty() {
            append_records(
                &data_dir.join(CHANNELS_FILE),
                self.channels.iter().map(ChannelRecord::csv_values),
            )?;
        }
        if !self.videos.is_empty() {
            append_records(
                &data_dir.join(VIDEOS_FILE),
                self.videos.iter().map(VideoMetadataRecord::csv_values),
            )?;
        }
        Ok(())
    }
}

/// Looks up the channel that owns `video_id`.
pub fn channel_id_for_video(api: &YouTubeApi, video_id: &str) -> Result<String> {
    let video = first_video(api, video_id)?;
    video
        .snippet
        .channel_id
        .ok_or_else(|| anyhow!("video {video_id} has no channel id"))
}

/// Fetches a channel's summary and the ids of its recent uploads.
pub fn fetch_channel(api: &YouTubeApi, channel_id: &str) -> Result<(ChannelRecord, Vec<String>)> {
    let channels: ListResponse<Channel> = decode(api.channel(channel_id)?, "channel")?;
    let channel = channels
        .items
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("channel not found: {channel_id}"))?;

    let activities: ListResponse<Activity> =
        decode(api.activities(channel_id, ACTIVITY_LIMIT)?, "activities")?;
    let video_ids: Vec<String> = activities
        .items
        .into_iter()
        .filter_map(|activity| activity.content_details.upload)
        .map(|upload| upload.video_id)
        .collect();

    let statistics = channel.statistics.unwrap_or_default();
    let record = ChannelRecord {
        channel_name: channel.snippet.title.unwrap_or_default(),
        cid: channel_id.to_string(),
        video_ids: video_ids.clone(),
        video_count: video_ids.len(),
        total_views: statistics.view_count,
        total_videos: statistics.video_count,
        subscriber_count: statistics.subscriber_count,
    };
    tracing::debug!(channel = channel_id, uploads = record.video_count, "fetched channel");
    Ok((record, video_ids))
}

pub fn fetch_video(api: &YouTubeApi, video_id: &str) -> Result<VideoMetadataRecord> {
    let video = first_video(api, video_id)?;
    Ok(VideoMetadataRecord::from_video(video_id, video))
}

/// Fetches every channel and every upload of every channel, in order.
/// The first failure aborts the batch.
pub fn fetch_channel_batch(api: &YouTubeApi, channel_ids: &[String]) -> Result<ChannelBatch> {
    let mut batch = ChannelBatch::default();
    for channel_id in channel_ids {
        let (channel, video_ids) = fetch_channel(api, channel_id)?;
        batch.channels.push(channel);
        for video_id in &video_ids {
            batch.videos.push(fetch_video(api, video_id)?);
        }
    }
    tracing::info!(
        channels = batch.channels.len(),
        videos = batch.videos.len(),
        "processed channel batch"
    );
    Ok(batch)
}

fn first_video(api: &YouTubeApi, video_id: &str) -> Result<Video> {
    let videos: ListResponse<Video> = decode(api.video(video_id)?, "video")?;
    videos
        .items
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("video not found: {video_id}"))
}

fn optional(value: Option<u64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}
