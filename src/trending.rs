#![forbid(unsafe_code)]

//! Flattening of trending `video` resources into fixed-schema text rows.
//!
//! A row is every column of [`HEADER`], in order, each value stripped of
//! newlines and double quotes and then wrapped in double quotes, joined by
//! commas. Because no value can contain a quote, `","` only ever appears
//! between columns and a row splits back apart unambiguously.

use chrono::NaiveDate;
use std::borrow::Cow;

use crate::resources::Video;

/// Column order shared by the header row, the row formatter and the
/// spreadsheet sink.
pub const HEADER: [&str; 16] = [
    "video_id",
    "title",
    "publishedAt",
    "channelId",
    "channelTitle",
    "categoryId",
    "trending_date",
    "tags",
    "view_count",
    "likes",
    "dislikes",
    "comment_count",
    "thumbnail_link",
    "comments_disabled",
    "ratings_disabled",
    "description",
];

pub const COLUMN_COUNT: usize = HEADER.len();

/// Characters that would break the row format.
const UNSAFE_CHARACTERS: [char; 2] = ['\n', '"'];
/// Rendered in place of the tag list when a video has none.
const NO_TAGS: &str = "[none]";
const TAG_SEPARATOR: &str = "|";

/// One trending video, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    pub channel_id: String,
    pub channel_title: String,
    pub category_id: String,
    pub trending_date: String,
    pub tags: Option<Vec<String>>,
    pub view_count: u64,
    pub likes: u64,
    pub dislikes: u64,
    pub comment_count: u64,
    pub thumbnail_link: String,
    pub comments_disabled: bool,
    pub ratings_disabled: bool,
    pub description: String,
}

impl VideoRecord {
    /// Flattens `video`, or returns `None` when it carries no statistics
    /// (deleted or private by the time it was listed).
    pub fn extract(video: &Video, trending_date: &str) -> Option<Self> {
        let statistics = video.statistics.as_ref()?;
        let snippet = &video.snippet;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        // The API drops the counters instead of zeroing them when the
        // owner disables ratings or comments.
        let (likes, dislikes, ratings_disabled) =
            match (statistics.like_count, statistics.dislike_count) {
                (Some(likes), Some(dislikes)) => (likes, dislikes, false),
                _ => (0, 0, true),
            };
        let (comment_count, comments_disabled) = match statistics.comment_count {
            Some(count) => (count, false),
            None => (0, true),
        };

        Some(Self {
            video_id: video.id.clone(),
            title: text(&snippet.title),
            published_at: text(&snippet.published_at),
            channel_id: text(&snippet.channel_id),
            channel_title: text(&snippet.channel_title),
            category_id: text(&snippet.category_id),
            trending_date: trending_date.to_string(),
            tags: snippet.tags.clone(),
            view_count: statistics.view_count.unwrap_or(0),
            likes,
            dislikes,
            comment_count,
            thumbnail_link: snippet
                .thumbnails
                .as_ref()
                .and_then(|thumbnails| thumbnails.default.as_ref())
                .map(|thumbnail| thumbnail.url.clone())
                .unwrap_or_default(),
            comments_disabled,
            ratings_disabled,
            description: text(&snippet.description),
        })
    }

    /// Unquoted column values in [`HEADER`] order.
    pub fn values(&self) -> [Cow<'_, str>; COLUMN_COUNT] {
        let tags = match &self.tags {
            Some(tags) => Cow::Owned(tags.join(TAG_SEPARATOR)),
            None => Cow::Borrowed(NO_TAGS),
        };
        [
            Cow::Borrowed(self.video_id.as_str()),
            Cow::Borrowed(self.title.as_str()),
            Cow::Borrowed(self.published_at.as_str()),
            Cow::Borrowed(self.channel_id.as_str()),
            Cow::Borrowed(self.channel_title.as_str()),
            Cow::Borrowed(self.category_id.as_str()),
            Cow::Borrowed(self.trending_date.as_str()),
            tags,
            Cow::Owned(self.view_count.to_string()),
            Cow::Owned(self.likes.to_string()),
            Cow::Owned(self.dislikes.to_string()),
            Cow::Owned(self.comment_count.to_string()),
            Cow::Borrowed(self.thumbnail_link.as_str()),
            Cow::Borrowed(render_flag(self.comments_disabled)),
            Cow::Borrowed(render_flag(self.ratings_disabled)),
            Cow::Borrowed(self.description.as_str()),
        ]
    }

    /// The record as one quoted, comma-joined line.
    pub fn to_row(&self) -> String {
        join_quoted(self.values().iter().map(|value| value.as_ref()))
    }
}

/// Flattens a page of items into rows, skipping items without statistics.
pub fn extract_rows(videos: &[Video], trending_date: &str) -> Vec<String> {
    videos
        .iter()
        .filter_map(|video| VideoRecord::extract(video, trending_date))
        .map(|record| record.to_row())
        .collect()
}

/// The header line, quoted like a data row.
pub fn header_row() -> String {
    join_quoted(HEADER.iter().copied())
}

/// Label for the day a row was collected: two-digit year, day, month.
pub fn trending_date(date: NaiveDate) -> String {
    date.format("%y.%d.%m").to_string()
}

/// Removes the characters that would break the row format.
pub fn sanitize(value: &str) -> String {
    value.replace(UNSAFE_CHARACTERS, "")
}

pub fn quote(value: &str) -> String {
    format!("\"{}\"", sanitize(value))
}

/// Splits a row produced by [`VideoRecord::to_row`] or [`header_row`] back
/// into its unquoted values.
pub fn split_row(row: &str) -> Vec<String> {
    let inner = row
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(row);
    if inner.is_empty() && row.is_empty() {
        return Vec::new();
    }
    inner.split("\",\"").map(str::to_string).collect()
}

pub(crate) fn render_flag(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn join_quoted<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.map(quote).collect::<Vec<_>>().join(",")
}
