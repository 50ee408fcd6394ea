#![forbid(unsafe_code)]

//! The trending job's loop: one fetch-and-deliver pass over every country,
//! a fixed pause, repeat.

use anyhow::{Context, Result};
use std::ops::AsyncFnMut;
use std::time::Duration;

use crate::api::YouTubeApi;
use crate::paginate::fetch_all_pages;

/// Fetches every country in order and hands each country's rows to
/// `deliver`. Countries are never fetched concurrently, and every cycle
/// starts from the first page. Returns the number of rows delivered.
pub async fn run_cycle<F>(
    api: &YouTubeApi,
    country_codes: &[String],
    trending_date: &str,
    mut deliver: F,
) -> Result<usize>
where
    F: AsyncFnMut(&str, Vec<String>) -> Result<()>,
{
    let mut delivered = 0;
    for country in country_codes {
        let worker = api.clone();
        let code = country.clone();
        let date = trending_date.to_string();
        let rows = tokio::task::spawn_blocking(move || fetch_all_pages(&worker, &code, &date))
            .await
            .context("trending fetch task panicked")??;
        delivered += rows.len();
        deliver(country.as_str(), rows)
            .await
            .with_context(|| format!("delivering rows for {country}"))?;
    }
    Ok(delivered)
}

/// Calls `cycle`, then sleeps `interval`, forever. A failed cycle is logged
/// and the next one runs on schedule. Overruns are not caught up.
pub async fn run_forever<F>(interval: Duration, mut cycle: F)
where
    F: AsyncFnMut() -> Result<()>,
{
    let mut iteration = 0u64;
    loop {
        iteration += 1;
        if let Err(err) = cycle().await {
            tracing::error!(iteration, "trending cycle failed: {err:#}");
        }
        tokio::time::sleep(interval).await;
    }
}
