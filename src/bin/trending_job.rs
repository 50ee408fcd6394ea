#![forbid(unsafe_code)]

//! Scheduled trending collector.
//!
//! Every interval, walks the most-popular chart of each configured country,
//! formats the videos into rows and appends them to the shared spreadsheet.
//! `--output-dir` also keeps a local `<CC>_videos.csv` per country.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::Parser;
use trendtube_tools::api::YouTubeApi;
use trendtube_tools::config::{JobConfig, RuntimeOverrides, resolve_job_config};
use trendtube_tools::credentials::write_service_account;
use trendtube_tools::logging::init_logging;
use trendtube_tools::schedule::{run_cycle, run_forever};
use trendtube_tools::sheets::{Spreadsheet, sheet_rows};
use trendtube_tools::sink::append_lines;
use trendtube_tools::trending::{header_row, trending_date};

#[derive(Debug, Clone, Parser)]
#[command(name = "trending_job", version, about = "Collect trending videos into a spreadsheet")]
struct JobArgs {
    /// Seconds to wait between cycles.
    #[arg(long)]
    interval: Option<u64>,
    /// Region code to collect; repeat for several countries.
    #[arg(long = "country")]
    countries: Vec<String>,
    /// Title of the target spreadsheet.
    #[arg(long)]
    spreadsheet: Option<String>,
    #[arg(long = "env-file")]
    env_file: Option<PathBuf>,
    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,
    /// Also append each country's rows to <DIR>/<CC>_videos.csv.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl JobArgs {
    fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            env_path: self.env_file.clone(),
            interval_secs: self.interval,
            country_codes: (!self.countries.is_empty()).then(|| self.countries.clone()),
            spreadsheet_name: self.spreadsheet.clone(),
            ..RuntimeOverrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("installing TLS crypto provider"))?;
    init_logging();

    let args = JobArgs::parse();
    let config = resolve_job_config(args.overrides())?;
    write_service_account(&config.credentials_path, &config.service_account)?;
    tracing::info!(
        countries = ?config.country_codes,
        interval_secs = config.interval.as_secs(),
        spreadsheet = %config.spreadsheet_name,
        "trending job starting"
    );

    let job = Job {
        api: YouTubeApi::new(&config.api),
        spreadsheet: Spreadsheet::new(&config.spreadsheet_name, &config.credentials_path)?,
        output_dir: args.output_dir,
        config,
    };

    if args.once {
        return job.cycle().await;
    }
    run_forever(job.config.interval, async || job.cycle().await).await;
    Ok(())
}

struct Job {
    api: YouTubeApi,
    spreadsheet: Spreadsheet,
    output_dir: Option<PathBuf>,
    config: JobConfig,
}

impl Job {
    async fn cycle(&self) -> Result<()> {
        let date = trending_date(chrono::Local::now().date_naive());
        let rows = run_cycle(
            &self.api,
            &self.config.country_codes,
            &date,
            async |country: &str, rows: Vec<String>| self.deliver(country, rows).await,
        )
        .await?;
        tracing::info!(date = %date, rows, "trending cycle finished");
        Ok(())
    }

    async fn deliver(&self, country: &str, rows: Vec<String>) -> Result<()> {
        if let Some(dir) = &self.output_dir {
            let path = country_csv_path(dir, country);
            let header = header_row();
            append_lines(&path, &rows, Some(&header))?;
            tracing::info!(country, path = %path.display(), rows = rows.len(), "appended local rows");
        }
        self.spreadsheet
            .append_rows(sheet_rows(&rows, self.config.sheet_row_limit))
            .await
    }
}

fn country_csv_path(dir: &Path, country: &str) -> PathBuf {
    dir.join(format!("{country}_videos.csv"))
}
