#![forbid(unsafe_code)]

//! Process configuration. Everything is resolved once at startup and handed
//! to the components explicitly; nothing reads the environment afterwards.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::credentials::ServiceAccount;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_DATA_DIR: &str = "./data";
/// Fixed pause applied when the API answers 429 (50 minutes).
pub const DEFAULT_RATE_LIMIT_DELAY_SECS: u64 = 3000;
pub const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_COUNTRY_CODES: &[&str] = &["TH"];
pub const DEFAULT_SPREADSHEET_NAME: &str = "Big Data Final Project (Youtube)";
pub const DEFAULT_SHEET_ROW_LIMIT: usize = 4;
pub const DEFAULT_CREDENTIALS_PATH: &str = ".config/gspread/service_account.json";

/// Connection details for the video platform's data API.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: String,
    pub rate_limit_delay: Duration,
}

/// Configuration for the HTTP service binary.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api: ApiSettings,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

/// Configuration for the scheduled trending job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub api: ApiSettings,
    pub interval: Duration,
    pub country_codes: Vec<String>,
    pub spreadsheet_name: String,
    /// Number of data rows pushed to the spreadsheet per country and cycle.
    /// Zero disables the limit.
    pub sheet_row_limit: usize,
    pub credentials_path: PathBuf,
    pub service_account: ServiceAccount,
}

/// Values supplied on the command line. They win over both the process
/// environment and the `.env` file.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub env_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub interval_secs: Option<u64>,
    pub country_codes: Option<Vec<String>>,
    pub spreadsheet_name: Option<String>,
}

impl RuntimeOverrides {
    fn env_path(&self) -> &Path {
        self.env_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH))
    }
}

pub fn resolve_service_config(overrides: RuntimeOverrides) -> Result<ServiceConfig> {
    let file_vars = read_env_file(overrides.env_path())?;
    build_service_config(&file_vars, process_env, overrides)
}

pub fn resolve_job_config(overrides: RuntimeOverrides) -> Result<JobConfig> {
    let file_vars = read_env_file(overrides.env_path())?;
    build_job_config(&file_vars, process_env, overrides)
}

/// Layered key lookup: process environment first, then the `.env` file.
struct Lookup<'a, F> {
    file_vars: &'a HashMap<String, String>,
    env_lookup: F,
}

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.env_lookup)(key)
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.file_vars.get(key).cloned())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| anyhow!("{key} not set"))
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "ignoring unparsable setting");
                default
            }),
            None => default,
        }
    }
}

fn build_api_settings<F>(lookup: &Lookup<'_, F>) -> Result<ApiSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let base_url = lookup.require("YOUTUBE_API_URL")?;
    let api_key = lookup.require("GOOGLE_API_KEY")?;
    let delay = lookup.parse_or("RATE_LIMIT_DELAY_SECS", DEFAULT_RATE_LIMIT_DELAY_SECS);
    Ok(ApiSettings {
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key,
        rate_limit_delay: Duration::from_secs(delay),
    })
}

fn build_service_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<ServiceConfig> {
    let lookup = Lookup {
        file_vars,
        env_lookup,
    };
    let api = build_api_settings(&lookup)?;
    let host = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup.get("TRENDTUBE_HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = overrides
        .port
        .unwrap_or_else(|| lookup.parse_or("TRENDTUBE_PORT", DEFAULT_PORT));
    let data_dir = overrides
        .data_dir
        .or_else(|| lookup.get("TRENDTUBE_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    Ok(ServiceConfig {
        api,
        host,
        port,
        data_dir,
    })
}

fn build_job_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<JobConfig> {
    let lookup = Lookup {
        file_vars,
        env_lookup,
    };
    let api = build_api_settings(&lookup)?;
    let interval = overrides.interval_secs.unwrap_or_else(|| {
        lookup.parse_or("SCHEDULE_INTERVAL_SECS", DEFAULT_SCHEDULE_INTERVAL_SECS)
    });
    let country_codes = overrides
        .country_codes
        .map(|codes| normalize_country_codes(codes.iter().map(String::as_str)))
        .filter(|codes| !codes.is_empty())
        .or_else(|| {
            lookup
                .get("COUNTRY_CODES")
                .map(|raw| normalize_country_codes(raw.split(',')))
                .filter(|codes| !codes.is_empty())
        })
        .unwrap_or_else(|| normalize_country_codes(DEFAULT_COUNTRY_CODES.iter().copied()));
    let spreadsheet_name = overrides
        .spreadsheet_name
        .filter(|value| !value.trim().is_empty())
        .or_else(|| lookup.get("SPREADSHEET_NAME"))
        .unwrap_or_else(|| DEFAULT_SPREADSHEET_NAME.to_string());
    let credentials_path = lookup
        .get("SERVICE_ACCOUNT_CREDENTIALS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH));

    let service_account = ServiceAccount {
        key_type: lookup.get("SERVICE_ACCOUNT_TYPE"),
        project_id: lookup.get("SERVICE_ACCOUNT_PROJECT_ID"),
        private_key_id: lookup.get("SERVICE_ACCOUNT_PRIVATE_KEY_ID"),
        private_key: lookup.require("SERVICE_ACCOUNT_PRIVATE_KEY")?,
        client_email: lookup.require("SERVICE_ACCOUNT_CLIENT_EMAIL")?,
        client_id: lookup.get("SERVICE_ACCOUNT_CLIENT_ID"),
        auth_uri: lookup.get("SERVICE_ACCOUNT_AUTH_URI"),
        token_uri: lookup.require("SERVICE_ACCOUNT_TOKEN_URI")?,
        auth_provider_x509_cert_url: lookup.get("SERVICE_ACCOUNT_AUTH_PROVIDER_X509_CERT_URL"),
        client_x509_cert_url: lookup.get("SERVICE_ACCOUNT_CLIENT_X509_CERT_URL"),
    };

    Ok(JobConfig {
        api,
        interval: Duration::from_secs(interval),
        country_codes,
        spreadsheet_name,
        sheet_row_limit: lookup.parse_or("SHEET_ROW_LIMIT", DEFAULT_SHEET_ROW_LIMIT),
        credentials_path,
        service_account,
    })
}

fn normalize_country_codes<'a>(codes: impl Iterator<Item = &'a str>) -> Vec<String> {
    codes
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Reads a dotenv-style file into a map. A missing file yields no variables.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => return Err(err).with_context(|| format!("Reading {}", path.display())),
    };
    Ok(content
        .lines()
        .filter_map(parse_env_line)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect())
}

/// `KEY=value`, optionally prefixed with `export ` and with the value in
/// single or double quotes. Comments, blank lines and lines without `=`
/// yield nothing.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, unquote(value.trim())))
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const API_VARS: &str = "YOUTUBE_API_URL=\"https://api.test/v3/\"\nGOOGLE_API_KEY=\"k\"\n";
    const ACCOUNT_VARS: &str = "SERVICE_ACCOUNT_PRIVATE_KEY=\"-----BEGIN-----\\nabc\"\n\
        SERVICE_ACCOUNT_CLIENT_EMAIL=\"bot@example.test\"\n\
        SERVICE_ACCOUNT_TOKEN_URI=\"https://oauth.test/token\"\n";

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn vars_from(contents: &str) -> HashMap<String, String> {
        let cfg = make_config(contents);
        read_env_file(cfg.path()).unwrap()
    }

    #[test]
    fn service_config_defaults() {
        let vars = vars_from(API_VARS);
        let config = build_service_config(&vars, |_| None, RuntimeOverrides::default()).unwrap();
        assert_eq!(config.api.base_url, "https://api.test/v3");
        assert_eq!(config.api.api_key, "k");
        assert_eq!(
            config.api.rate_limit_delay,
            Duration::from_secs(DEFAULT_RATE_LIMIT_DELAY_SECS)
        );
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let vars = vars_from("YOUTUBE_API_URL=\"https://api.test\"\n");
        let err = build_service_config(&vars, |_| None, RuntimeOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn env_wins_over_file_and_overrides_win_over_env() {
        let vars = vars_from(&format!("{API_VARS}TRENDTUBE_PORT=\"7000\"\nTRENDTUBE_HOST=\"file\"\n"));
        let config = build_service_config(
            &vars,
            |key| match key {
                "TRENDTUBE_PORT" => Some("8000".into()),
                "TRENDTUBE_HOST" => Some("env".into()),
                _ => None,
            },
            RuntimeOverrides {
                host: Some("cli".into()),
                ..RuntimeOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "cli");
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let vars = vars_from(&format!("{API_VARS}TRENDTUBE_PORT=\"nope\"\n"));
        let config = build_service_config(&vars, |_| None, RuntimeOverrides::default()).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn job_config_reads_service_account_and_schedule() {
        let vars = vars_from(&format!(
            "{API_VARS}{ACCOUNT_VARS}COUNTRY_CODES=\"th, us,,gb\"\nSCHEDULE_INTERVAL_SECS=\"60\"\nSHEET_ROW_LIMIT=\"0\"\n"
        ));
        let config = build_job_config(&vars, |_| None, RuntimeOverrides::default()).unwrap();
        assert_eq!(config.country_codes, vec!["TH", "US", "GB"]);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.sheet_row_limit, 0);
        assert_eq!(config.spreadsheet_name, DEFAULT_SPREADSHEET_NAME);
        assert_eq!(config.credentials_path, PathBuf::from(DEFAULT_CREDENTIALS_PATH));
        assert_eq!(config.service_account.client_email, "bot@example.test");
        assert_eq!(config.service_account.private_key, "-----BEGIN-----\\nabc");
        assert!(config.service_account.project_id.is_none());
    }

    #[test]
    fn job_config_defaults_and_overrides() {
        let vars = vars_from(&format!("{API_VARS}{ACCOUNT_VARS}"));
        let defaults = build_job_config(&vars, |_| None, RuntimeOverrides::default()).unwrap();
        assert_eq!(defaults.country_codes, vec!["TH"]);
        assert_eq!(
            defaults.interval,
            Duration::from_secs(DEFAULT_SCHEDULE_INTERVAL_SECS)
        );
        assert_eq!(defaults.sheet_row_limit, DEFAULT_SHEET_ROW_LIMIT);

        let overridden = build_job_config(
            &vars,
            |_| None,
            RuntimeOverrides {
                interval_secs: Some(5),
                country_codes: Some(vec!["jp".into()]),
                spreadsheet_name: Some("Other".into()),
                ..RuntimeOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(overridden.interval, Duration::from_secs(5));
        assert_eq!(overridden.country_codes, vec!["JP"]);
        assert_eq!(overridden.spreadsheet_name, "Other");
    }

    #[test]
    fn job_config_requires_private_key() {
        let vars = vars_from(API_VARS);
        let err = build_job_config(&vars, |_| None, RuntimeOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("SERVICE_ACCOUNT_PRIVATE_KEY"));
    }

    #[test]
    fn env_lines_follow_the_dotenv_dialect() {
        assert_eq!(
            parse_env_line("export YOUTUBE_API_URL=\"https://api.test\""),
            Some(("YOUTUBE_API_URL", "https://api.test"))
        );
        assert_eq!(parse_env_line("GOOGLE_API_KEY='secret'"), Some(("GOOGLE_API_KEY", "secret")));
        assert_eq!(parse_env_line("  TRENDTUBE_HOST =  0.0.0.0 "), Some(("TRENDTUBE_HOST", "0.0.0.0")));
        assert_eq!(parse_env_line("KEY=a=b"), Some(("KEY", "a=b")));
        assert_eq!(parse_env_line("HALF=\"open"), Some(("HALF", "\"open")));
        assert_eq!(parse_env_line("# SHEET_ROW_LIMIT=0"), None);
        assert_eq!(parse_env_line("NO_VALUE"), None);
        assert_eq!(parse_env_line("=orphan"), None);
        assert_eq!(parse_env_line(""), None);
    }

    #[test]
    fn blank_env_value_falls_back_to_file() {
        let vars = vars_from(&format!("{API_VARS}TRENDTUBE_HOST=\"0.0.0.0\"\n"));
        let config = build_service_config(
            &vars,
            |key| (key == "TRENDTUBE_HOST").then(|| "  ".to_string()),
            RuntimeOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn env_file_is_optional_and_last_assignment_wins() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_file(&dir.path().join("missing.env")).unwrap().is_empty());

        let vars = vars_from("COUNTRY_CODES=TH\n\n# note\nCOUNTRY_CODES=\"US,GB\"\n");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["COUNTRY_CODES"], "US,GB");
    }
}
