#![forbid(unsafe_code)]

//! Appending trending rows to a Google spreadsheet.
//!
//! The spreadsheet is looked up by exact name through Drive, and rows go to
//! its first worksheet with `valueInputOption=RAW`. Authentication uses the
//! service-account key file written at startup; the REST calls themselves go
//! through a [`SheetsTransport`].

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc};
use url::Url;

use crate::resources::decode;
use crate::trending::split_row;

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Turns formatted rows back into cell values, keeping at most `limit` rows.
/// A `limit` of zero keeps every row.
pub fn sheet_rows(lines: &[String], limit: usize) -> Vec<Vec<String>> {
    let take = if limit == 0 { lines.len() } else { limit };
    lines.iter().take(take).map(|line| split_row(line)).collect()
}

/// Authorized JSON calls against the Drive and Sheets REST APIs. Any
/// non-success status is an error carrying the status and response body.
pub trait SheetsTransport: Send + Sync {
    fn get(&self, url: &Url, token: &str) -> Result<Value>;
    fn post(&self, url: &Url, token: &str, body: &Value) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct UreqSheetsTransport {
    agent: ureq::Agent,
}

impl UreqSheetsTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqSheetsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetsTransport for UreqSheetsTransport {
    fn get(&self, url: &Url, token: &str) -> Result<Value> {
        let response = self
            .agent
            .request_url("GET", url)
            .set("Authorization", &bearer(token))
            .call();
        read_json(response, url)
    }

    fn post(&self, url: &Url, token: &str, body: &Value) -> Result<Value> {
        let response = self
            .agent
            .request_url("POST", url)
            .set("Authorization", &bearer(token))
            .send_json(body);
        read_json(response, url)
    }
}

/// Base URLs of the two REST APIs involved.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub drive_files: Url,
    pub sheets: Url,
}

impl Endpoints {
    pub fn google() -> Result<Self> {
        Ok(Self {
            drive_files: Url::parse(DRIVE_FILES_URL).context("parsing Drive endpoint")?,
            sheets: Url::parse(SHEETS_URL).context("parsing Sheets endpoint")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Blocking Drive/Sheets client working with an already issued token.
#[derive(Clone)]
pub struct SheetsClient {
    transport: Arc<dyn SheetsTransport>,
    endpoints: Endpoints,
}

impl SheetsClient {
    pub fn new(transport: Arc<dyn SheetsTransport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Id of the first non-trashed spreadsheet named exactly `name`.
    pub fn find_spreadsheet_id(&self, token: &str, name: &str) -> Result<String> {
        let mut url = self.endpoints.drive_files.clone();
        url.query_pairs_mut()
            .append_pair("q", &drive_query(name))
            .append_pair("fields", "files(id,name)");
        let list: FileList = decode(self.transport.get(&url, token)?, "Drive file list")?;
        list.files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| anyhow!("spreadsheet not found: {name}"))
    }

    pub fn first_sheet_title(&self, token: &str, spreadsheet_id: &str) -> Result<String> {
        let mut url = spreadsheet_url(&self.endpoints.sheets, spreadsheet_id, &[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        let meta: SpreadsheetMeta =
            decode(self.transport.get(&url, token)?, "spreadsheet metadata")?;
        meta.sheets
            .into_iter()
            .next()
            .map(|sheet| sheet.properties.title)
            .ok_or_else(|| anyhow!("spreadsheet {spreadsheet_id} has no worksheets"))
    }

    pub fn append_values(
        &self,
        token: &str,
        spreadsheet_id: &str,
        sheet_title: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        let range = format!("'{}':append", sheet_title.replace('\'', "''"));
        let mut url =
            spreadsheet_url(&self.endpoints.sheets, spreadsheet_id, &["values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.transport.post(&url, token, &append_body(rows))?;
        Ok(())
    }

    /// Looks the spreadsheet up by name and appends `rows` to its first
    /// worksheet.
    pub fn append_to_first_sheet(
        &self,
        token: &str,
        name: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        let spreadsheet_id = self.find_spreadsheet_id(token, name)?;
        let title = self.first_sheet_title(token, &spreadsheet_id)?;
        self.append_values(token, &spreadsheet_id, &title, rows)
    }
}

/// A named spreadsheet reachable with the service account at
/// `credentials_path`.
#[derive(Clone)]
pub struct Spreadsheet {
    name: String,
    credentials_path: PathBuf,
    client: SheetsClient,
}

impl Spreadsheet {
    pub fn new(name: impl Into<String>, credentials_path: impl Into<PathBuf>) -> Result<Self> {
        let client = SheetsClient::new(Arc::new(UreqSheetsTransport::new()), Endpoints::google()?);
        Ok(Self::with_client(name, credentials_path, client))
    }

    pub fn with_client(
        name: impl Into<String>,
        credentials_path: impl Into<PathBuf>,
        client: SheetsClient,
    ) -> Self {
        Self {
            name: name.into(),
            credentials_path: credentials_path.into(),
            client,
        }
    }

    /// Appends `rows` below the existing data of the first worksheet.
    pub async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<()> {
        if rows.is_empty() {
            tracing::debug!(spreadsheet = %self.name, "no rows to append");
            return Ok(());
        }
        let token = self.access_token().await?;
        self.append_rows_with_token(token, rows).await
    }

    /// Same as [`Spreadsheet::append_rows`] with a token obtained elsewhere.
    pub async fn append_rows_with_token(
        &self,
        token: String,
        rows: Vec<Vec<String>>,
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let client = self.client.clone();
        let name = self.name.clone();
        let count = rows.len();
        tokio::task::spawn_blocking(move || client.append_to_first_sheet(&token, &name, rows))
            .await
            .context("spreadsheet task panicked")??;

        tracing::info!(spreadsheet = %self.name, rows = count, "appended rows to spreadsheet");
        Ok(())
    }

    async fn access_token(&self) -> Result<String> {
        let key = yup_oauth2::read_service_account_key(&self.credentials_path)
            .await
            .with_context(|| {
                format!(
                    "reading service account key {}",
                    self.credentials_path.display()
                )
            })?;
        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .context("building service account authenticator")?;
        let token = auth
            .token(&SCOPES)
            .await
            .context("requesting access token")?;
        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("token response carried no access token"))
    }
}

fn drive_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{SPREADSHEET_MIME_TYPE}' and trashed = false")
}

fn spreadsheet_url(base: &Url, spreadsheet_id: &str, extra: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("Sheets endpoint cannot carry a path"))?
        .pop_if_empty()
        .push(spreadsheet_id)
        .extend(extra);
    Ok(url)
}

fn append_body(rows: Vec<Vec<String>>) -> Value {
    json!({ "majorDimension": "ROWS", "values": rows })
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn read_json(response: Result<ureq::Response, ureq::Error>, url: &Url) -> Result<Value> {
    match response {
        Ok(response) => response
            .into_json::<Value>()
            .with_context(|| format!("decoding response from {url}")),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            bail!("{url}: HTTP {status}: {body}")
        }
        Err(err) => Err(err).with_context(|| format!("requesting {url}")),
    }
}
