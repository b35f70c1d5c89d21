//! Row-set exporters: CSV files, local sheets, and a spreadsheet HTTP API.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hireflow_shared::{HireflowError, Result, RowSet};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::capability::{FlatFileExporter, TableExporter};
use crate::http::{check_status, read_json, send_error};

// ---------------------------------------------------------------------------
// CSV encoding
// ---------------------------------------------------------------------------

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_record(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Encode a row-set as RFC 4180 CSV (CRLF line endings, header first).
pub fn to_csv(rows: &RowSet) -> String {
    let mut out = String::new();
    out.push_str(&csv_record(&rows.headers));
    out.push_str("\r\n");
    for row in &rows.rows {
        out.push_str(&csv_record(row));
        out.push_str("\r\n");
    }
    out
}

async fn write_csv_file(path: &Path, rows: &RowSet) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HireflowError::io(parent, e))?;
    }
    tokio::fs::write(path, to_csv(rows))
        .await
        .map_err(|e| HireflowError::io(path, e))?;
    Ok(path.to_path_buf())
}

// ---------------------------------------------------------------------------
// CsvFileExporter
// ---------------------------------------------------------------------------

/// Writes CSV files, creating parent directories as needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvFileExporter;

#[async_trait]
impl FlatFileExporter for CsvFileExporter {
    #[instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
    async fn write_csv(&self, path: &Path, rows: &RowSet) -> Result<PathBuf> {
        let written = write_csv_file(path, rows).await?;
        debug!("wrote csv");
        Ok(written)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

// ---------------------------------------------------------------------------
// LocalSheetExporter
// ---------------------------------------------------------------------------

/// Stores "sheets" as CSV files in a directory and links to them by `file://` URL.
pub struct LocalSheetExporter {
    dir: PathBuf,
}

impl LocalSheetExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Turn a sheet title into a safe file stem.
fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() { "sheet".into() } else { stem.to_string() }
}

#[async_trait]
impl TableExporter for LocalSheetExporter {
    #[instrument(skip_all, fields(title = %title, rows = rows.len()))]
    async fn create_sheet(&self, title: &str, rows: &RowSet) -> Result<String> {
        let path = self.dir.join(format!("{}.csv", file_stem(title)));
        let written = write_csv_file(&path, rows).await?;
        let absolute = std::path::absolute(&written).map_err(|e| HireflowError::io(&written, e))?;
        let url = Url::from_file_path(&absolute).map_err(|()| {
            HireflowError::validation(format!("not a file URL: {}", absolute.display()))
        })?;
        Ok(url.to_string())
    }

    fn name(&self) -> &str {
        "local sheet"
    }
}

// ---------------------------------------------------------------------------
// SheetsApiExporter
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreatedSheet {
    #[serde(alias = "spreadsheetUrl", alias = "link")]
    url: String,
}

/// Creates spreadsheets through an HTTP API.
pub struct SheetsApiExporter {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl SheetsApiExporter {
    pub fn new(client: Client, endpoint: &str, token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| HireflowError::config(format!("invalid sheets_url {endpoint:?}: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl TableExporter for SheetsApiExporter {
    #[instrument(skip_all, fields(title = %title, rows = rows.len()))]
    async fn create_sheet(&self, title: &str, rows: &RowSet) -> Result<String> {
        let body = json!({
            "title": title,
            "headers": rows.headers,
            "rows": rows.rows,
        });
        let mut request = self.client.post(self.endpoint.as_str()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| send_error(self.name(), e))?;
        let response = check_status(self.name(), response)?;
        let created: CreatedSheet = read_json(self.name(), response).await?;
        Ok(created.url)
    }

    fn name(&self) -> &str {
        "sheets API"
    }
}
