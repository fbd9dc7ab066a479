//! Google Sheets adapter (values API v4).
//!
//! Implements the `sheetwatch-core` SheetSource port over plain HTTPS. Token
//! acquisition is out of scope: callers pass an API key or a ready OAuth token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use sheetwatch_core::{
    config::{Config, SheetsAuth},
    domain::Row,
    errors::Error,
    source::SheetSource,
    Result,
};

#[derive(serde::Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Clone, Debug)]
pub struct SheetsClient {
    api_base: String,
    spreadsheet_id: String,
    worksheet: String,
    auth: SheetsAuth,
    http: reqwest::Client,
}

impl SheetsClient {
    pub fn new(
        api_base: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        auth: SheetsAuth,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::External(format!("sheets client build error: {e}")))?;
        Ok(Self {
            api_base: api_base.into(),
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            auth,
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.sheets_api_base.clone(),
            cfg.spreadsheet_id.clone(),
            cfg.worksheet_name.clone(),
            cfg.sheets_auth.clone(),
        )
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| Error::Config(format!("invalid SHEETS_API_BASE: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("SHEETS_API_BASE cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        if let SheetsAuth::ApiKey(key) = &self.auth {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Row>> {
        let url = self.values_url(range)?;
        let mut req = self.http.get(url);
        if let SheetsAuth::BearerToken(token) = &self.auth {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Source(format!("sheets request error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: ValueRange = resp
            .json()
            .await
            .map_err(|e| Error::Source(format!("sheets json error: {e}")))?;
        Ok(into_rows(body.values))
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn fetch_header_row(&self) -> Result<Vec<String>> {
        let range = format!("{}!1:1", quote_sheet_name(&self.worksheet));
        let rows = self.get_values(&range).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn fetch_all_rows(&self) -> Result<Vec<Row>> {
        self.get_values(&quote_sheet_name(&self.worksheet)).await
    }
}

/// A1-notation sheet reference: `'Name'`, with embedded quotes doubled.
fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn status_error(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Error::RateLimited {
            status: status.as_u16(),
        };
    }
    Error::Source(format!(
        "sheets request failed: {status} {}",
        body.chars().take(200).collect::<String>()
    ))
}

/// Stringify cells and pad every row to the widest one.
///
/// The API drops trailing empty cells; padding keeps column positions aligned
/// with the header row.
fn into_rows(values: Vec<Vec<serde_json::Value>>) -> Vec<Row> {
    let width = values.iter().map(Vec::len).max().unwrap_or(0);
    values
        .into_iter()
        .map(|row| {
            let mut cells: Row = row
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            cells.resize(width, String::new());
            cells
        })
        .collect()
}
