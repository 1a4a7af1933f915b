use crate::error::{EiaError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One untyped record, column name to JSON scalar.
pub type Row = Map<String, Value>;

/// Rows of one chunk, in response order.
pub type RawRowSet = Vec<Row>;

/// Rows of one response plus the paging metadata the API reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiPage {
    pub rows: Vec<Row>,
    /// Rows matching the query server-side, when reported.
    pub total: Option<usize>,
    pub warnings: Vec<String>,
}

impl ApiPage {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, ..Default::default() }
    }

    /// True when the server holds more rows than it returned.
    pub fn is_truncated(&self) -> bool {
        self.total.is_some_and(|t| t > self.rows.len())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<ResponseBody>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    total: Option<Value>,
    data: Vec<Row>,
    #[serde(default)]
    warnings: Vec<ApiWarning>,
}

#[derive(Debug, Deserialize)]
struct ApiWarning {
    warning: Option<String>,
    description: Option<String>,
}

/// Decode a `{"response": {"data": [...]}}` body.
pub fn parse_page(url: &str, body: &[u8]) -> Result<ApiPage> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| EiaError::MalformedResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    into_page(url, envelope)
}

fn into_page(url: &str, envelope: Envelope) -> Result<ApiPage> {
    let body = match (envelope.response, envelope.error) {
        (Some(body), _) => body,
        (None, Some(error)) => {
            return Err(EiaError::MalformedResponse {
                url: url.to_string(),
                reason: format!("api error: {error}"),
            })
        }
        (None, None) => {
            return Err(EiaError::MalformedResponse {
                url: url.to_string(),
                reason: "missing 'response' object".into(),
            })
        }
    };

    let total = match body.total {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    let warnings = body
        .warnings
        .into_iter()
        .map(|w| match (w.warning, w.description) {
            (Some(w), Some(d)) => format!("{w}: {d}"),
            (Some(w), None) => w,
            (None, Some(d)) => d,
            (None, None) => "unspecified warning".into(),
        })
        .collect();

    Ok(ApiPage { rows: body.data, total, warnings })
}

/// Load a saved API response, e.g. a recorded fixture.
pub fn load_page_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<ApiPage> {
    use anyhow::Context;

    let file = File::open(&path)
        .with_context(|| format!("Failed to open file: {}", path.as_ref().display()))?;
    let reader = BufReader::new(file);
    let envelope: Envelope = serde_json::from_reader(reader)
        .with_context(|| {
            format!("Failed to deserialize JSON in file: {}", path.as_ref().display())
        })?;
    let page = into_page(&path.as_ref().display().to_string(), envelope)?;
    Ok(page)
}

/// The "GET a URL, get back rows" capability the fetch engine runs on.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, api_key: &str) -> Result<ApiPage>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str, api_key: &str) -> Result<ApiPage> {
        (**self).get(url, api_key)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, api_key: &str) -> Result<ApiPage> {
        (**self).get(url, api_key)
    }
}

/// Blocking reqwest transport; the key rides along as `api_key=`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EiaError::TransportFailure {
                url: String::new(),
                status: None,
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, api_key: &str) -> Result<ApiPage> {
        // `without_url` keeps the key out of error messages.
        let failure = |e: reqwest::Error| EiaError::TransportFailure {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            reason: e.without_url().to_string(),
        };

        let response = self
            .client
            .get(url)
            .query(&[("api_key", api_key)])
            .send()
            .map_err(failure)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(EiaError::TransportFailure {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}: {snippet}"),
            });
        }

        let bytes = response.bytes().map_err(failure)?;
        parse_page(url, &bytes)
    }
}
