//! Cached request records as the proxy writes them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{MuninnError, Result};

/// Hash fields of a cache record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    RequestMethod,
    RequestUrl,
    RequestHeaders,
    Response,
    ContentType,
    RequestCount,
    LastUsed,
    Purpose,
}

impl RecordField {
    /// Field name in the store hash.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordField::RequestMethod => "request_method",
            RecordField::RequestUrl => "request_url",
            RecordField::RequestHeaders => "request_headers",
            RecordField::Response => "response",
            RecordField::ContentType => "content_type",
            RecordField::RequestCount => "request_count",
            RecordField::LastUsed => "last_used",
            RecordField::Purpose => "purpose",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method of the cached request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestMethod {
    Get,
    Post,
    /// Any other verb, kept verbatim.
    Other(String),
}

impl RequestMethod {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "GET" => RequestMethod::Get,
            "POST" => RequestMethod::Post,
            other => RequestMethod::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Other(verb) => verb,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Curation mark the proxy consults when serving a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// Never curated. The proxy writes `empty` on first store.
    #[default]
    Unset,
    Keep,
    Refresh,
}

impl Purpose {
    /// Unknown values (including the proxy's `empty`) read as [`Purpose::Unset`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            "keep" => Purpose::Keep,
            "refresh" => Purpose::Refresh,
            _ => Purpose::Unset,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Unset => "empty",
            Purpose::Keep => "keep",
            Purpose::Refresh => "refresh",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cached request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Store key, unique within the `proxy:*` namespace.
    pub key: String,
    pub method: RequestMethod,
    pub url: String,
    /// Request headers as JSON text; opaque to curation.
    pub headers: String,
    /// Raw body bytes as the proxy stored them; not necessarily text.
    pub response: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub request_count: u64,
    /// Unix timestamp (seconds, fractional) of the last observed access.
    pub last_used: f64,
    pub purpose: Purpose,
}

impl CacheRecord {
    /// Build a record from its raw store hash.
    ///
    /// `request_method` and `request_url` are required and, like the numeric
    /// fields, must be valid UTF-8. Numeric fields default to zero when
    /// absent but must parse when present. The response is kept as bytes.
    pub fn from_fields<V: AsRef<[u8]>>(
        key: impl Into<String>,
        fields: &HashMap<String, V>,
    ) -> Result<Self> {
        let key = key.into();
        let text = |field| text_field(&key, fields, field);
        let lossy = |field: RecordField| {
            fields
                .get(field.as_str())
                .map(|raw| String::from_utf8_lossy(raw.as_ref()).into_owned())
        };
        let required = |field: RecordField| -> Result<String> {
            text(field)?
                .map(str::to_string)
                .ok_or_else(|| MuninnError::MalformedRecord {
                    key: key.clone(),
                    reason: format!("missing field '{field}'"),
                })
        };

        let method = RequestMethod::parse(&required(RecordField::RequestMethod)?);
        let url = required(RecordField::RequestUrl)?;

        let request_count = match text(RecordField::RequestCount)? {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| MuninnError::MalformedRecord {
                    key: key.clone(),
                    reason: format!("request_count '{raw}': {e}"),
                })?,
            None => 0,
        };

        let last_used = match text(RecordField::LastUsed)? {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|ts| ts.is_finite())
                .ok_or_else(|| MuninnError::MalformedRecord {
                    key: key.clone(),
                    reason: format!("last_used '{raw}' is not a timestamp"),
                })?,
            None => 0.0,
        };

        let headers = lossy(RecordField::RequestHeaders).unwrap_or_default();
        let content_type = lossy(RecordField::ContentType);
        let purpose = lossy(RecordField::Purpose)
            .map(|raw| Purpose::parse(&raw))
            .unwrap_or_default();
        let response = fields
            .get(RecordField::Response.as_str())
            .map(|raw| raw.as_ref().to_vec());

        Ok(Self {
            method,
            url,
            headers,
            response,
            content_type,
            request_count,
            last_used,
            purpose,
            key,
        })
    }

    /// Response payload size in bytes (0 when absent).
    pub fn response_size(&self) -> usize {
        self.response.as_ref().map_or(0, Vec::len)
    }

    /// Response body as text, invalid UTF-8 replaced.
    pub fn response_text(&self) -> Option<Cow<'_, str>> {
        self.response.as_deref().map(String::from_utf8_lossy)
    }

    /// Seconds since the last observed access.
    pub fn idle_secs(&self, now: f64) -> f64 {
        now - self.last_used
    }

    /// A record seen exactly once and idle for longer than `threshold`.
    pub fn is_stale_one_off(&self, now: f64, threshold: Duration) -> bool {
        self.request_count == 1 && self.idle_secs(now) > threshold.as_secs_f64()
    }

    /// Case-insensitive URL comparison used for related-record lookup.
    pub fn url_matches(&self, url: &str) -> bool {
        self.url.to_lowercase() == url.to_lowercase()
    }
}

/// A field that must be text; `None` when absent.
fn text_field<'a, V: AsRef<[u8]>>(
    key: &str,
    fields: &'a HashMap<String, V>,
    field: RecordField,
) -> Result<Option<&'a str>> {
    fields
        .get(field.as_str())
        .map(|raw| {
            std::str::from_utf8(raw.as_ref()).map_err(|e| MuninnError::MalformedRecord {
                key: key.to_string(),
                reason: format!("field '{field}' is not valid UTF-8: {e}"),
            })
        })
        .transpose()
}
