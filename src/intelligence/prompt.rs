//! Prompt construction and reply parsing for chat-model intelligence.

use crate::types::{CacheRecord, RetentionAction};
use crate::{MuninnError, Result};

pub(crate) const RETENTION_SYSTEM_PROMPT: &str = "You are an intelligent cache management assistant. \
Analyze the following request data and determine the optimal caching strategy: \
1. 'delete' - if the content is outdated or irrelevant \
2. 'refresh' - if the content should be refreshed soon \
3. 'keep' - if the content is still valid and useful \
Consider factors like request frequency, content type, and response size.";

pub(crate) const EXPIRATION_SYSTEM_PROMPT: &str = "You are a cache optimization expert. \
Predict the optimal Time-to-Live (TTL) in seconds for this request. \
Consider factors like content volatility, request frequency, and response size. \
Return only a number between 60 and 86400 (1 minute to 24 hours).";

/// User turn for retention classification.
pub(crate) fn retention_prompt(record: &CacheRecord) -> String {
    let last_used = if record.last_used > 0.0 {
        record.last_used.to_string()
    } else {
        "unknown".to_string()
    };
    format!(
        "Request Method: {}\nRequest URL: {}\nRequest Headers: {}\nResponse Size: {} bytes\nRequest Count: {}\nLast Used: {}",
        record.method,
        record.url,
        record.headers,
        record.response_size(),
        record.request_count,
        last_used,
    )
}

/// User turn for expiration prediction.
pub(crate) fn expiration_prompt(record: &CacheRecord) -> String {
    format!(
        "URL: {}\nMethod: {}\nResponse Size: {} bytes\nRequest Count: {}\nContent Type: {}",
        record.url,
        record.method,
        record.response_size(),
        record.request_count,
        record.content_type.as_deref().unwrap_or("unknown"),
    )
}

/// First action word found in the reply; anything else means keep.
pub fn parse_retention(reply: &str) -> RetentionAction {
    let reply = reply.to_lowercase();
    if reply.contains("delete") {
        RetentionAction::Delete
    } else if reply.contains("refresh") {
        RetentionAction::Refresh
    } else {
        RetentionAction::Keep
    }
}

/// First run of digits in the reply, unclamped. Signs are not part of the
/// number, so "-3600" reads as 3600; values beyond `i64` saturate.
pub fn parse_ttl(reply: &str) -> Result<i64> {
    let bytes = reply.as_bytes();
    let start = bytes
        .iter()
        .position(u8::is_ascii_digit)
        .ok_or_else(|| MuninnError::UnparseableResponse(format!("no number in '{reply}'")))?;
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |offset| start + offset);

    Ok(reply[start..end].parse::<i64>().unwrap_or(i64::MAX))
}

/// Guard-model verdict: `unsafe ...` or an explicit refusal is unsafe.
pub fn parse_safety(reply: &str) -> bool {
    let reply = reply.trim().to_lowercase();
    !(reply.starts_with("unsafe") || reply.contains("not allowed"))
}
