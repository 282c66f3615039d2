//! Assistant content normalization.
//!
//! The service promises a string but does not always deliver one. Every
//! reply passes through [`normalize_content`] exactly once, on its way into
//! the store; nothing downstream inspects raw payloads.

use super::MessageContent;
use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

/// Content used when a reply has no text of its own.
pub const DEFAULT_REPLY: &str = "Here are some options:";

/// Content used when a non-text reply cannot be rendered at all.
pub const RENDER_FALLBACK: &str = "[Error displaying response]";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block pattern"));

/// Turn raw reply content into display-safe content.
///
/// Strings are cleaned with [`clean_text`]. Missing content becomes
/// [`DEFAULT_REPLY`]. Anything else is rendered as pretty JSON and tagged
/// [`MessageContent::Fallback`], or [`RENDER_FALLBACK`] if even that fails.
#[must_use]
pub fn normalize_content(raw: &Value) -> MessageContent {
    match raw {
        Value::String(text) => MessageContent::Text(clean_text(text)),
        Value::Null => MessageContent::Text(DEFAULT_REPLY.to_string()),
        other => match render_json(other) {
            Ok(rendered) => {
                warn!(kind = json_kind(other), "reply content is not text, rendering as JSON");
                MessageContent::Fallback(rendered)
            }
            Err(e) => {
                warn!(error = %e, "reply content could not be rendered");
                MessageContent::Fallback(RENDER_FALLBACK.to_string())
            }
        },
    }
}

/// Strip `<think>` blocks and surrounding whitespace.
///
/// Text that is empty afterwards becomes [`DEFAULT_REPLY`].
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(raw, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        DEFAULT_REPLY.to_string()
    } else {
        trimmed.to_string()
    }
}

fn render_json(value: &Value) -> Result<String> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| Error::payload_shape(e.to_string()))?;
    if rendered.trim().is_empty() {
        return Err(Error::payload_shape("empty rendering"));
    }
    Ok(rendered)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
