use serde::de::DeserializeOwned;

use crate::error::GenerationError;

/// A natural-language instruction with `{{name}}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    source: &'static str,
}

impl PromptTemplate {
    #[must_use]
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Substitute every placeholder with its value from `vars`.
    ///
    /// Whitespace inside the braces is ignored. Values are inserted verbatim and
    /// never re-scanned.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::MissingVariable` for a placeholder with no value,
    /// or `GenerationError::InvalidInput` for an unclosed placeholder.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, GenerationError> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                GenerationError::InvalidInput(format!("unclosed placeholder in `{}`", self.name))
            })?;
            let key = after[..end].trim();
            let value = vars
                .iter()
                .find_map(|(name, value)| (*name == key).then_some(*value))
                .ok_or_else(|| GenerationError::MissingVariable(key.to_owned()))?;
            out.push_str(value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        Ok(out)
    }
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````) if present.
#[must_use]
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match body.find('\n') {
        Some(newline) => &body[newline + 1..],
        None => body,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model reply as JSON, tolerating code fences.
///
/// # Errors
///
/// Returns `GenerationError::EmptyResponse` for a blank reply and
/// `GenerationError::MalformedReply` when the body does not match `T`.
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, GenerationError> {
    let body = strip_code_fences(reply);
    if body.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(serde_json::from_str(body)?)
}
