//! Captured-request templates.
//!
//! The headers file is a browser/devtools capture laid out as:
//!
//! ```text
//! METHOD: POST
//! URL
//! https://api.example.com/api/apply?lang=en
//! HEADERS
//! Host:
//! api.example.com
//! Content-Type:
//! application/json
//! ```
//!
//! Inside `HEADERS`, a line ending with `:` names a header and the next
//! non-empty line is its value.
use std::path::Path;

use indexmap::IndexMap;
use volley_traits::RequestDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
    pub method: Option<String>,
    /// URL as written in the capture
    pub raw_url: Option<String>,
    pub headers: IndexMap<String, String>,
}

impl HeaderTemplate {
    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `https://{Host}{path}`, discarding the captured scheme and authority.
    pub fn url(&self) -> eyre::Result<String> {
        let host = self
            .header("Host")
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| eyre::eyre!("headers template has no Host header"))?;
        let raw = self
            .raw_url
            .as_deref()
            .ok_or_else(|| eyre::eyre!("headers template has no URL section"))?;
        Ok(format!("https://{}{}", host.trim(), strip_origin(raw)))
    }

    /// Headers to send: the capture minus `Content-Length`.
    pub fn send_headers(&self) -> IndexMap<String, String> {
        self.headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("Content-Length"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn strip_origin(url: &str) -> &str {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => rest.find('/').map_or("", |i| &rest[i..]),
        None => url,
    }
}

pub fn parse_headers(text: &str) -> eyre::Result<HeaderTemplate> {
    let mut method = None;
    let mut raw_url = None;
    let mut headers = IndexMap::new();
    let mut in_headers = false;
    let mut current: Option<String> = None;

    let mut lines = text.lines().map(str::trim);
    while let Some(line) = lines.next() {
        if let Some(m) = line.strip_prefix("METHOD:") {
            method = Some(m.trim().to_string());
        } else if line == "URL" {
            let url = lines
                .next()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| eyre::eyre!("headers template: URL marker without a value"))?;
            raw_url = Some(url.to_string());
        } else if line == "HEADERS" {
            in_headers = true;
        } else if in_headers {
            if let Some(name) = line.strip_suffix(':') {
                headers.insert(name.to_string(), String::new());
                current = Some(name.to_string());
            } else if !line.is_empty()
                && let Some(name) = current.take()
            {
                headers.insert(name, line.to_string());
            }
        }
    }

    Ok(HeaderTemplate {
        method,
        raw_url,
        headers,
    })
}

pub fn parse_body(text: &str) -> eyre::Result<serde_json::Value> {
    serde_json::from_str(text).map_err(|e| eyre::eyre!("body template is not valid JSON: {e}"))
}

/// Build the request sent by every probe and wave send.
pub fn load_descriptor(headers_path: &Path, body_path: &Path) -> eyre::Result<RequestDescriptor> {
    let headers_text = std::fs::read_to_string(headers_path)
        .map_err(|e| eyre::eyre!("read headers template {}: {e}", headers_path.display()))?;
    let body_text = std::fs::read_to_string(body_path)
        .map_err(|e| eyre::eyre!("read body template {}: {e}", body_path.display()))?;

    let template = parse_headers(&headers_text)?;
    if let Some(m) = template.method.as_deref()
        && !m.eq_ignore_ascii_case("POST")
    {
        tracing::warn!(method = m, "captured method is not POST; sending POST anyway");
    }
    let url = template.url()?;
    let body = parse_body(&body_text)?;
    tracing::debug!(%url, headers = template.headers.len(), "request template loaded");

    Ok(RequestDescriptor {
        url,
        headers: template.send_headers(),
        body,
    })
}
