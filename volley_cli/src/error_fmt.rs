//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use volley_core::error::{BuildError, VolleyError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTarget => {
                "What happened: No target instant was set for the wave.\nLikely causes: The scheduler was built without a target.\nHow to fix: Set schedule.target in the config or pass --target.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid schedule ({msg}).\nLikely causes: A zero or negative value in [schedule] or on the command line.\nHow to fix: Use positive values for requests, stagger_ms and poll_ms, then rerun."
            ),
        };
    }

    if let Some(ve) = err.downcast_ref::<VolleyError>() {
        return match ve {
            VolleyError::Session(msg) => format!(
                "What happened: Could not set up the HTTP session ({msg}).\nLikely causes: A header name or value in the template is not valid HTTP, or the URL is malformed.\nHow to fix: Check the headers template, then run `volley self-check`."
            ),
            VolleyError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `volley self-check`."
            ),
        };
    }

    // String-based heuristics for errors coming from config or template loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("no host header") {
        return "What happened: The headers template has no Host header.\nLikely causes: The capture was truncated or the HEADERS section is missing.\nHow to fix: Add a `Host:` line followed by the host name under HEADERS.".to_string();
    }

    if lower.contains("body template is not valid json") {
        return format!(
            "What happened: The body template could not be parsed.\nLikely causes: The file is not JSON (form data or a truncated copy).\nHow to fix: Save the request payload as JSON. Original: {msg}"
        );
    }

    if lower.contains("read headers template") || lower.contains("read body template") {
        return format!(
            "What happened: A request template file could not be read.\nLikely causes: Wrong path in [request]; relative paths resolve against the config file's directory.\nHow to fix: Fix request.headers / request.body. Original: {msg}"
        );
    }

    if lower.contains("read config") || lower.contains("parse config") {
        return format!(
            "What happened: The config file could not be loaded.\nLikely causes: Wrong --config path or a TOML syntax error.\nHow to fix: Check the path and syntax. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable reason tag for JSON error output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    use volley_core::error::{BuildError, VolleyError};
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidSchedule";
    }
    match err.downcast_ref::<VolleyError>() {
        Some(VolleyError::Session(_)) => "SessionSetup",
        Some(VolleyError::Config(_)) => "InvalidConfig",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
