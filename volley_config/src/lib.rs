#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and request-template loading for volley.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `template` turns a captured headers file plus a JSON body file into the
//!   `RequestDescriptor` sent by calibration and dispatch.
pub mod template;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub use template::{HeaderTemplate, load_descriptor, parse_body, parse_headers};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RequestCfg {
    /// Captured headers file (METHOD / URL / HEADERS sections)
    pub headers: PathBuf,
    /// JSON body file
    pub body: PathBuf,
    /// Per-request timeout for probes and wave sends
    pub timeout_ms: u64,
}

impl Default for RequestCfg {
    fn default() -> Self {
        Self {
            headers: PathBuf::from("headers.txt"),
            body: PathBuf::from("body.json"),
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Target instant. RFC 3339, or naive local time in `utc_offset`.
    /// Absent means the next midnight in `utc_offset`.
    pub target: Option<String>,
    /// Scheduling civil zone, e.g. "+08:00"
    pub utc_offset: String,
    pub requests: u32,
    pub stagger_ms: u64,
    /// Wall-clock re-check interval while waiting for the adjusted start
    pub poll_ms: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            target: None,
            utc_offset: "+08:00".to_string(),
            requests: 100,
            stagger_ms: 15,
            poll_ms: 5,
        }
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl Schedule {
    pub fn zone(&self) -> eyre::Result<FixedOffset> {
        self.utc_offset
            .parse::<FixedOffset>()
            .map_err(|e| eyre::eyre!("schedule.utc_offset {:?} is invalid: {e}", self.utc_offset))
    }

    /// Resolve the configured target; naive times are read in the scheduling zone.
    pub fn target_instant(&self) -> eyre::Result<Option<DateTime<FixedOffset>>> {
        let Some(raw) = self.target.as_deref() else {
            return Ok(None);
        };
        parse_target(raw, self.zone()?).map(Some)
    }
}

/// Parse an RFC 3339 instant, or a naive date-time interpreted in `zone`.
pub fn parse_target(raw: &str, zone: FixedOffset) -> eyre::Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t);
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return zone
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| eyre::eyre!("target {raw:?} is ambiguous in {zone}"));
        }
    }
    eyre::bail!("target {raw:?} is not RFC 3339 or YYYY-MM-DDTHH:MM:SS")
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Sequential latency probes sent at startup (0 keeps the default latency)
    pub probes: u32,
    /// Latency assumed when no probe succeeds
    pub default_latency_ms: f64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            probes: 5,
            default_latency_ms: 1200.0,
        }
    }
}

/// Response shape meaning the window is still open; anything else aborts.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SuccessCfg {
    pub code: i64,
    pub apply_result: i64,
    /// Epoch seconds
    pub deadline: i64,
}

impl Default for SuccessCfg {
    fn default() -> Self {
        Self {
            code: 0,
            apply_result: 3,
            deadline: 1_745_251_200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // persistent log sink
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            file: Some("request_log.txt".to_string()),
            level: None,
            rotation: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub request: RequestCfg,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub success: SuccessCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and path-resolve a config file. Validation is left to the caller.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    let mut cfg =
        load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    if let Some(dir) = path.parent() {
        cfg.resolve_paths(dir);
    }
    Ok(cfg)
}

impl Config {
    /// Make relative template paths relative to `base` (the config's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.request.headers.is_relative() {
            self.request.headers = base.join(&self.request.headers);
        }
        if self.request.body.is_relative() {
            self.request.body = base.join(&self.request.body);
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Request
        if self.request.timeout_ms == 0 {
            eyre::bail!("request.timeout_ms must be >= 1");
        }
        if self.request.timeout_ms > 10 * 60 * 1000 {
            eyre::bail!("request.timeout_ms is unreasonably large (>10min)");
        }

        // Schedule
        if self.schedule.requests == 0 {
            eyre::bail!("schedule.requests must be >= 1");
        }
        if self.schedule.stagger_ms == 0 {
            eyre::bail!("schedule.stagger_ms must be >= 1");
        }
        if self.schedule.stagger_ms > 60_000 {
            eyre::bail!("schedule.stagger_ms must be <= 60000");
        }
        if self.schedule.poll_ms == 0 {
            eyre::bail!("schedule.poll_ms must be >= 1");
        }
        if self.schedule.poll_ms > 1000 {
            eyre::bail!("schedule.poll_ms is unreasonably large (>1s)");
        }
        self.schedule.zone()?;
        self.schedule.target_instant()?;

        // Calibration
        if !self.calibration.default_latency_ms.is_finite()
            || self.calibration.default_latency_ms < 0.0
        {
            eyre::bail!("calibration.default_latency_ms must be a finite value >= 0");
        }
        if self.calibration.default_latency_ms > 60_000.0 {
            eyre::bail!("calibration.default_latency_ms must be <= 60000");
        }
        if self.calibration.probes > 1000 {
            eyre::bail!("calibration.probes is unreasonably large (>1000)");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
