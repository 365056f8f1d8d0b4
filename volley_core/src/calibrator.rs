//! Empirical round-trip calibration against the live endpoint.
//!
//! Probes are sent strictly one after another over a single session so each
//! sample reflects an independent round trip rather than contention between
//! probes. A sample runs until the response headers arrive when the transport
//! reports that, and until the full reply otherwise. Failed probes are dropped from the sample; when every probe fails
//! the estimate falls back to the configured default instead of failing.

use crate::error::{Report, Result, VolleyError};
use tracing::{error, info};
use volley_traits::{Clock, Connector, RequestDescriptor, Session};

/// Latency assumed before (or in the absence of) a successful calibration.
pub const DEFAULT_LATENCY_MS: f64 = 1200.0;

/// Scalar round-trip estimate in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyEstimate {
    pub ms: f64,
    /// Number of successful probes behind `ms`; 0 means the default is in use.
    pub samples: usize,
}

impl Default for LatencyEstimate {
    fn default() -> Self {
        Self::fallback(DEFAULT_LATENCY_MS)
    }
}

impl LatencyEstimate {
    pub fn fallback(default_ms: f64) -> Self {
        Self {
            ms: default_ms,
            samples: 0,
        }
    }

    /// Arithmetic mean of the successful samples, or `default_ms` when empty.
    pub fn from_samples(samples: &[f64], default_ms: f64) -> Self {
        if samples.is_empty() {
            return Self::fallback(default_ms);
        }
        let sum: f64 = samples.iter().sum();
        Self {
            ms: sum / samples.len() as f64,
            samples: samples.len(),
        }
    }
}

pub struct LatencyCalibrator<K, C> {
    connector: K,
    clock: C,
    default_ms: f64,
}

impl<K: Connector, C: Clock> LatencyCalibrator<K, C> {
    pub fn new(connector: K, clock: C) -> Self {
        Self {
            connector,
            clock,
            default_ms: DEFAULT_LATENCY_MS,
        }
    }

    /// Override the estimate used when no probe succeeds.
    pub fn with_default_ms(mut self, default_ms: f64) -> Self {
        self.default_ms = default_ms;
        self
    }

    /// Send `probes` sequential requests and average the successful round trips.
    ///
    /// Only a session setup failure is returned as an error.
    pub async fn measure(&self, request: &RequestDescriptor, probes: u32) -> Result<LatencyEstimate> {
        let session = self
            .connector
            .open(request)
            .map_err(|e| Report::new(VolleyError::Session(e.to_string())))?;

        let mut samples = Vec::with_capacity(probes as usize);
        for index in 0..probes {
            let start = self.clock.now();
            match session.send().await {
                Ok(reply) => {
                    // Time to headers when the transport has it; body download is not latency.
                    let elapsed = reply
                        .headers_after
                        .map_or_else(|| self.clock.ms_since(start), |d| d.as_secs_f64() * 1000.0);
                    info!(
                        index,
                        latency_ms = %format_args!("{elapsed:.2}"),
                        "latency measurement {index}"
                    );
                    samples.push(elapsed);
                }
                Err(e) => {
                    error!(index, error = %e, "latency measurement {index} failed");
                }
            }
        }

        let estimate = LatencyEstimate::from_samples(&samples, self.default_ms);
        info!(
            latency_ms = %format_args!("{:.2}", estimate.ms),
            samples = estimate.samples,
            probes,
            "latency calibrated"
        );
        Ok(estimate)
    }
}
