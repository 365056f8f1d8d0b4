//! Staggered wave dispatch with a response-driven early abort.
//!
//! A wave reuses one pooled session for every request: stagger intervals can
//! be shorter than a cold TCP/TLS setup. Each reply is inspected by the
//! configured [`SuccessCondition`]; the first reply showing that the server
//! moved past the success condition trips the [`AbortSignal`] and ends the
//! wave. Local transport failures never abort, the wave keeps trying.

use chrono::FixedOffset;
use tracing::{error, info};
use volley_traits::{Clock, Connector, RequestDescriptor, Session};

use crate::error::{Report, Result, VolleyError};
use crate::signal::AbortSignal;
use crate::util::{in_utc, in_zone, millis_to_delta};
use crate::verdict::{SuccessCondition, Verdict};

/// Label used for wave items in logs.
pub const WAVE_LABEL: &str = "Request";
/// Label used for the pre-flight connectivity request.
pub const PROBE_LABEL: &str = "Test Request";

/// Result of one send. `status`/`elapsed_ms` are `None` on transport failure,
/// in which case `body` holds the error text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseOutcome {
    pub status: Option<u16>,
    pub body: String,
    pub elapsed_ms: Option<f64>,
}

impl ResponseOutcome {
    /// True when the request reached the server and got a reply.
    #[inline]
    pub fn answered(&self) -> bool {
        self.status.is_some()
    }
}

/// Summary of a finished wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveReport {
    /// Requests actually sent.
    pub sent: u32,
    /// Whether the wave stopped on the abort signal.
    pub aborted: bool,
}

pub struct WaveDispatcher<K, C> {
    connector: K,
    clock: C,
    request: RequestDescriptor,
    success: SuccessCondition,
    zone: FixedOffset,
}

impl<K: Connector, C: Clock> WaveDispatcher<K, C> {
    /// `zone` is the target's civil zone, used to render estimated arrivals.
    pub fn new(
        connector: K,
        clock: C,
        request: RequestDescriptor,
        success: SuccessCondition,
        zone: FixedOffset,
    ) -> Self {
        Self {
            connector,
            clock,
            request,
            success,
            zone,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    fn open(&self) -> Result<K::Session> {
        self.connector
            .open(&self.request)
            .map_err(|e| Report::new(VolleyError::Session(e.to_string())))
    }

    /// Send one request over `session`, timing and logging it. Never fails.
    pub async fn send_one<S>(&self, session: &S, index: u32, label: &str) -> ResponseOutcome
    where
        S: Session + ?Sized,
    {
        let sent_at = self.clock.wall();
        let start = self.clock.now();
        match session.send().await {
            Ok(reply) => {
                let elapsed = self.clock.ms_since(start);
                let arrival = sent_at + millis_to_delta(elapsed);
                info!(
                    index,
                    status = reply.status,
                    sent_at = %in_utc(sent_at),
                    est_arrival = %in_zone(arrival, self.zone),
                    latency_ms = %format_args!("{elapsed:.2}"),
                    response = %reply.body,
                    "{label} {index}"
                );
                ResponseOutcome {
                    status: Some(reply.status),
                    body: reply.body,
                    elapsed_ms: Some(elapsed),
                }
            }
            Err(e) => {
                let text = e.to_string();
                error!(index, error = %text, "{label} {index} failed");
                ResponseOutcome {
                    status: None,
                    body: text,
                    elapsed_ms: None,
                }
            }
        }
    }

    /// Pre-flight connectivity check over a dedicated session.
    pub async fn probe(&self) -> Result<ResponseOutcome> {
        let session = self.open()?;
        let outcome = self.send_one(&session, 0, PROBE_LABEL).await;
        info!(
            status = ?outcome.status,
            latency_ms = ?outcome.elapsed_ms,
            "initial test request completed"
        );
        Ok(outcome)
    }

    /// Send up to `count` requests `stagger` apart, stopping early on `abort`.
    pub async fn send_wave(
        &self,
        count: u32,
        stagger: std::time::Duration,
        abort: &AbortSignal,
    ) -> Result<WaveReport> {
        let session = self.open()?;
        let mut report = WaveReport::default();

        for index in 0..count {
            if abort.is_set() {
                info!(index, "wave aborted due to unexpected response");
                report.aborted = true;
                break;
            }

            let outcome = self.send_one(&session, index, WAVE_LABEL).await;
            report.sent += 1;

            if outcome.answered() {
                match self.success.evaluate(&outcome.body) {
                    Verdict::Continue => {}
                    Verdict::Abort(seen) => {
                        info!(
                            index,
                            code = ?seen.code,
                            apply_result = ?seen.apply_result,
                            deadline = ?seen.deadline,
                            "aborting wave"
                        );
                        abort.trip();
                        report.aborted = true;
                        break;
                    }
                    Verdict::Malformed(e) => {
                        error!(index, error = %e, "invalid JSON response, continuing wave");
                    }
                }
            }

            if index + 1 < count {
                self.clock.sleep(stagger).await;
            }
        }

        info!(sent = report.sent, aborted = report.aborted, "wave finished");
        Ok(report)
    }
}
