#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Latency-compensated wave dispatch (transport-agnostic).
//!
//! All network interaction goes through `volley_traits::Connector` and
//! `volley_traits::Session`; all time goes through `volley_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Calibration**: sequential probes averaged into a latency estimate (`calibrator`)
//! - **Dispatch**: staggered sends over one session with early abort (`dispatcher`)
//! - **Evaluation**: response-body success condition (`verdict`)
//! - **Scheduling**: adjusted start computation and poll-until-due (`scheduler`)
//!
//! Instants are kept as `DateTime<Utc>`; civil zones only appear when logging.

pub mod calibrator;
pub mod dispatcher;
pub mod error;
pub mod scheduler;
pub mod signal;
pub mod util;
pub mod verdict;

pub use calibrator::{DEFAULT_LATENCY_MS, LatencyCalibrator, LatencyEstimate};
pub use dispatcher::{ResponseOutcome, WaveDispatcher, WaveReport};
pub use scheduler::{ScheduleBuilder, ScheduleConfig, WaveScheduler, next_midnight};
pub use signal::AbortSignal;
pub use verdict::{Observed, SuccessCondition, Verdict};
pub use volley_traits::RequestDescriptor;
