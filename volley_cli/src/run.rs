//! Command flows: config and templates in, calibration, probe and the wave out.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use eyre::Result;
use serde_json::json;
use volley_config::{Config, load_descriptor, parse_target};
use volley_core::util::{in_local, in_utc, in_zone};
use volley_core::{
    LatencyCalibrator, LatencyEstimate, RequestDescriptor, ResponseOutcome, ScheduleConfig,
    SuccessCondition, WaveDispatcher, WaveReport, WaveScheduler, next_midnight, scheduler::log_plan,
};
use volley_http::HttpConnector;
use volley_traits::{Clock, Connector, SystemClock};

use crate::cli::{Commands, JSON_MODE, RunArgs};

pub async fn execute(cmd: Commands, cfg: &Config) -> Result<()> {
    match cmd {
        Commands::Run(args) => run_wave(cfg, &args).await,
        Commands::Calibrate { probes } => calibrate(cfg, probes).await,
        Commands::Probe => probe(cfg).await,
        Commands::SelfCheck(args) => self_check(cfg, &args),
    }
}

fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

fn connector(cfg: &Config) -> HttpConnector {
    HttpConnector::new(Duration::from_millis(cfg.request.timeout_ms))
}

fn success(cfg: &Config) -> SuccessCondition {
    SuccessCondition {
        code: cfg.success.code,
        apply_result: cfg.success.apply_result,
        deadline: cfg.success.deadline,
    }
}

fn descriptor(cfg: &Config) -> Result<RequestDescriptor> {
    load_descriptor(&cfg.request.headers, &cfg.request.body)
}

fn dispatcher(cfg: &Config, request: RequestDescriptor) -> Result<WaveDispatcher<HttpConnector, SystemClock>> {
    Ok(WaveDispatcher::new(
        connector(cfg),
        SystemClock::new(),
        request,
        success(cfg),
        cfg.schedule.zone()?,
    ))
}

/// CLI target, then config target; `None` leaves the next-midnight default.
fn explicit_target(cfg: &Config, target: Option<&str>) -> Result<Option<DateTime<FixedOffset>>> {
    let zone = cfg.schedule.zone()?;
    target
        .or(cfg.schedule.target.as_deref())
        .map(|raw| parse_target(raw, zone))
        .transpose()
}

/// CLI target, then config target, then the next midnight in the scheduling zone.
pub fn resolve_target(
    cfg: &Config,
    target: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<FixedOffset>> {
    match explicit_target(cfg, target)? {
        Some(t) => Ok(t),
        None => Ok(next_midnight(now, cfg.schedule.zone()?)),
    }
}

fn schedule(
    cfg: &Config,
    args: &RunArgs,
    target: DateTime<FixedOffset>,
    latency: LatencyEstimate,
) -> Result<ScheduleConfig> {
    let plan = ScheduleConfig::builder()
        .target(target)
        .latency(latency)
        .requests(args.requests.unwrap_or(cfg.schedule.requests))
        .stagger(Duration::from_millis(
            args.stagger_ms.unwrap_or(cfg.schedule.stagger_ms),
        ))
        .poll(Duration::from_millis(
            args.poll_ms.unwrap_or(cfg.schedule.poll_ms),
        ))
        .build()?;
    Ok(plan)
}

async fn run_wave(cfg: &Config, args: &RunArgs) -> Result<()> {
    let request = descriptor(cfg)?;
    let (plan, report) = arm_and_fire(cfg, args, request, connector(cfg), SystemClock::new()).await?;
    tracing::info!(sent = report.sent, aborted = report.aborted, "request wave finished");
    print_report(&plan, &report);
    Ok(())
}

/// Calibrate and probe concurrently, then fix the target and send one wave.
///
/// An explicit target is parsed up front; the midnight default is resolved
/// only after calibration so a launch just before midnight rolls over.
async fn arm_and_fire<K, C>(
    cfg: &Config,
    args: &RunArgs,
    request: RequestDescriptor,
    connector: K,
    clock: C,
) -> Result<(ScheduleConfig, WaveReport)>
where
    K: Connector + Clone,
    C: Clock + Clone,
{
    let zone = cfg.schedule.zone()?;
    let explicit = explicit_target(cfg, args.target.as_deref())?;

    let dispatcher = WaveDispatcher::new(
        connector.clone(),
        clock.clone(),
        request.clone(),
        success(cfg),
        zone,
    );
    let calibrator = LatencyCalibrator::new(connector, clock.clone())
        .with_default_ms(cfg.calibration.default_latency_ms);
    let probes = args.probes.unwrap_or(cfg.calibration.probes);

    let (latency, first) = tokio::try_join!(calibrator.measure(&request, probes), dispatcher.probe())?;
    if !first.answered() {
        tracing::warn!("initial test request got no reply; continuing with the wave");
    }

    let target = explicit.unwrap_or_else(|| next_midnight(clock.wall(), zone));
    tracing::info!(target = %target.to_rfc3339(), url = %request.url, "target time resolved");

    let plan = schedule(cfg, args, target, latency)?;
    let report = WaveScheduler::new(&dispatcher).run(&plan).await?;
    Ok((plan, report))
}

async fn calibrate(cfg: &Config, probes: Option<u32>) -> Result<()> {
    let request = descriptor(cfg)?;
    let probes = probes.unwrap_or(cfg.calibration.probes);
    let estimate = LatencyCalibrator::new(connector(cfg), SystemClock::new())
        .with_default_ms(cfg.calibration.default_latency_ms)
        .measure(&request, probes)
        .await?;

    if json_mode() {
        println!(
            "{}",
            json!({
                "latency_ms": estimate.ms,
                "samples": estimate.samples,
                "probes": probes,
                "fallback": estimate.samples == 0,
            })
        );
    } else if estimate.samples == 0 {
        println!(
            "no probe succeeded; using default latency {:.2} ms",
            estimate.ms
        );
    } else {
        println!(
            "latency {:.2} ms ({}/{} probes succeeded)",
            estimate.ms, estimate.samples, probes
        );
    }
    Ok(())
}

async fn probe(cfg: &Config) -> Result<()> {
    let outcome = dispatcher(cfg, descriptor(cfg)?)?.probe().await?;
    print_probe(&outcome);
    Ok(())
}

fn print_probe(outcome: &ResponseOutcome) {
    if json_mode() {
        println!(
            "{}",
            json!({
                "status": outcome.status,
                "latency_ms": outcome.elapsed_ms,
                "body": outcome.body,
            })
        );
        return;
    }
    match (outcome.status, outcome.elapsed_ms) {
        (Some(status), Some(ms)) => {
            println!("status {status} in {ms:.2} ms");
            println!("{}", outcome.body);
        }
        _ => println!("no reply: {}", outcome.body),
    }
}

/// Everything `run` does up to the wait, minus the network.
fn self_check(cfg: &Config, args: &RunArgs) -> Result<()> {
    let request = descriptor(cfg)?;
    connector(cfg)
        .open(&request)
        .map_err(|e| eyre::eyre!("request template rejected by the HTTP client: {e}"))?;

    let now = SystemClock::new().wall();
    let target = resolve_target(cfg, args.target.as_deref(), now)?;
    let latency = LatencyEstimate::fallback(cfg.calibration.default_latency_ms);
    let plan = schedule(cfg, args, target, latency)?;
    log_plan(&plan);

    let zone = *plan.target.offset();
    let target_utc = plan.target.with_timezone(&Utc);
    let start = plan.adjusted_start();
    if json_mode() {
        println!(
            "{}",
            json!({
                "url": request.url,
                "headers": request.headers.len(),
                "target": in_zone(target_utc, zone),
                "target_utc": in_utc(target_utc),
                "adjusted_start": in_zone(start, zone),
                "adjusted_start_utc": in_utc(start),
                "latency_ms": latency.ms,
                "requests": plan.count,
                "stagger_ms": plan.stagger.as_millis() as u64,
                "wave_duration_ms": plan.wave_duration_ms(),
            })
        );
    } else {
        println!("self-check OK");
        println!("url:            {}", request.url);
        println!("target:         {}", in_zone(target_utc, zone));
        println!("target (UTC):   {}", in_utc(target_utc));
        println!("target (local): {}", in_local(target_utc));
        println!("adjusted start: {}", in_zone(start, zone));
        println!(
            "wave:           {} requests, {} ms apart, {} ms total, assumed latency {:.2} ms",
            plan.count,
            plan.stagger.as_millis(),
            plan.wave_duration_ms(),
            latency.ms
        );
    }
    Ok(())
}

fn print_report(plan: &ScheduleConfig, report: &WaveReport) {
    if json_mode() {
        println!(
            "{}",
            json!({
                "sent": report.sent,
                "requested": plan.count,
                "aborted": report.aborted,
                "latency_ms": plan.latency.ms,
            })
        );
    } else if report.aborted {
        println!(
            "wave stopped after {} of {} requests: window closed",
            report.sent, plan.count
        );
    } else {
        println!("wave complete: {} requests sent", report.sent);
    }
}
