//! tracelane-probe: run a batch of simulated paced requests through an executor
//! and print the resulting per-lane telemetry as JSON.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracelane::{ExecuteError, Executor, ExecutorConfig, SlotRecord};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, PartialEq)]
struct ProbeArgs {
    requests: usize,
    lanes: Option<usize>,
    /// Every n-th request fails. 0 disables failures.
    fail_every: usize,
    delay: Duration,
}

impl Default for ProbeArgs {
    fn default() -> Self {
        Self {
            requests: 50,
            lanes: None,
            fail_every: 0,
            delay: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("simulated failure for request {0}")]
struct SimulatedFailure(usize);

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let probe = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!();
            eprintln!(
                "Usage: tracelane-probe [--requests <n>] [--lanes <n>] [--fail-every <n>] [--delay-ms <ms>]"
            );
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --requests <n>     Requests to send [default: 50]");
            eprintln!("  --lanes <n>        Concurrent lanes [default: $TRACELANE_MAX_CONCURRENT or 10]");
            eprintln!("  --fail-every <n>   Fail every n-th request, 0 for none [default: 0]");
            eprintln!("  --delay-ms <ms>    Simulated request latency [default: 20]");
            process::exit(2);
        }
    };

    init_tracing();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(probe)) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<ProbeArgs, String> {
    let mut probe = ProbeArgs::default();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--requests" | "--lanes" | "--fail-every" | "--delay-ms" => {
                i += 1;
                let raw = args
                    .get(i)
                    .ok_or_else(|| format!("{flag} requires a value"))?;
                let value: usize = raw
                    .parse()
                    .map_err(|_| format!("{flag} expects a non-negative integer, got '{raw}'"))?;
                match flag {
                    "--requests" => probe.requests = value,
                    "--lanes" => probe.lanes = Some(value),
                    "--fail-every" => probe.fail_every = value,
                    _ => probe.delay = Duration::from_millis(value as u64),
                }
            }
            "--help" | "-h" => return Err("".to_string()),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(probe)
}

/// Initialize tracing with TRACELANE_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("TRACELANE_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("tracelane={level},tracelane_probe={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn should_fail(request: usize, fail_every: usize) -> bool {
    fail_every != 0 && (request + 1) % fail_every == 0
}

async fn send(
    request: usize,
    record: SlotRecord,
    probe: &ProbeArgs,
) -> Result<(), SimulatedFailure> {
    debug!(request, lane = %record.slot_index(), dispatched = record.dispatched, "Sending");
    tokio::time::sleep(probe.delay).await;
    if should_fail(request, probe.fail_every) {
        return Err(SimulatedFailure(request));
    }
    Ok(())
}

async fn run(probe: ProbeArgs) -> anyhow::Result<()> {
    let config = match probe.lanes {
        Some(lanes) => ExecutorConfig::new(lanes),
        None => ExecutorConfig::from_env(),
    };
    if config.max_concurrent == 0 {
        anyhow::bail!("at least one lane is required");
    }

    let executor = Arc::new(Executor::from_config(&config));
    let probe = Arc::new(probe);
    info!(
        lanes = config.max_concurrent,
        requests = probe.requests,
        "Starting probe"
    );

    let tasks = (0..probe.requests).map(|request| {
        let executor = Arc::clone(&executor);
        let probe = Arc::clone(&probe);
        tokio::spawn(async move {
            executor
                .execute(|record| async move { send(request, record, &probe).await })
                .await
        })
    });

    let mut failed = 0usize;
    for outcome in join_all(tasks).await {
        match outcome? {
            Ok(()) => {}
            Err(ExecuteError::OperationFailed(e)) => {
                failed += 1;
                debug!(error = %e, "Request failed");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let snapshot = executor.snapshot();
    if failed > 0 {
        warn!(failed, "Some requests failed");
    }
    info!(
        dispatched = snapshot.total_dispatched(),
        succeeded = snapshot.total_succeeded(),
        "Probe complete"
    );

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
