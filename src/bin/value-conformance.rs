//! Value codec conformance runner.
//!
//! Spawns a peer process, asks it for every case it knows for a codec, runs
//! each one and reports the verdicts on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! value-conformance --codec-id json -- ./json-peer --strict
//! value-conformance --codec-id json --case enum -- node peer.js
//! ```
//!
//! # Exit Codes
//!
//! - 0: every case passed
//! - 1: one or more cases failed
//! - 2: internal error (peer unreachable, framing failure, bad exit)

use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use value_conformance::driver::{run_all, CaseOutcome, ConformanceDriver};
use value_conformance::{PeerBuilder, Result};

#[derive(Parser, Debug)]
#[command(name = "value-conformance")]
#[command(about = "Run structured value codec conformance cases against a peer process")]
struct Args {
    /// Codec id to request cases for
    #[arg(long, default_value = "json")]
    codec_id: String,

    /// Only run cases whose key contains this string
    #[arg(long)]
    case: Option<String>,

    /// Tolerate a non-zero peer exit status
    #[arg(long)]
    allow_failure: bool,

    /// Peer program and its arguments
    #[arg(required = true, last = true)]
    peer: Vec<OsString>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(outcomes) => report(&outcomes),
        Err(e) => {
            tracing::error!(error = %e, "Conformance run aborted");
            ExitCode::from(2)
        }
    }
}

async fn run(args: &Args) -> Result<Vec<CaseOutcome>> {
    let Some((program, rest)) = args.peer.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "missing peer command").into());
    };
    let peer = PeerBuilder::new(program).args(rest).open()?;
    tracing::info!(pid = peer.pid(), codec_id = %args.codec_id, "Peer started");

    let driver = ConformanceDriver::spawn(peer);
    let outcomes = run_all(&driver, &args.codec_id, args.case.as_deref()).await;
    let exit = driver.shutdown(!args.allow_failure).await;

    let outcomes = outcomes?;
    exit?;
    Ok(outcomes)
}

fn report(outcomes: &[CaseOutcome]) -> ExitCode {
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.error {
            None => println!("PASS {}", outcome.key),
            Some(e) => {
                failed += 1;
                println!("FAIL {}: {}", outcome.key, e);
            }
        }
    }
    println!("\n{} passed, {} failed", outcomes.len() - failed, failed);

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
