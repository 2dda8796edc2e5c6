use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use firstream::audio::{DuplexStream, StreamEvent};
use firstream::cli::{ConfigArgs, log_level};
use firstream::{StreamOrchestrator, StreamSession, design_filter};

#[derive(Parser, Debug)]
#[command(name = "firstream")]
#[command(about = "Real-time oversampled FIR filtering between the default audio devices", long_about = None)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    /// Stop after this many seconds (default: run until the stream faults)
    #[arg(short = 'd', long)]
    duration: Option<f64>,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(args.verbose.max(1))),
    )
    .init();

    let config = args.config.load().context("Loading configuration")?;
    let (spec, outcome) = design_filter(&config).context("Designing filter")?;

    println!("=== firstream ===");
    println!(
        "Audio: {} Hz x{} = {} Hz, {} ch, block {} frames",
        config.audio.sample_rate,
        config.audio.upsample_factor,
        config.audio.upsampled_rate(),
        config.audio.channels,
        config.audio.block_size
    );
    println!(
        "Filter: {} {} taps, cutoff {}, transition {:.1} Hz",
        spec.family(),
        spec.num_taps(),
        config.filter.cutoff,
        spec.transition_hz()
    );
    match &outcome.fallback {
        Some(failure) => println!("Design: {} (fallback after: {})", outcome.method, failure),
        None => println!("Design: {}", outcome.method),
    }

    let session = StreamSession::new(&config, outcome.coefficients.clone())?;
    println!(
        "Latency: {:.1} frames filter delay + {} frames block",
        session.latency_frames(),
        config.audio.block_size
    );
    println!();

    let orchestrator = StreamOrchestrator::new(session, &config.stream);
    let stream = DuplexStream::open(&config, orchestrator).context("Opening audio devices")?;
    println!("Streaming...");

    let started = Instant::now();
    let deadline = args.duration.map(Duration::from_secs_f64);
    let poll = Duration::from_millis(200);

    loop {
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            break;
        }

        match stream.events().recv_timeout(poll) {
            Ok(StreamEvent::Faulted(fault)) => {
                eprintln!("Stream faulted: {}", fault);
                break;
            }
            Ok(StreamEvent::DeviceLost) => {
                log::warn!("Audio device lost; waiting for the stream to fault");
            }
            Ok(StreamEvent::Backend(message)) => {
                log::warn!("Backend error: {}", message);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                eprintln!("Audio stream closed");
                break;
            }
        }
    }

    let status = stream.close();
    println!(
        "Processed {} blocks ({} late, {} degraded); {} underruns, {} overflows",
        status.processed, status.late, status.degraded, status.underruns, status.overflows
    );

    Ok(())
}
