use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use firstream::audio::WavFileSource;
use firstream::cli::{ConfigArgs, log_level};
use firstream::processing::{StatsSummary, StreamCounters};
use firstream::{StreamOrchestrator, StreamSession, design_filter, save_wav};

#[derive(Parser, Debug)]
#[command(name = "filter_wav")]
#[command(about = "Run a WAV file through the streaming FIR pipeline", long_about = None)]
struct Args {
    /// Input WAV file
    input: PathBuf,

    /// Output WAV file (32-bit float)
    output: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Report format: text, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
struct FilterReport {
    input: String,
    output: String,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    family: String,
    cutoff: String,
    num_taps: usize,
    method: String,
    fallback: Option<String>,
    block_size: usize,
    upsample_factor: usize,
    latency_frames: f64,
    /// Microseconds per block
    block_time_us: Option<StatsSummary>,
    /// Block budget in microseconds
    budget_us: f64,
    realtime_factor: f64,
    counters: StreamCounters,
    size_corrections: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(args.verbose)),
    )
    .init();

    let source = WavFileSource::open(&args.input)
        .with_context(|| format!("Reading {}", args.input.display()))?;

    let mut config = args.config.load().context("Loading configuration")?;
    if config.audio.sample_rate != source.sample_rate() || config.audio.channels != source.channels()
    {
        log::info!(
            "Using the file's format: {} Hz, {} ch",
            source.sample_rate(),
            source.channels()
        );
    }
    config.audio.sample_rate = source.sample_rate();
    config.audio.channels = source.channels();

    let (spec, outcome) = design_filter(&config).context("Designing filter")?;
    let session = StreamSession::new(&config, outcome.coefficients.clone())?;
    let latency_frames = session.latency_frames();
    let mut orchestrator = StreamOrchestrator::new(session, &config.stream);
    // Offline runs report timing against the budget but never degrade on it
    let budget = orchestrator.budget();
    orchestrator.set_budget(Duration::MAX);

    orchestrator.start()?;
    let started = Instant::now();
    let filtered = orchestrator.process_signal(source.samples())?;
    let elapsed = started.elapsed();
    orchestrator.stop()?;

    save_wav(&args.output, &filtered, source.sample_rate(), source.channels())
        .with_context(|| format!("Writing {}", args.output.display()))?;

    let audio_seconds = source.frames() as f64 / source.sample_rate() as f64;
    let report = FilterReport {
        input: args.input.display().to_string(),
        output: args.output.display().to_string(),
        sample_rate: source.sample_rate(),
        channels: source.channels(),
        frames: source.frames(),
        family: spec.family().to_string(),
        cutoff: config.filter.cutoff.to_string(),
        num_taps: spec.num_taps(),
        method: outcome.method.to_string(),
        fallback: outcome.fallback.as_ref().map(|f| f.to_string()),
        block_size: config.audio.block_size,
        upsample_factor: config.audio.upsample_factor,
        latency_frames,
        block_time_us: orchestrator.block_timing(),
        budget_us: budget.as_secs_f64() * 1e6,
        realtime_factor: audio_seconds / elapsed.as_secs_f64().max(f64::EPSILON),
        counters: orchestrator.counters(),
        size_corrections: orchestrator.session().size_corrections(),
    };

    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => print_json(&report)?,
    }

    Ok(())
}

fn print_text(report: &FilterReport) {
    println!("{} -> {}", report.input, report.output);
    println!(
        "  {} frames, {} ch, {} Hz",
        report.frames, report.channels, report.sample_rate
    );
    println!(
        "  {} {} taps at {}, {}{}",
        report.family,
        report.num_taps,
        report.cutoff,
        report.method,
        report
            .fallback
            .as_ref()
            .map(|f| format!(" (fallback: {})", f))
            .unwrap_or_default()
    );
    println!(
        "  block {} x{}, latency {:.1} frames",
        report.block_size, report.upsample_factor, report.latency_frames
    );

    match &report.block_time_us {
        Some(t) => println!(
            "  block time {:.1} us mean, {:.1} std, {:.1}..{:.1} (budget {:.1} us)",
            t.mean, t.std_dev, t.min, t.max, report.budget_us
        ),
        None => println!("  no blocks processed"),
    }
    println!("  {:.1}x real time", report.realtime_factor);

    let c = &report.counters;
    println!(
        "  {} blocks, {} degraded, {} size corrections",
        c.processed_blocks, c.degraded_blocks, report.size_corrections
    );
}

fn print_json(report: &FilterReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}
