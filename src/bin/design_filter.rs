use clap::Parser;
use serde::Serialize;

use anyhow::Context;
use firstream::cli::{ConfigArgs, log_level};
use firstream::design_filter;
use firstream::signal_processing::response::{BandSummary, ResponsePoint};
use firstream::signal_processing::{DesignOutcome, FilterSpec, FrequencyResponse};

#[derive(Parser, Debug)]
#[command(name = "design_filter")]
#[command(about = "Design the configured FIR filter and summarise its response", long_about = None)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    /// Output format: text, csv, json
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Frequency grid points from 0 Hz to Nyquist
    #[arg(short = 'p', long, default_value = "1024")]
    points: usize,

    /// Include the tap values
    #[arg(long)]
    taps: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

#[derive(Debug, Serialize)]
struct DesignReport {
    family: String,
    method: String,
    fallback: Option<String>,
    sample_rate: f64,
    num_taps: usize,
    cutoffs: Vec<f64>,
    transition_hz: f64,
    window: String,
    edges: Vec<f64>,
    gains: Vec<f64>,
    weights: Vec<f64>,
    dc_gain: f64,
    bands: Vec<BandSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    taps: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response: Vec<ResponsePoint>,
}

impl DesignReport {
    fn new(
        spec: &FilterSpec,
        outcome: &DesignOutcome,
        response: &FrequencyResponse,
        include_taps: bool,
    ) -> Self {
        Self {
            family: spec.family().to_string(),
            method: outcome.method.to_string(),
            fallback: outcome.fallback.as_ref().map(|f| f.to_string()),
            sample_rate: spec.sample_rate(),
            num_taps: spec.num_taps(),
            cutoffs: spec.cutoffs().to_vec(),
            transition_hz: spec.transition_hz(),
            window: spec.window().to_string(),
            edges: spec.edges().to_vec(),
            gains: spec.gains().to_vec(),
            weights: spec.weights().to_vec(),
            dc_gain: outcome.coefficients.dc_gain(),
            bands: response.band_summaries(spec),
            taps: include_taps.then(|| outcome.coefficients.taps().to_vec()),
            response: Vec::new(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(args.verbose)),
    )
    .init();

    let config = args.config.load().context("Loading configuration")?;
    let (spec, outcome) = design_filter(&config).context("Designing filter")?;
    let response =
        FrequencyResponse::evaluate(&outcome.coefficients, spec.sample_rate(), args.points);
    let mut report = DesignReport::new(&spec, &outcome, &response, args.taps);

    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Csv => print_csv(&response),
        OutputFormat::Json => {
            report.response = response.points;
            print_json(&report)?;
        }
    }

    Ok(())
}

fn print_text(report: &DesignReport) {
    println!(
        "{} filter, {} taps at {} Hz",
        report.family, report.num_taps, report.sample_rate
    );
    match &report.fallback {
        Some(reason) => println!("Method: {} (fallback after: {})", report.method, reason),
        None => println!("Method: {}", report.method),
    }
    println!(
        "Cutoff: {:?} Hz, transition {:.1} Hz, window {}",
        report.cutoffs, report.transition_hz, report.window
    );
    println!("DC gain: {:.6}", report.dc_gain);
    println!();

    println!(
        "{:>10} {:>10} {:>6} {:>8} {:>12} {:>12}",
        "Start Hz", "End Hz", "Gain", "Weight", "Min dB", "Max dB"
    );
    println!("{}", "-".repeat(63));
    for (band, weight) in report.bands.iter().zip(&report.weights) {
        println!(
            "{:>10.1} {:>10.1} {:>6.1} {:>8.1} {:>12.2} {:>12.2}",
            band.start_hz, band.end_hz, band.gain, weight, band.min_db, band.max_db
        );
    }
    println!();

    for band in &report.bands {
        if band.is_passband() {
            println!(
                "Passband {:.0}-{:.0} Hz: ripple {:.3} dB",
                band.start_hz,
                band.end_hz,
                band.ripple_db()
            );
        } else {
            println!(
                "Stopband {:.0}-{:.0} Hz: attenuation {:.1} dB",
                band.start_hz,
                band.end_hz,
                band.attenuation_db()
            );
        }
    }

    if let Some(taps) = &report.taps {
        println!();
        for (i, tap) in taps.iter().enumerate() {
            println!("h[{:>4}] = {:>14.9}", i, tap);
        }
    }
}

fn print_csv(response: &FrequencyResponse) {
    println!("freq_hz,magnitude,magnitude_db,phase_rad");
    for p in &response.points {
        println!(
            "{:.3},{:.9},{:.4},{:.6}",
            p.freq_hz, p.magnitude, p.magnitude_db, p.phase_rad
        );
    }
}

fn print_json(report: &DesignReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}
