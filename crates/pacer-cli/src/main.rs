mod input;
mod simulate;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use pacer_lib::{
    detect,
    report::{stat_pairs, SpikeReport, SpikeStat},
    DetectionConfig, DetectionResult, Recording,
};
use simulate::PacemakerParams;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pacer",
    version,
    about = "Cardiac action potential detection and per-spike analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Full detection result as JSON
    Json,
    /// One row per spike with labeled statistic columns
    Csv,
    /// [x, y] pairs of two statistics as JSON
    Scatter,
}

/// Flags that override individual config values after `--config` is loaded.
#[derive(Args, Debug)]
struct ConfigOverrides {
    /// dV/dt threshold (mV/ms) for derivative-mode detection
    #[arg(long, conflicts_with = "voltage_mode")]
    dvdt_threshold: Option<f64>,
    /// Detect on voltage crossings of --min-spike-vm instead of dV/dt
    #[arg(long)]
    voltage_mode: bool,
    #[arg(long, allow_hyphen_values = true)]
    min_spike_vm: Option<f64>,
    /// Median filter width in points (0 disables, even widths are bumped)
    #[arg(long)]
    median_filter: Option<usize>,
    /// Comma-separated percentages of AP height at which to measure width
    #[arg(long, value_delimiter = ',')]
    half_heights: Option<Vec<f64>>,
    /// Analysis window start (s)
    #[arg(long)]
    start_s: Option<f64>,
    /// Analysis window stop (s)
    #[arg(long)]
    stop_s: Option<f64>,
    #[arg(long)]
    refractory_ms: Option<f64>,
    /// Width of the clip cut around each spike (ms)
    #[arg(long, conflicts_with = "no_clips")]
    clip_width_ms: Option<f64>,
    /// Skip clip extraction
    #[arg(long)]
    no_clips: bool,
}

impl ConfigOverrides {
    fn apply(&self, cfg: &mut DetectionConfig) {
        if self.voltage_mode {
            cfg.dvdt_threshold = None;
        }
        if let Some(t) = self.dvdt_threshold {
            cfg.dvdt_threshold = Some(t);
        }
        if let Some(vm) = self.min_spike_vm {
            cfg.min_spike_vm = vm;
        }
        if let Some(w) = self.median_filter {
            cfg.median_filter_width = w;
        }
        if let Some(h) = &self.half_heights {
            cfg.half_height_fractions = h.clone();
        }
        if self.start_s.is_some() {
            cfg.start_s = self.start_s;
        }
        if self.stop_s.is_some() {
            cfg.stop_s = self.stop_s;
        }
        if let Some(r) = self.refractory_ms {
            cfg.refractory_ms = r;
        }
        if self.no_clips {
            cfg.clip_width_ms = None;
        } else if self.clip_width_ms.is_some() {
            cfg.clip_width_ms = self.clip_width_ms;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect action potentials in newline-delimited mV samples read from stdin or --input file
    Detect {
        /// Sample rate in points per millisecond (kHz)
        #[arg(long, default_value_t = 10.0)]
        sample_rate_khz: f64,
        #[arg(long)]
        input: Option<PathBuf>,
        /// TOML detection config; omitted keys take their defaults
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: ConfigOverrides,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Drop the filtered voltage and derivative traces from JSON output
        #[arg(long)]
        omit_traces: bool,
        /// Only report spikes whose take-off time (s) is at or after this
        #[arg(long, requires = "report_stop_s")]
        report_start_s: Option<f64>,
        #[arg(long, requires = "report_start_s")]
        report_stop_s: Option<f64>,
        /// Statistic on the x axis of scatter output (key or label)
        #[arg(long, default_value = "threshold_sec")]
        x_stat: SpikeStat,
        #[arg(long, default_value = "peak_val")]
        y_stat: SpikeStat,
    },
    /// Write a synthetic pacemaker action potential train as newline-delimited mV samples
    Simulate {
        #[arg(long, default_value_t = 10.0)]
        sample_rate_khz: f64,
        #[arg(long, default_value_t = 10)]
        cycles: usize,
        #[arg(long, default_value_t = 50.0)]
        diastole_ms: f64,
        #[arg(long, default_value_t = 2.0)]
        upstroke_ms: f64,
        #[arg(long, default_value_t = 16.0)]
        repolarization_ms: f64,
        #[arg(long, default_value_t = -60.0, allow_hyphen_values = true)]
        max_diastolic_vm: f64,
        #[arg(long, default_value_t = -40.0, allow_hyphen_values = true)]
        takeoff_vm: f64,
        #[arg(long, default_value_t = 20.0, allow_hyphen_values = true)]
        peak_vm: f64,
        /// Standard deviation of additive Gaussian noise (mV)
        #[arg(long, default_value_t = 0.0)]
        noise_sd: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Detect {
            sample_rate_khz,
            input,
            config,
            overrides,
            format,
            omit_traces,
            report_start_s,
            report_stop_s,
            x_stat,
            y_stat,
        } => {
            let mut cfg = match config.as_deref() {
                Some(path) => input::load_config(path)?,
                None => DetectionConfig::default(),
            };
            overrides.apply(&mut cfg);
            let window = report_start_s.zip(report_stop_s);
            cmd_detect(
                sample_rate_khz,
                input.as_deref(),
                &cfg,
                format,
                omit_traces,
                window,
                (x_stat, y_stat),
            )
        }
        Commands::Simulate {
            sample_rate_khz,
            cycles,
            diastole_ms,
            upstroke_ms,
            repolarization_ms,
            max_diastolic_vm,
            takeoff_vm,
            peak_vm,
            noise_sd,
            seed,
            out,
        } => {
            let params = PacemakerParams {
                sample_rate_khz,
                cycles,
                diastole_ms,
                upstroke_ms,
                repolarization_ms,
                max_diastolic_vm,
                takeoff_vm,
                peak_vm,
                noise_sd,
                seed,
            };
            cmd_simulate(&params, out.as_deref())
        }
    }
}

fn cmd_detect(
    sample_rate_khz: f64,
    input: Option<&Path>,
    cfg: &DetectionConfig,
    format: OutputFormat,
    omit_traces: bool,
    window: Option<(f64, f64)>,
    scatter: (SpikeStat, SpikeStat),
) -> Result<()> {
    let samples = input::read_samples(input)?;
    let recording = Recording::new(sample_rate_khz, samples);
    let mut result = detect(&recording, cfg).context("spike detection failed")?;
    info!(
        "{} spike(s) in {:.3} s, {} recoverable error(s)",
        result.num_spikes(),
        recording.duration_s(),
        result.error_count()
    );
    for (spike, message) in result.errors() {
        log::debug!("spike {spike}: {message}");
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match format {
        OutputFormat::Json => {
            if omit_traces {
                result.filtered_voltage.clear();
                result.derivative.clear();
            }
            serde_json::to_writer_pretty(&mut out, &result)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_report(&mut out, &result, window)?,
        OutputFormat::Scatter => {
            let pairs = stat_pairs(&result, scatter.0, scatter.1);
            let json = serde_json::json!({
                "x": scatter.0.label(),
                "y": scatter.1.label(),
                "points": pairs,
            });
            serde_json::to_writer_pretty(&mut out, &json)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn write_report<W: Write>(
    out: W,
    result: &DetectionResult,
    window: Option<(f64, f64)>,
) -> Result<()> {
    let report = SpikeReport::build(result, window);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&report.headers)?;
    for row in &report.rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .map_err(|e| anyhow!("failed to write report: {e}"))?;
    Ok(())
}

fn cmd_simulate(params: &PacemakerParams, out: Option<&Path>) -> Result<()> {
    let samples = simulate::pacemaker_train(params)?;
    let sink: Box<dyn Write> = match out {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = BufWriter::new(sink);
    for v in &samples {
        writeln!(sink, "{v}")?;
    }
    sink.flush()?;
    info!("wrote {} sample(s)", samples.len());
    Ok(())
}
