use anyhow::{bail, Context};
use clap::Parser;
use fhsscore::capture::{load_table, save_table, FrameDecoder};
use fhsscore::processing::GridFitter;
use fhsscore::Capture;
use generator::profile::{build_capture, GeneratorConfig};
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::VisualizationModel;
use log::info;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{DetectorKind, GridConfig, WorkflowConfig};
use workflow::runner::Runner;

mod device;
mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "FHSS carrier and hop-timing analyzer")]
struct Args {
    /// Analyze a saved capture: a `.csv` table or `.bin` raw frames
    #[arg(long)]
    input: Option<PathBuf>,
    /// Capture live from a scanner device
    #[arg(long)]
    device: Option<PathBuf>,
    /// Analyze a seeded synthetic capture
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Scan start frequency (Hz) for raw frames and device captures
    #[arg(long)]
    start: Option<f64>,
    #[arg(long)]
    stop: Option<f64>,
    #[arg(long)]
    points: Option<usize>,
    #[arg(long, default_value_t = 100)]
    sweeps: usize,
    /// Disable spur removal and use the fast sweep mode
    #[arg(long, default_value_t = false)]
    fast: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, value_enum)]
    detector: Option<DetectorKind>,
    /// Averaging threshold (dBm)
    #[arg(long)]
    threshold: Option<f64>,
    /// Fit an evenly spaced grid over the capture span
    #[arg(long, default_value_t = false)]
    fit_grid: bool,
    /// Save the capture as a table
    #[arg(long)]
    export: Option<PathBuf>,
    /// Append the analysis summary to this file
    #[arg(long)]
    report: Option<PathBuf>,
    /// Keep the HTTP bridge alive for incoming captures
    #[arg(long, default_value_t = false)]
    serve: bool,
}

struct ScanLayout {
    start: f64,
    stop: f64,
    points: usize,
}

impl Args {
    fn scan_layout(&self) -> anyhow::Result<ScanLayout> {
        Ok(ScanLayout {
            start: self.start.context("--start is required for raw captures")?,
            stop: self.stop.context("--stop is required for raw captures")?,
            points: self.points.context("--points is required for raw captures")?,
        })
    }
}

fn load_input(path: &Path, args: &Args) -> anyhow::Result<Capture> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => load_table(path).with_context(|| format!("loading table {}", path.display())),
        Some("bin") => {
            let layout = args.scan_layout()?;
            let file = File::open(path)
                .with_context(|| format!("opening raw capture {}", path.display()))?;
            let (capture, summary) = FrameDecoder::new(layout.points)?
                .decode_capture(BufReader::new(file), layout.start, layout.stop)
                .with_context(|| format!("decoding raw capture {}", path.display()))?;
            info!(
                "decoded {} frames, {} discarded",
                summary.accepted, summary.discarded
            );
            Ok(capture)
        }
        _ => bail!("unsupported capture file {}", path.display()),
    }
}

/// Captures from the scanner; also returns the measured sweep period.
fn capture_device(path: &Path, args: &Args) -> anyhow::Result<(Capture, Option<f64>)> {
    let layout = args.scan_layout()?;
    let mut link = device::ScannerLink::open(path)?;
    link.prepare(args.fast)?;
    let scan = link.capture_raw(layout.start, layout.stop, layout.points, args.sweeps)?;
    let (capture, summary) = FrameDecoder::new(layout.points)?
        .decode_capture(Cursor::new(scan.bytes), layout.start, layout.stop)
        .context("decoding device capture")?;
    let period = summary.sweep_period(scan.elapsed);
    if let Some(period) = period {
        info!(
            "{} sweeps, scan time {:.2} ms per sweep",
            summary.accepted,
            period.as_secs_f64() * 1000.0
        );
    }
    Ok((capture, period.map(|p| p.as_secs_f64() * 1000.0)))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    if let Some(detector) = args.detector {
        workflow_config.detector = detector;
    }
    if let Some(threshold) = args.threshold {
        workflow_config.averaging_threshold = threshold;
    }

    let capture = if let Some(path) = &args.input {
        Some(load_input(path, &args)?)
    } else if let Some(path) = &args.device {
        let (capture, period_ms) = capture_device(path, &args)?;
        if workflow_config.sweep_period_ms.is_none() {
            workflow_config.sweep_period_ms = period_ms;
        }
        Some(capture)
    } else if args.synthetic {
        let config = GeneratorConfig {
            seed: args.seed,
            ..GeneratorConfig::default()
        };
        Some(build_capture(&config)?)
    } else {
        None
    };

    if capture.is_none() && !args.serve {
        bail!("nothing to analyze: pass --input, --device, --synthetic or --serve");
    }

    if args.fit_grid && workflow_config.grid.is_none() {
        if let Some(capture) = &capture {
            let frequencies = capture.frequencies();
            let fitter = GridFitter::default();
            workflow_config.grid = Some(GridConfig {
                window_low: frequencies[0],
                window_high: frequencies[frequencies.len() - 1],
                max_spacing: fitter.max_spacing,
                tolerance: fitter.tolerance,
            });
        }
    }

    let runner = Arc::new(Runner::new(workflow_config));
    let gui_bridge = GuiBridge::new();

    if let Some(capture) = &capture {
        if let Some(path) = &args.export {
            save_table(capture, path)
                .with_context(|| format!("exporting capture to {}", path.display()))?;
        }

        let result = runner.execute(capture)?;
        let summary = result.summary();
        println!("{}", summary);

        gui_bridge.publish(&VisualizationModel::from(&result))?;
        gui_bridge.publish_status("Analysis results ready.");

        if let Some(report_path) = &args.report {
            if let Some(parent) = report_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(report_path)
                .with_context(|| format!("opening report {}", report_path.display()))?;
            writeln!(file, "{}\n", summary)?;
        }
    }

    if args.serve {
        gui_bridge.serve(runner)?;
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
