//! Command line front-end: detect objects in a video file

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vidscan::config::{ConfigForm, LoopSettings, OutputSettings, RunConfig};
use vidscan::error::ScanError;
use vidscan::inference::{DarknetEngine, InferenceEngine};
use vidscan::io::{Display, FrameSource, NullDisplay, VideoFileSink, VideoFileSource, WindowDisplay};
use vidscan::labels::LabelTable;
use vidscan::pipeline::{Pipeline, PipelineParts};

#[derive(Parser)]
#[command(name = "vidscan")]
#[command(about = "Detect, count and annotate objects in a video file", long_about = None)]
#[command(version)]
struct Cli {
    /// Video file to scan
    input: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Minimum class confidence, in (0, 1]
    #[arg(long)]
    confidence: Option<String>,

    /// Maximum overlap (IoU) between accepted boxes, in (0, 1]
    #[arg(long)]
    nms: Option<String>,

    /// Draw class labels and confidences (true/false)
    #[arg(long)]
    show_confidences: Option<String>,

    /// Box color as "(r, g, b)", "r,g,b" or "#rrggbb"
    #[arg(long)]
    box_color: Option<String>,

    /// Overlay text scale, greater than 0
    #[arg(long)]
    font_scale: Option<String>,

    /// Darknet network definition
    #[arg(long, default_value = "yolov3.cfg")]
    cfg: PathBuf,

    /// Darknet weights
    #[arg(long, default_value = "yolov3.weights")]
    weights: PathBuf,

    /// ONNX model; replaces the Darknet pair when given
    #[cfg(feature = "onnx")]
    #[arg(long)]
    onnx: Option<PathBuf>,

    /// Class names, one per line
    #[arg(long, default_value = "coco.names")]
    labels: PathBuf,

    /// Annotated output video
    #[arg(long, short, default_value = vidscan::config::DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Run without a window; the video is processed to the end
    #[arg(long)]
    no_display: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<ScanError>() {
            Some(cause) if cause.is_setup_error() => {
                error!("Setup failed, nothing was run: {:#}", e)
            }
            _ => error!("Run aborted: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    info!("Scanning {:?}", config.input_path);

    let source = VideoFileSource::open(&config.input_path).context("Failed to open input video")?;
    let frame_size = source.frame_size();
    let engine = load_engine(&cli)?;
    let labels = LabelTable::load(&cli.labels).context("Failed to load class labels")?;

    let output = OutputSettings {
        path: cli.output.clone(),
        ..OutputSettings::default()
    };
    let sink = VideoFileSink::open(&output, frame_size).context("Failed to open output video")?;

    let settings = LoopSettings::default();
    let display: Box<dyn Display> = if cli.no_display {
        Box::new(NullDisplay)
    } else {
        let window = WindowDisplay::open(&settings.window_title)
            .context("Failed to open display window")?;
        Box::new(window)
    };

    let parts = PipelineParts {
        source: Box::new(source),
        engine,
        sink: Box::new(sink),
        display,
        labels,
    };
    let summary = Pipeline::new(config, parts, settings)?.run()?;

    info!(
        "Wrote {} frames to {:?} ({} detections, stopped on {})",
        summary.frames_processed, output.path, summary.detections_accepted, summary.stop_reason
    );
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let file_form = match &cli.config {
        Some(path) => ConfigForm::from_toml_file(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?,
        None => ConfigForm::default(),
    };

    let flags = ConfigForm {
        confidence_threshold: cli.confidence.clone(),
        nms_threshold: cli.nms.clone(),
        show_confidences: cli.show_confidences.clone(),
        box_color: cli.box_color.clone(),
        font_scale: cli.font_scale.clone(),
        input_path: cli.input.as_ref().map(|p| p.to_string_lossy().into_owned()),
    };

    let config = RunConfig::from_form(&file_form.merge(flags)).context("Invalid configuration")?;
    Ok(config)
}

fn load_engine(cli: &Cli) -> anyhow::Result<Box<dyn InferenceEngine>> {
    #[cfg(feature = "onnx")]
    if let Some(model) = &cli.onnx {
        let engine = vidscan::inference::OnnxEngine::load(model)
            .context("Failed to load ONNX model")?;
        return Ok(Box::new(engine));
    }

    let engine = DarknetEngine::load(&cli.cfg, &cli.weights)
        .context("Failed to load Darknet model")?;
    Ok(Box::new(engine))
}
