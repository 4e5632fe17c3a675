//! augmented-museum CLI: replay a recorded session or print markers.

use std::path::PathBuf;

use augmented_museum::markers::{
    builtin_dictionary, write_marker_png, Dictionary, MarkerRenderConfig, DEFAULT_DICTIONARY,
};
use augmented_museum::overlay::{
    Devices, FrameSink, InteractionLoop, MuseumConfig, OverlayPolicy, Session, StrategyKind,
    TimestampedScreenshots,
};
use augmented_museum::replay::{
    DirectorySink, ImageSequenceSource, NullSink, RecordedTracker, ScriptedKeys,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[cfg(not(feature = "tracing"))]
use augmented_museum::core::init_with_level;
#[cfg(feature = "tracing")]
use augmented_museum::core::init_tracing;
use log::{info, LevelFilter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "augmented-museum")]
#[command(about = "Hang virtual paintings on printed markers in a video stream")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the museum loop over recorded frames and detections.
    Run(RunArgs),
    /// Render a printable marker PNG from a dictionary.
    GenerateMarker(MarkerArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Broadcast,
    PerMarkerId,
}

impl From<PolicyArg> for OverlayPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Broadcast => OverlayPolicy::Broadcast,
            PolicyArg::PerMarkerId => OverlayPolicy::PerMarkerId,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    PoseProjection,
    CornerWarp,
}

impl From<StrategyArg> for StrategyKind {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::PoseProjection => StrategyKind::PoseProjection,
            StrategyArg::CornerWarp => StrategyKind::CornerWarp,
        }
    }
}

#[derive(Debug, Args)]
struct RunArgs {
    /// JSON config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of overlay images.
    #[arg(short = 'p', long = "path")]
    images_dir: Option<PathBuf>,

    /// Calibration file (.xml OpenCV FileStorage or .json).
    #[arg(short = 'c', long)]
    calibration: Option<PathBuf>,

    /// Directory of captured frames, read in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// JSON Lines marker detections, one object per frame.
    #[arg(long)]
    detections: PathBuf,

    /// Key script, one character per frame; `.` means no key.
    #[arg(long, default_value = "")]
    keys: String,

    /// Write every composited frame here.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    screenshot_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Marker side length in calibration units.
    #[arg(long)]
    marker_side: Option<f64>,
}

#[derive(Debug, Args)]
struct MarkerArgs {
    /// Dictionary JSON: `{name, marker_size, max_correction_bits, codes}`.
    #[arg(long, conflicts_with = "builtin")]
    dictionary: Option<PathBuf>,

    /// Embedded dictionary used when `--dictionary` is not given.
    #[arg(long, default_value = DEFAULT_DICTIONARY)]
    builtin: String,

    /// Marker id; a random id from the dictionary when omitted.
    #[arg(long)]
    id: Option<u32>,

    /// Side length in pixels.
    #[arg(long, default_value_t = 200)]
    size: u32,

    #[arg(long, default_value_t = 1)]
    border_bits: usize,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    #[cfg(not(feature = "tracing"))]
    init_with_level(cli.log_level)?;
    #[cfg(feature = "tracing")]
    init_tracing(false);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::GenerateMarker(args) => generate_marker(args),
    }
}

fn build_config(args: &RunArgs) -> CliResult<MuseumConfig> {
    let mut cfg = match &args.config {
        Some(path) => MuseumConfig::load_json(path)?,
        None => MuseumConfig::default(),
    };
    if let Some(dir) = &args.images_dir {
        cfg.images_dir = dir.clone();
    }
    if let Some(path) = &args.calibration {
        cfg.calibration_path = path.clone();
    }
    if let Some(dir) = &args.screenshot_dir {
        cfg.screenshot_dir = dir.clone();
    }
    if let Some(p) = args.policy {
        cfg.policy = p.into();
    }
    if let Some(s) = args.strategy {
        cfg.strategy = s.into();
    }
    if let Some(side) = args.marker_side {
        cfg.marker_side_length = side;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
fn run(args: RunArgs) -> CliResult<()> {
    let config = build_config(&args)?;
    let mut session = Session::load(config)?;

    let sink: Box<dyn FrameSink> = match &args.output {
        Some(dir) => Box::new(DirectorySink::new(dir.clone())),
        None => Box::new(NullSink),
    };
    let devices = Devices {
        frames: Box::new(ImageSequenceSource::open(&args.frames)?),
        tracker: Box::new(RecordedTracker::load(&args.detections)?),
        sink,
        keys: Box::new(ScriptedKeys::new(&args.keys)),
        screenshots: Box::new(TimestampedScreenshots::new(
            session.config.screenshot_dir.clone(),
        )),
    };

    let summary = InteractionLoop::new(devices, &session.config).run(&mut session)?;
    info!(
        "{} frames, {} screenshots, {} composite failures ({:?})",
        summary.frames, summary.screenshots, summary.composite_failures, summary.end
    );
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn generate_marker(args: MarkerArgs) -> CliResult<()> {
    let dict = match &args.dictionary {
        Some(path) => Dictionary::load_json(path)?,
        None => builtin_dictionary(&args.builtin)?,
    };
    let id = match args.id {
        Some(id) => id,
        // Validated dictionaries are never empty.
        None => rand::random::<u32>() % dict.len() as u32,
    };
    let cfg = MarkerRenderConfig {
        side_px: args.size,
        border_bits: args.border_bits,
    };
    let path = write_marker_png(&dict, id, &cfg, &args.out_dir)?;
    println!("{}", path.display());
    Ok(())
}
