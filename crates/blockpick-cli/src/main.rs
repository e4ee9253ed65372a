//! blockpick CLI: block detection, frame calibration and dry runs of the
//! pick/place controller against a simulated arm.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use blockpick::motion::sim::SimulatedArm;
use blockpick::{
    ActionRequest, ArmState, BlockDetector, CameraIntrinsics, DetectionResult, SessionConfig,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "blockpick")]
#[command(about = "Locate colored blocks and drive a gated pick/place arm controller")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect blocks in an image and write observations as JSON.
    Detect(CliDetectArgs),

    /// Solve the image → robot calibration from a marker image.
    Calibrate(CliCalibrateArgs),

    /// Run a sequence of actions against a simulated arm.
    Run(CliRunArgs),

    /// Print the effective HSV color table.
    Colors {
        #[command(flatten)]
        session: CliSessionArgs,
    },
}

#[derive(Debug, Clone, Args, Default)]
struct CliSessionArgs {
    /// Session configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Calibration matrix file; overrides the session's path.
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Restrict detection to these colors (comma separated).
    #[arg(long, value_delimiter = ',')]
    colors: Vec<String>,

    #[command(flatten)]
    camera: CliCameraArgs,
}

#[derive(Debug, Clone, Args, Default)]
struct CliCameraArgs {
    /// Camera intrinsic fx (pixels). If set, fy/cx/cy are required too.
    #[arg(long)]
    cam_fx: Option<f64>,
    /// Camera intrinsic fy (pixels). If set, fx/cx/cy are required too.
    #[arg(long)]
    cam_fy: Option<f64>,
    /// Camera principal point cx (pixels). If set, fx/fy/cy are required too.
    #[arg(long)]
    cam_cx: Option<f64>,
    /// Camera principal point cy (pixels). If set, fx/fy/cx are required too.
    #[arg(long)]
    cam_cy: Option<f64>,
    /// Focal length used for distance only; overrides fx.
    #[arg(long)]
    focal_px: Option<f64>,
}

impl CliCameraArgs {
    fn to_core(&self) -> CliResult<Option<CameraIntrinsics>> {
        let intr = [self.cam_fx, self.cam_fy, self.cam_cx, self.cam_cy];
        let (Some(fx), Some(fy), Some(cx), Some(cy)) = (intr[0], intr[1], intr[2], intr[3]) else {
            if intr.iter().any(Option::is_some) {
                return Err(
                    "camera intrinsics are partial; provide all of --cam-fx --cam-fy --cam-cx --cam-cy"
                        .into(),
                );
            }
            return Ok(None);
        };
        let k = CameraIntrinsics { fx, fy, cx, cy };
        if !k.is_valid() {
            return Err("invalid camera intrinsics: fx/fy must be finite and non-zero".into());
        }
        Ok(Some(k))
    }
}

impl CliSessionArgs {
    /// Session file (or defaults) with command-line overrides applied.
    fn to_session(&self) -> CliResult<SessionConfig> {
        let mut session = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };
        if let Some(k) = self.camera.to_core()? {
            session.intrinsics = Some(k);
        }
        if self.camera.focal_px.is_some() {
            session.detect.depth.focal_length_px = self.camera.focal_px;
        }
        if let Some(path) = &self.calibration {
            session.calibration_path = Some(path.clone());
        }
        if !self.colors.is_empty() {
            let restricted = session.detect.colors.restricted_to(&self.colors);
            if restricted.names().next().is_none() {
                return Err(format!("none of the colors {:?} are configured", self.colors).into());
            }
            session.detect.colors = restricted;
        }
        session.validate()?;
        Ok(session)
    }
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write detection results (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Also write the color → grasp target map (JSON).
    #[arg(long)]
    targets_out: Option<PathBuf>,

    #[command(flatten)]
    session: CliSessionArgs,
}

#[derive(Debug, Clone, Args)]
struct CliCalibrateArgs {
    /// Image showing the four calibration markers.
    #[arg(long)]
    image: PathBuf,

    /// Where to write the matrix; defaults to the session's calibration path.
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    session: CliSessionArgs,
}

#[derive(Debug, Clone, Args)]
struct CliRunArgs {
    /// Actions to run in order (pick, place, drop).
    #[arg(long, value_delimiter = ',', required = true)]
    actions: Vec<String>,

    /// Image to detect pick targets in.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Color to pick; required when the actions include pick.
    #[arg(long)]
    color: Option<String>,

    /// Start as if a block were already held.
    #[arg(long)]
    holding: bool,

    /// Skip the fixed pauses between steps.
    #[arg(long)]
    no_settle: bool,

    #[command(flatten)]
    session: CliSessionArgs,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Calibrate(args) => run_calibrate(&args),
        Commands::Run(args) => run_actions(&args),
        Commands::Colors { session } => run_colors(&session),
    }
}

fn load_rgb(path: &Path) -> CliResult<image::RgbImage> {
    tracing::info!("Loading image: {}", path.display());
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    Ok(img.to_rgb8())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    tracing::info!("Written to {}", path.display());
    Ok(())
}

fn detect_image(detector: &BlockDetector, path: &Path) -> CliResult<DetectionResult> {
    let rgb = load_rgb(path)?;
    let (w, h) = rgb.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let result = detector.detect(&rgb);
    for (color, targets) in result.targets() {
        tracing::info!("{}: {} target(s)", color, targets.len());
    }
    Ok(result)
}

// ── colors ─────────────────────────────────────────────────────────────

fn run_colors(args: &CliSessionArgs) -> CliResult<()> {
    let session = args.to_session()?;
    println!("{}", serde_json::to_string_pretty(&session.detect.colors)?);
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let session = args.session.to_session()?;
    let detector = session.build_detector()?;
    let result = detect_image(&detector, &args.image)?;

    tracing::info!(
        "Detected {} blocks (calibrated: {})",
        result.blocks.len(),
        result.calibrated
    );
    write_json(&args.out, &result)?;
    if let Some(path) = &args.targets_out {
        write_json(path, &result.targets())?;
    }
    Ok(())
}

// ── calibrate ──────────────────────────────────────────────────────────

fn run_calibrate(args: &CliCalibrateArgs) -> CliResult<()> {
    let session = args.session.to_session()?;
    let gray = image::open(&args.image)
        .map_err(|e| -> CliError {
            format!("Failed to open image {}: {}", args.image.display(), e).into()
        })?
        .to_luma8();

    let matrix = session.calibrator.calibrate_image(&gray)?;
    let out = args
        .out
        .clone()
        .or_else(|| session.calibration_path.clone())
        .ok_or("no output path: pass --out or set calibration_path")?;
    matrix.save(&out)?;

    for row in matrix.to_array() {
        println!("[{:>12.6} {:>12.6} {:>12.6}]", row[0], row[1], row[2]);
    }
    Ok(())
}

// ── run ────────────────────────────────────────────────────────────────

fn run_actions(args: &CliRunArgs) -> CliResult<()> {
    let mut session = args.session.to_session()?;
    if args.holding {
        session.initial_state = ArmState::Holding;
    }
    if args.no_settle {
        session.plans = session.plans.without_settles();
    }

    let targets = match &args.image {
        Some(path) => {
            let detector = session.build_detector()?;
            Some(detect_image(&detector, path)?.targets())
        }
        None => None,
    };
    let request = ActionRequest {
        color: args.color.clone(),
        targets,
    };

    let mut gate = session.build_gate(SimulatedArm::new());
    for name in &args.actions {
        let outcome = gate.execute(name, &request)?;
        println!("{}", serde_json::to_string(&outcome)?);
    }
    tracing::info!(
        "Final state: {} ({} arm commands, {} feedback polls)",
        gate.state(),
        gate.arm().commands().len(),
        gate.arm().feedback_polls()
    );
    Ok(())
}
