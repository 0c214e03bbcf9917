//! markmeasure CLI: marker detection, rectification, scripted sessions and
//! marker printing.

use clap::{Parser, Subcommand};
use markmeasure::aruco::{builtins::DICT_4X4_50, render_marker, ArucoDetector, ArucoDetectorParams};
use markmeasure::image_io::{load_rgb, save_gray, save_rgb};
use markmeasure::{estimate_px_per_mm, rectify_topdown, run_script, LabelConfig, SessionScript};
use serde::Serialize;
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "markmeasure")]
#[command(about = "Measure lengths on photographs calibrated with 4x4 ArUco markers")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit tracing spans as JSON (requires the `tracing` feature).
    #[arg(long, global = true)]
    trace_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect markers and report the image scale.
    Detect {
        image: PathBuf,

        /// Printed marker side length in millimetres.
        #[arg(long, default_value = "60.0")]
        marker_mm: f64,

        /// Detector parameters (JSON, partial allowed).
        #[arg(long)]
        params: Option<PathBuf>,

        /// Print a JSON report instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Warp the plane spanned by four corner markers to a top-down view.
    Rectify {
        image: PathBuf,

        /// Output image path.
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value = "60.0")]
        marker_mm: f64,

        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Run a scripted annotation session and write its annotation JSON.
    Run { script: PathBuf },

    /// Render a printable marker from the built-in dictionary.
    Marker {
        #[arg(long)]
        id: u32,

        /// Side of one bit cell in pixels.
        #[arg(long, default_value = "40")]
        cell_px: usize,

        /// White margin around the marker in pixels.
        #[arg(long, default_value = "40")]
        quiet_px: usize,

        #[arg(long)]
        out: PathBuf,
    },

    /// Print the contents of a labels file with defaults applied.
    Labels { path: PathBuf },
}

#[derive(Serialize)]
struct DetectReport<'a> {
    image: &'a Path,
    markers: Vec<markmeasure::Marker>,
    px_per_mm: Option<f64>,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.trace_json);

    match cli.command {
        Commands::Detect {
            image,
            marker_mm,
            params,
            json,
        } => run_detect(&image, marker_mm, params.as_deref(), json),
        Commands::Rectify {
            image,
            out,
            marker_mm,
            params,
        } => run_rectify(&image, &out, marker_mm, params.as_deref()),
        Commands::Run { script } => run_session(&script),
        Commands::Marker {
            id,
            cell_px,
            quiet_px,
            out,
        } => run_marker(id, cell_px, quiet_px, &out),
        Commands::Labels { path } => {
            let cfg = LabelConfig::load_json(&path)?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(verbose: u8, json: bool) {
    let level = markmeasure::core::level_from_verbosity(verbose);
    markmeasure::init_tracing(json, level);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8, _json: bool) {
    let level = markmeasure::core::level_from_verbosity(verbose);
    let _ = markmeasure::core::init_with_level(level);
}

fn load_detector(params: Option<&Path>) -> CliResult<ArucoDetector> {
    let params = match params {
        Some(p) => serde_json::from_str::<ArucoDetectorParams>(&std::fs::read_to_string(p)?)?,
        None => ArucoDetectorParams::default(),
    };
    Ok(ArucoDetector::new(params))
}

fn run_detect(image: &Path, marker_mm: f64, params: Option<&Path>, json: bool) -> CliResult<()> {
    let detector = load_detector(params)?;
    let img = load_rgb(image)?;
    let markers = detector.detect_rgb(&img.view());
    let px_per_mm = estimate_px_per_mm(&markers, marker_mm).map(|s| s.px_per_mm);

    if json {
        let report = DetectReport {
            image,
            markers,
            px_per_mm,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("markers: {}", markers.len());
    for m in &markers {
        let c = m.corners;
        println!(
            "  id {:>2}  rot {}  ham {}  corners ({:.1},{:.1}) ({:.1},{:.1}) ({:.1},{:.1}) ({:.1},{:.1})",
            m.id, m.rotation, m.hamming, c[0].x, c[0].y, c[1].x, c[1].y, c[2].x, c[2].y, c[3].x, c[3].y
        );
    }
    match px_per_mm {
        Some(v) => println!("px/mm: {v:.3}"),
        None => println!("px/mm: -"),
    }
    Ok(())
}

fn run_rectify(image: &Path, out: &Path, marker_mm: f64, params: Option<&Path>) -> CliResult<()> {
    let detector = load_detector(params)?;
    let img = load_rgb(image)?;
    let Some(rect) = rectify_topdown(&img, &detector, marker_mm) else {
        return Err("rectification needs four markers at the corners of the plane".into());
    };
    save_rgb(&rect.image, out)?;

    println!("wrote {} ({}x{})", out.display(), rect.image.width, rect.image.height);
    for row in rect.homography.to_array() {
        println!("  [{:>12.6} {:>12.6} {:>12.6}]", row[0], row[1], row[2]);
    }
    match rect.px_per_mm {
        Some(v) => println!("px/mm: {v:.3}"),
        None => println!("px/mm: -"),
    }
    Ok(())
}

fn run_session(script_path: &Path) -> CliResult<()> {
    let script = SessionScript::load_json(script_path)?;
    let report = run_script(&script)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_marker(id: u32, cell_px: usize, quiet_px: usize, out: &Path) -> CliResult<()> {
    let Some(img) = render_marker(&DICT_4X4_50, id, cell_px, quiet_px) else {
        return Err(format!(
            "marker id {id} is outside {} (0..{}) or cell size is zero",
            DICT_4X4_50.name,
            DICT_4X4_50.len()
        )
        .into());
    };
    save_gray(&img, out)?;
    println!("wrote {} ({}x{})", out.display(), img.width, img.height);
    Ok(())
}
