//! cutframe - render stills and exports from a project file
//!
//! Usage:
//!   cutframe frame <PROJECT> --time <SECS> --out <PNG>
//!   cutframe export <PROJECT> --out <FILE> [--format mp4|webm] [--quality ...] [--fps N]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cutframe_media::{ExportFormat, ExportQuality};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cutframe", about = "Render frames and exports from a timeline", version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Register a font face: FAMILY[:bold][:italic]=PATH (repeatable)
    #[arg(long = "font", value_name = "FACE=PATH", global = true)]
    fonts: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one frame to a PNG
    Frame {
        /// Project JSON file
        project: PathBuf,

        /// Timeline position in seconds
        #[arg(short, long, default_value = "0")]
        time: f64,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,

        /// Output width (defaults to the canvas width)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (defaults to the canvas height)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Export the whole timeline to a video file
    Export {
        /// Project JSON file
        project: PathBuf,

        /// Output video path
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = FormatArg::Mp4)]
        format: FormatArg,

        #[arg(long, value_enum, default_value_t = QualityArg::High)]
        quality: QualityArg,

        /// Frame rate (defaults to the project frame rate)
        #[arg(long)]
        fps: Option<u32>,

        /// Output width (defaults to the canvas width)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (defaults to the canvas height)
        #[arg(long)]
        height: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Mp4,
    Webm,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mp4 => ExportFormat::Mp4,
            FormatArg::Webm => ExportFormat::WebM,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QualityArg {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl From<QualityArg> for ExportQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Low => ExportQuality::Low,
            QualityArg::Medium => ExportQuality::Medium,
            QualityArg::High => ExportQuality::High,
            QualityArg::VeryHigh => ExportQuality::VeryHigh,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let fonts = commands::load_fonts(&cli.fonts)?;

    match cli.command {
        Commands::Frame {
            project,
            time,
            out,
            width,
            height,
        } => commands::render_still(&project, time, &out, width, height, fonts),
        Commands::Export {
            project,
            out,
            format,
            quality,
            fps,
            width,
            height,
        } => commands::export(
            &project,
            &out,
            commands::ExportArgs {
                format: format.into(),
                quality: quality.into(),
                fps,
                width,
                height,
            },
            fonts,
        ),
    }
}
