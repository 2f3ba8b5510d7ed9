//! Podreel CLI: render timeline projects to video with ffmpeg.
//!
//! Usage:
//!   podreel render <PROJECT>     Render a project to .mp4 and .srt
//!   podreel validate <PROJECT>   Validate a project file and its assets
//!   podreel timeline <PROJECT>   Show resolved segment timing
//!   podreel check                Check ffmpeg/ffprobe availability
//!   podreel init <PROJECT>       Write a starter project file

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use podreel_common::config::SpeedStage;

mod commands;

#[derive(Parser)]
#[command(
    name = "podreel",
    about = "Timeline and clip rendering engine for talk videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where playback speed is applied.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SpeedStageArg {
    PerSegment,
    FinalEncode,
}

impl From<SpeedStageArg> for SpeedStage {
    fn from(value: SpeedStageArg) -> Self {
        match value {
            SpeedStageArg::PerSegment => SpeedStage::PerSegment,
            SpeedStageArg::FinalEncode => SpeedStage::FinalEncode,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a project to video
    Render {
        /// Path to the project JSON file
        project: PathBuf,

        /// Output directory (defaults to the configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file stem (defaults to the project title)
        #[arg(long)]
        name: Option<String>,

        /// Override the video format: landscape | short
        #[arg(long)]
        format: Option<String>,

        /// Override the playback speed
        #[arg(long)]
        speed: Option<f64>,

        /// Override where playback speed is applied
        #[arg(long, value_enum)]
        speed_stage: Option<SpeedStageArg>,

        /// Disable burned-in subtitles and the .srt file
        #[arg(long)]
        no_captions: bool,

        /// Scratch directory for intermediate clips
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Print the render summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a project file
    Validate {
        /// Path to the project JSON file
        project: PathBuf,
    },

    /// Show the resolved timeline of a project
    Timeline {
        /// Path to the project JSON file
        project: PathBuf,

        /// Print the timeline as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check external tool availability
    Check,

    /// Create a starter project file
    Init {
        /// Path of the project JSON file to create
        project: PathBuf,

        /// Project title
        #[arg(short, long, default_value = "Untitled")]
        title: String,

        /// Video format: landscape | short
        #[arg(long, default_value = "landscape")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = podreel_common::config::AppConfig::load().logging;
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    podreel_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render {
            project,
            output,
            name,
            format,
            speed,
            speed_stage,
            no_captions,
            work_dir,
            json,
        } => {
            commands::render::run(commands::render::RenderArgs {
                project,
                output,
                name,
                format,
                speed,
                speed_stage: speed_stage.map(SpeedStage::from),
                captions: !no_captions,
                work_dir,
                json,
            })
            .await
        }
        Commands::Validate { project } => commands::validate::run(project),
        Commands::Timeline { project, json } => commands::timeline::run(project, json),
        Commands::Check => commands::check::run(),
        Commands::Init {
            project,
            title,
            format,
        } => commands::init::run(project, title, format),
    }
}
