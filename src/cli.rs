use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "movi")]
#[command(author, version, about = "AVI/MJPEG container tool: probe, extract, remux, capture")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect a movie file and display its streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy the undecoded video and/or audio streams out of a container
    Extract {
        /// Input movie file
        #[arg(required = true)]
        file: PathBuf,

        /// Where to write the raw video stream
        #[arg(long)]
        video: Option<PathBuf>,

        /// Where to write the raw audio stream
        #[arg(long)]
        audio: Option<PathBuf>,
    },

    /// Rewrap a movie (AVI or raw MJPEG) into a fresh OpenDML AVI
    Remux {
        /// Input movie file
        #[arg(required = true)]
        input: PathBuf,

        /// Output AVI path
        #[arg(required = true)]
        output: PathBuf,

        /// Frame rate for headerless inputs
        #[arg(long, default_value = "30.0")]
        fps: f32,

        /// Frame width for headerless inputs
        #[arg(long, default_value = "640")]
        width: u32,

        /// Frame height for headerless inputs
        #[arg(long, default_value = "480")]
        height: u32,
    },

    /// Record a live HTTP MJPEG stream into an AVI
    Capture {
        /// Stream URL
        #[arg(required = true)]
        url: String,

        /// Output AVI path
        #[arg(required = true)]
        output: PathBuf,

        /// Stop after this many frames
        #[arg(long, default_value = "300")]
        frames: usize,

        /// Frame rate to declare in the output header
        #[arg(long, default_value = "30.0")]
        fps: f32,
    },
}
