use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use scopeplay::render::RendererKind;

#[derive(Parser, Debug)]
#[command(name = "scopeplay", about = "Headless audio visualizer and playlist player")]
pub struct Cli {
    /// Config file (defaults to scopeplay.toml or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// List available renderers and exit
    #[arg(long)]
    pub list_renderers: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play files or folders, printing live visualizer frames
    Play(PlayArgs),
    /// Analyze a whole track offline
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Audio files or folders. Without any, the saved playlist is used
    pub inputs: Vec<PathBuf>,

    /// Visualization to run
    #[arg(short, long, value_enum)]
    pub renderer: Option<RendererKind>,

    /// Ticks per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Play at most this many seconds of each track
    #[arg(long)]
    pub seconds: Option<f64>,

    #[arg(long)]
    pub shuffle: bool,

    /// Repeat the current track
    #[arg(long)]
    pub repeat: bool,

    /// Save the playlist on exit, optionally to a specific file
    #[arg(long)]
    pub save: Option<Option<PathBuf>>,

    /// Print a preview every N published frames
    #[arg(long, default_value_t = 15)]
    pub every: u64,

    /// Preview width in characters
    #[arg(long, default_value_t = 64)]
    pub width: usize,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Write the per-frame flux envelope as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Transform size (power of two)
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Samples between successive frames
    #[arg(long, default_value_t = 512)]
    pub hop: usize,
}
