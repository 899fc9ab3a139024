use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meetdocs")]
#[command(about = "Automated meeting documentation", long_about = None)]
pub struct Cli {
    /// Google Meet URL to join
    pub meet_url: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (default: platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Audio device index to capture from
    #[arg(long)]
    pub audio_device: Option<usize>,

    /// Duration of each audio chunk in seconds
    #[arg(long)]
    pub chunk_duration: Option<u64>,

    /// Output directory for the exported document
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum recording duration in seconds
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// List available audio input devices and exit
    #[arg(long)]
    pub list_devices: bool,
}
