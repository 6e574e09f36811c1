use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "trailwarp")]
#[command(about = "Drag across an image to smear it through a decaying displacement field")]
pub struct Cli {
    /// Source image (PNG/JPEG); a generated poster is used when omitted
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Render a scripted drag headlessly and write it to this PNG instead of opening a window
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Frames to simulate for --snapshot
    #[arg(long, default_value_t = 45)]
    pub frames: u32,
}
