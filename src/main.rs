mod app;
mod cli;
mod compositor;
mod field;
mod pointer;
mod render;
mod snapshot;
mod source;

use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("trailwarp starting up");

    let cli = cli::Cli::parse();
    let result = source::load_or_placeholder(cli.image.as_deref()).and_then(|img| {
        match &cli.snapshot {
            Some(out) => snapshot::render_to_file(&img, cli.frames, out),
            None => app::run(img, cli.width, cli.height),
        }
    });

    if let Err(e) = result {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}
