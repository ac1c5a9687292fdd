mod cli;
mod logging;
mod outside;
mod pipeline;
mod result;
mod retry;
mod sanitize;
mod select;
mod types;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use outside::{Ffmpeg, Muxer, Ytdl};
use tracing::{info, Level};

use crate::{cli::Args, pipeline::Pipeline, result::Result};

fn main() -> miette::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    logging::init_logging(level)?;

    let url = args.url_or_prompt()?;
    let resolution = args.resolution_or_prompt()?;

    // Make sure the output directory exists before any download starts
    std::fs::create_dir_all(&args.out)
        .into_diagnostic()
        .wrap_err("Could not create out directory")?;

    let (ytdl, ffmpeg) = load_external_components()?;

    let pipeline = Pipeline::new(
        &ytdl,
        &ffmpeg,
        args.out.clone(),
        resolution,
        args.keep_going,
    );
    pipeline.run(&url)?;

    info!("All tasks completed");
    Ok(())
}

/// Load the external components.
///
/// Construct the handles concurrently as executing an external program
/// is not instantaneous. That way we can avoid adding up the costs.
fn load_external_components() -> Result<(Ytdl, impl Muxer)> {
    let ytdl_thread = std::thread::spawn(Ytdl::new);
    let ffmpeg_thread = std::thread::spawn(Ffmpeg::new);

    let ytdl = ytdl_thread.join().expect("Could not join thread")?;
    let ffmpeg = ffmpeg_thread.join().expect("Could not join thread")?;

    Ok((ytdl, ffmpeg))
}
