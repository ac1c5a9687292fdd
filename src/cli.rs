use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use crate::types::Resolution;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("REELDL_", $v)
    };
}

/// Download a web video or a whole playlist at a chosen resolution.
/// When no combined stream exists at that resolution, video and audio
/// are fetched separately and merged with ffmpeg.
#[derive(Parser, Debug)]
pub struct Args {
    /// The URL of the video or playlist to download.
    /// Prompted for interactively when not given.
    #[clap(env = arg_env!("URL"))]
    pub url: Option<String>,

    /// The resolution to download at.
    /// Prompted for interactively when not given.
    #[clap(short, long, value_enum, env = arg_env!("RESOLUTION"))]
    pub resolution: Option<Resolution>,

    /// The directory to download into
    #[clap(long, default_value = ".", env = arg_env!("OUT"))]
    pub out: PathBuf,

    /// Keep processing the remaining playlist items when one of them fails,
    /// instead of aborting the whole run
    #[clap(long, env = arg_env!("KEEP_GOING"))]
    pub keep_going: bool,

    /// Show debug logs
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The URL to process, asking the user when none was given.
    pub fn url_or_prompt(&self) -> Result<String> {
        match &self.url {
            Some(url) => Ok(url.clone()),
            None => prompt_line("Enter the URL (video/playlist): "),
        }
    }

    /// The resolution to use, asking the user when none was given.
    /// Re-prompts until the answer parses.
    pub fn resolution_or_prompt(&self) -> Result<Resolution> {
        if let Some(resolution) = self.resolution {
            return Ok(resolution);
        }

        let choices = Resolution::ALL.map(|res| res.to_string()).join(", ");
        loop {
            let answer = prompt_line(&format!("Please select a resolution [{choices}]: "))?;
            match answer.parse() {
                Ok(resolution) => return Ok(resolution),
                Err(err) => eprintln!("{err}"),
            }
        }
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush().into_diagnostic()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .into_diagnostic()?;

    Ok(line.trim().to_string())
}
