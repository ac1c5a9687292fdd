use std::{
    ffi::OsStr,
    io::{BufRead, BufReader},
    path::Path,
};

use indicatif::{ProgressBar, ProgressStyle};
use miette::miette;
use serde::{de::DeserializeOwned, Deserialize};

use super::command::{
    assert_success_command, run_command, spawn_piped_command, Capture, YT_DL, YT_DLP,
};
use crate::{
    result::{bail, Error, Result},
    types::{PlaylistContext, Resolution, Resolved, StreamDescriptor, VideoRef},
};

/// Template handed to the downloader so that progress lines come out
/// as plain `download:<downloaded_bytes>/<total_bytes>` pairs.
const PROGRESS_TEMPLATE: &str =
    "download:%(progress.downloaded_bytes)s/%(progress.total_bytes)s";

/// Whether a URL refers to a whole playlist rather than a single video.
///
/// Pure string inspection. Malformed URLs are not validated here, the
/// provider will surface its own failure when asked to resolve them.
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("playlist")
}

/// Interface for resolving URLs into downloadable items and performing
/// the actual byte transfer.
pub trait MediaProvider {
    /// Resolve a URL into either a single video or a playlist.
    fn resolve(&self, url: &str) -> Result<Resolved>;

    /// List the downloadable variants of a video, in provider order.
    fn list_streams(&self, video: &VideoRef) -> Result<Vec<StreamDescriptor>>;

    /// Transfer one stream to `dest`, overwriting any previous content.
    fn fetch(&self, video: &VideoRef, stream: &StreamDescriptor, dest: &Path) -> Result<()>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
pub struct Ytdl {
    program: &'static str,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new() -> Result<Self> {
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DLP })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DL })
        } else {
            bail("Neither yt-dlp nor youtube-dl found")
        }
    }

    /// Dump and parse the provider's JSON description of a video or playlist.
    fn dump_json<T: DeserializeOwned>(&self, target: &str, flat_playlist: bool) -> Result<T> {
        let res = run_command(
            self.program,
            |cmd| {
                let cmd = cmd.arg("-q").arg("-J");
                let cmd = if flat_playlist {
                    cmd.arg("--flat-playlist")
                } else {
                    cmd.arg("--no-playlist")
                };
                cmd.arg("--").arg(target)
            },
            Capture::STDOUT | Capture::STDERR,
        )?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        if is_unavailable(&stderr) {
            return Err(Error::UnavailableStream);
        }
        if !res.status.success() {
            return bail(format!("Could not query '{target}': {}", stderr.trim()));
        }

        Ok(serde_json::from_slice(&res.stdout)
            .map_err(|err| miette!("Could not parse provider JSON: {err}"))?)
    }
}

impl MediaProvider for Ytdl {
    fn resolve(&self, url: &str) -> Result<Resolved> {
        if is_playlist_url(url) {
            let playlist: RawPlaylist = self.dump_json(url, true)?;
            Ok(Resolved::Playlist(playlist.into()))
        } else {
            let video: RawVideo = self.dump_json(url, false)?;
            Ok(Resolved::Video(VideoRef {
                id: video.id,
                title: video.title,
            }))
        }
    }

    fn list_streams(&self, video: &VideoRef) -> Result<Vec<StreamDescriptor>> {
        let raw: RawVideo = self.dump_json(&video.id, false)?;
        Ok(build_descriptors(&video.title, raw.formats))
    }

    fn fetch(&self, video: &VideoRef, stream: &StreamDescriptor, dest: &Path) -> Result<()> {
        let mut child = spawn_piped_command(self.program, |cmd| {
            cmd.arg("-q")
                .arg("--newline")
                .arg("--progress")
                .args(["--progress-template", PROGRESS_TEMPLATE])
                .args([OsStr::new("-o"), dest.as_os_str()])
                // Or else fails when file already exists, even an empty one
                .arg("--no-continue")
                .arg("--no-playlist")
                .args(["-f", &stream.format_id])
                .arg("--")
                .arg(&video.id)
        })?;

        let bar = transfer_bar(stream.filesize);
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if let Some((downloaded, total)) = parse_progress_line(&line) {
                    if bar.length() != Some(total) {
                        bar.set_length(total);
                    }
                    bar.set_position(downloaded);
                }
            }
        }

        let res = child.wait_with_output()?;
        bar.finish_and_clear();

        let stderr = String::from_utf8_lossy(&res.stderr);
        if is_unavailable(&stderr) {
            return Err(Error::UnavailableStream);
        }
        if res.status.success() {
            Ok(())
        } else {
            bail(format!(
                "Transfer did run but was not successful: {}",
                stderr.trim()
            ))
        }
    }
}

/// Check whether the downloader's stderr says the stream is unavailable.
fn is_unavailable(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"))
}

fn transfer_bar(total: Option<u64>) -> ProgressBar {
    let bar = ProgressBar::new(total.unwrap_or(0));
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {bytes}/{total_bytes}")
            .unwrap()
            .progress_chars("#>-"),
    );
    bar
}

/// Parse one `download:<downloaded>/<total>` progress line.
/// The total may be reported as `NA` when the provider does not know it.
fn parse_progress_line(line: &str) -> Option<(u64, u64)> {
    let (downloaded, total) = line.strip_prefix("download:")?.split_once('/')?;
    Some((downloaded.trim().parse().ok()?, total.trim().parse().ok()?))
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    id: String,
    title: String,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    filesize_approx: Option<u64>,
}

impl RawFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|codec| codec != "none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|codec| codec != "none")
    }
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    title: String,
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: String,
    // Flat listings may omit titles for private or deleted items
    #[serde(default)]
    title: Option<String>,
}

impl From<RawPlaylist> for PlaylistContext {
    fn from(playlist: RawPlaylist) -> Self {
        let videos = playlist
            .entries
            .into_iter()
            .map(|entry| {
                let title = entry.title.unwrap_or_else(|| entry.id.clone());
                VideoRef {
                    id: entry.id,
                    title,
                }
            })
            .collect();

        PlaylistContext {
            title: playlist.title,
            videos,
        }
    }
}

/// Build the stream descriptors out of a video's format listing,
/// keeping provider order.
fn build_descriptors(title: &str, formats: Vec<RawFormat>) -> Vec<StreamDescriptor> {
    formats
        .into_iter()
        .filter_map(|format| {
            let has_video = format.has_video();
            let has_audio = format.has_audio();

            // Storyboards and other non-media variants
            if !has_video && !has_audio {
                return None;
            }

            let ext = format.ext.as_deref().unwrap_or("mp4");

            Some(StreamDescriptor {
                default_filename: format!("{title}.{ext}"),
                format_id: format.format_id,
                resolution: format.height.and_then(Resolution::from_height),
                has_video,
                has_audio,
                filesize: format.filesize.or(format.filesize_approx),
            })
        })
        .collect()
}
