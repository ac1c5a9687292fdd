use std::{ffi::OsStr, fmt::Debug, path::Path};

use tracing::error;

use super::command::{assert_success_command, run_command, Capture, FFMPEG};
use crate::result::{bail, Result};

/// Interface for combining separately downloaded elementary streams
/// into one output container file.
pub trait Muxer: Debug {
    /// Mux `video` and `audio` into `out`, copying the video stream
    /// unmodified and re-encoding the audio stream to AAC.
    fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<()>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg;

impl Ffmpeg {
    /// Verify that the `ffmpeg` binary is reachable
    pub fn new() -> Result<Self> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))?;

        Ok(Self)
    }
}

impl Muxer for Ffmpeg {
    fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<()> {
        let res = run_command(
            FFMPEG,
            |cmd| {
                cmd.arg("-y")
                    .args([OsStr::new("-i"), video.as_os_str()])
                    .args([OsStr::new("-i"), audio.as_os_str()])
                    .args(["-c:v", "copy"])
                    .args(["-c:a", "aac"])
                    .arg(out)
                    // Keep quiet except for the periodic progress stats
                    .args(["-loglevel", "quiet"])
                    .arg("-stats")
            },
            Capture::STDERR,
        )?;

        if res.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&res.stderr);
            error!("Merging failed: {}", stderr.trim());
            bail(format!("ffmpeg did run but was not successful: {}", stderr.trim()))
        }
    }
}
