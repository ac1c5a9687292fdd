use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{error, info};

use crate::{
    outside::{MediaProvider, Muxer},
    result::Result,
    retry::{with_retries, DEFAULT_ATTEMPTS, DEFAULT_DELAY},
    sanitize::{sanitize_dirname, sanitize_filename},
    select::{select_streams, Selection},
    types::{PlaylistContext, Resolution, Resolved, StreamDescriptor, VideoRef},
};

// Fixed temporary names shared by every item. Items are processed strictly
// one after the other, so at most one set of these exists at a time.
const TEMP_VIDEO: &str = "video.mp4";
const TEMP_AUDIO: &str = "audio.mp4";
const MERGED_OUTPUT: &str = "final.mp4";

/// How one item ended up, short of a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The final file is in place.
    Placed,
    /// The destination already existed, nothing was done.
    Skipped,
}

/// Sequential download pipeline: resolve, select, fetch, merge, place.
pub struct Pipeline<'a> {
    provider: &'a dyn MediaProvider,
    muxer: &'a dyn Muxer,
    work_dir: PathBuf,
    resolution: Resolution,
    keep_going: bool,
    attempts: u32,
    delay: Duration,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        provider: &'a dyn MediaProvider,
        muxer: &'a dyn Muxer,
        work_dir: PathBuf,
        resolution: Resolution,
        keep_going: bool,
    ) -> Self {
        Self {
            provider,
            muxer,
            work_dir,
            resolution,
            keep_going,
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }

    /// Override the transfer retry policy.
    #[allow(dead_code)] // only exercised by tests for now
    pub fn with_retry_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.attempts = attempts;
        self.delay = delay;
        self
    }

    /// Resolve the URL and process every item it refers to.
    pub fn run(&self, url: &str) -> Result<()> {
        match self.provider.resolve(url)? {
            Resolved::Video(video) => {
                self.download_single(&video)?;
            }
            Resolved::Playlist(playlist) => self.download_playlist(&playlist)?,
        }
        Ok(())
    }

    fn download_single(&self, video: &VideoRef) -> Result<Outcome> {
        let filename = sanitize_filename(&format!("{}.mp4", video.title)).into_owned();
        let dest = self.work_dir.join(filename);

        self.process_item(video, &dest)
    }

    fn download_playlist(&self, playlist: &PlaylistContext) -> Result<()> {
        let dir = self.work_dir.join(sanitize_dirname(&playlist.title));
        fs::create_dir_all(&dir)?;

        info!("{} videos in the playlist", playlist.videos.len());

        for (index, video) in playlist.videos.iter().enumerate() {
            // 1-based numbering in playlist order, unaffected by skips
            let index = index + 1;
            let filename =
                sanitize_filename(&format!("{index}. {}.mp4", video.title)).into_owned();
            let dest = dir.join(filename);

            match self.process_item(video, &dest) {
                Ok(_) => {}
                Err(err) if self.keep_going => {
                    let report = miette::Report::from(
                        err.wrap_err_with(|| format!("Could not download item {index}")),
                    );
                    error!("{report:?}");
                }
                Err(err) => {
                    return Err(
                        err.wrap_err_with(|| format!("Could not download item {index}"))
                    );
                }
            }

            info!("----------------------------------");
        }

        Ok(())
    }

    /// Process one item to completion: skip it, or download (and possibly
    /// merge) it into its final place.
    fn process_item(&self, video: &VideoRef, dest: &Path) -> Result<Outcome> {
        if dest.exists() {
            info!("{} already exists", dest.display());
            return Ok(Outcome::Skipped);
        }

        let streams = self.provider.list_streams(video)?;
        let selection = select_streams(&streams, self.resolution)
            .map_err(|err| err.wrap_err_with(|| format!("No usable stream for {}", video.title)))?;

        match selection {
            Selection::Combined(stream) => {
                info!(
                    "Downloading {} in {}",
                    stream.default_filename,
                    resolution_label(&stream)
                );
                self.fetch_with_retries(video, &stream, dest)?;
            }
            Selection::Split { video: video_stream, audio: audio_stream } => {
                let temp_video = self.work_dir.join(TEMP_VIDEO);
                let temp_audio = self.work_dir.join(TEMP_AUDIO);
                let merged = self.work_dir.join(MERGED_OUTPUT);

                info!(
                    "Downloading video for {} in {}",
                    video_stream.default_filename,
                    resolution_label(&video_stream)
                );
                self.fetch_with_retries(video, &video_stream, &temp_video)?;

                info!("Downloading audio for {}", video_stream.default_filename);
                self.fetch_with_retries(video, &audio_stream, &temp_audio)?;

                info!("Merging video and audio...");
                self.muxer
                    .mux(&temp_video, &temp_audio, &merged)
                    .map_err(|err| err.wrap_err_with(|| "Could not merge video and audio"))?;

                fs::rename(&merged, dest)?;
                fs::remove_file(&temp_video)?;
                fs::remove_file(&temp_audio)?;
            }
        }

        info!("Downloaded {}", dest.display());
        Ok(Outcome::Placed)
    }

    fn fetch_with_retries(
        &self,
        video: &VideoRef,
        stream: &StreamDescriptor,
        dest: &Path,
    ) -> Result<()> {
        with_retries(self.attempts, self.delay, || {
            self.provider.fetch(video, stream, dest)
        })
        .map_err(|err| {
            err.wrap_err_with(|| format!("Could not download stream {}", stream.format_id))
        })
    }
}

fn resolution_label(stream: &StreamDescriptor) -> String {
    stream
        .resolution
        .map_or_else(|| "unknown resolution".to_string(), |res| res.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::result::{bail, Error};

    /// In-memory provider writing dummy bytes instead of real transfers.
    struct FakeProvider {
        resolved: Resolved,
        streams: Vec<StreamDescriptor>,
        /// ids that always fail to fetch
        broken_ids: Vec<String>,
        /// failures injected before the first fetch success
        flaky_failures: Mutex<u32>,
        list_calls: Mutex<u32>,
        fetch_calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new(resolved: Resolved, streams: Vec<StreamDescriptor>) -> Self {
            Self {
                resolved,
                streams,
                broken_ids: vec![],
                flaky_failures: Mutex::new(0),
                list_calls: Mutex::new(0),
                fetch_calls: Mutex::new(vec![]),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetch_calls.lock().unwrap().len()
        }
    }

    impl MediaProvider for FakeProvider {
        fn resolve(&self, _url: &str) -> Result<Resolved> {
            Ok(self.resolved.clone())
        }

        fn list_streams(&self, _video: &VideoRef) -> Result<Vec<StreamDescriptor>> {
            *self.list_calls.lock().unwrap() += 1;
            Ok(self.streams.clone())
        }

        fn fetch(&self, video: &VideoRef, stream: &StreamDescriptor, dest: &Path) -> Result<()> {
            self.fetch_calls.lock().unwrap().push(stream.format_id.clone());

            if self.broken_ids.contains(&video.id) {
                return bail("broken item");
            }

            let mut failures = self.flaky_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return bail("transient transfer error");
            }

            fs::write(dest, stream.format_id.as_bytes())?;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct FakeMuxer {
        mux_calls: Mutex<u32>,
    }

    impl Muxer for FakeMuxer {
        fn mux(&self, video: &Path, audio: &Path, out: &Path) -> Result<()> {
            *self.mux_calls.lock().unwrap() += 1;

            let mut merged = fs::read(video)?;
            merged.extend(fs::read(audio)?);
            fs::write(out, merged)?;
            Ok(())
        }
    }

    fn video_ref(id: &str, title: &str) -> VideoRef {
        VideoRef {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    fn stream(
        format_id: &str,
        resolution: Option<Resolution>,
        has_video: bool,
        has_audio: bool,
    ) -> StreamDescriptor {
        StreamDescriptor {
            format_id: format_id.to_string(),
            resolution,
            has_video,
            has_audio,
            filesize: None,
            default_filename: format!("{format_id}.mp4"),
        }
    }

    fn combined_480() -> StreamDescriptor {
        stream("c480", Some(Resolution::P480), true, true)
    }

    fn split_480() -> Vec<StreamDescriptor> {
        vec![
            stream("v480", Some(Resolution::P480), true, false),
            stream("a", None, false, true),
        ]
    }

    fn pipeline<'a>(
        provider: &'a FakeProvider,
        muxer: &'a FakeMuxer,
        work_dir: &Path,
        keep_going: bool,
    ) -> Pipeline<'a> {
        Pipeline::new(
            provider,
            muxer,
            work_dir.to_path_buf(),
            Resolution::P480,
            keep_going,
        )
        .with_retry_policy(5, Duration::ZERO)
    }

    #[test]
    fn existing_destination_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_ref("v1", "My Video");
        let dest = dir.path().join("My Video.mp4");
        fs::write(&dest, b"original").unwrap();

        let provider = FakeProvider::new(Resolved::Video(video.clone()), vec![combined_480()]);
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        let outcome = pipe.download_single(&video).unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(*provider.list_calls.lock().unwrap(), 0);
        assert_eq!(provider.fetch_count(), 0);
        assert_eq!(fs::read(&dest).unwrap(), b"original");
    }

    #[test]
    fn combined_stream_needs_no_merge() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_ref("v1", "My Video");

        let provider = FakeProvider::new(Resolved::Video(video.clone()), vec![combined_480()]);
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        let outcome = pipe.download_single(&video).unwrap();

        assert_eq!(outcome, Outcome::Placed);
        assert_eq!(provider.fetch_count(), 1);
        assert_eq!(*muxer.mux_calls.lock().unwrap(), 0);
        assert!(dir.path().join("My Video.mp4").exists());
    }

    #[test]
    fn split_download_merges_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_ref("v1", "My Video");

        let provider = FakeProvider::new(Resolved::Video(video.clone()), split_480());
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        let outcome = pipe.download_single(&video).unwrap();

        assert_eq!(outcome, Outcome::Placed);
        assert_eq!(provider.fetch_count(), 2);
        assert_eq!(*muxer.mux_calls.lock().unwrap(), 1);

        // The temporaries are gone, only the merged file remains
        assert!(!dir.path().join(TEMP_VIDEO).exists());
        assert!(!dir.path().join(TEMP_AUDIO).exists());
        assert!(!dir.path().join(MERGED_OUTPUT).exists());
        assert_eq!(fs::read(dir.path().join("My Video.mp4")).unwrap(), b"v480a");
    }

    #[test]
    fn sanitized_destination_name() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_ref("v1", r#"What? A "Title": <Part 1/2>"#);

        let provider = FakeProvider::new(Resolved::Video(video.clone()), vec![combined_480()]);
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        pipe.download_single(&video).unwrap();

        assert!(dir.path().join("What- A -Title-- -Part 1-2-.mp4").exists());
    }

    #[test]
    fn transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_ref("v1", "My Video");

        let provider = FakeProvider::new(Resolved::Video(video.clone()), vec![combined_480()]);
        *provider.flaky_failures.lock().unwrap() = 2;
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        let outcome = pipe.download_single(&video).unwrap();

        assert_eq!(outcome, Outcome::Placed);
        assert_eq!(provider.fetch_count(), 3);
    }

    #[test]
    fn exhausted_retries_fail_the_item() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_ref("v1", "My Video");

        let mut provider =
            FakeProvider::new(Resolved::Video(video.clone()), vec![combined_480()]);
        provider.broken_ids.push("v1".to_string());
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        let res = pipe.download_single(&video);

        assert!(res.is_err());
        assert_eq!(provider.fetch_count(), 5);
        assert!(!dir.path().join("My Video.mp4").exists());
    }

    #[test]
    fn unmatched_request_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let video = video_ref("v1", "My Video");

        // Only a video-only stream, no audio to pair it with
        let provider = FakeProvider::new(
            Resolved::Video(video.clone()),
            vec![stream("v720", Some(Resolution::P720), true, false)],
        );
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        let res = pipe.download_single(&video);
        assert!(matches!(res, Err(Error::UnavailableStream)));
        assert_eq!(provider.fetch_count(), 0);
    }

    fn three_item_playlist() -> PlaylistContext {
        PlaylistContext {
            title: "My Playlist".to_string(),
            videos: vec![
                video_ref("v1", "First"),
                video_ref("v2", "Second"),
                video_ref("v3", "Third"),
            ],
        }
    }

    #[test]
    fn playlist_numbering_survives_skips() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = three_item_playlist();

        // The second item is already on disk
        let out_dir = dir.path().join("My-Playlist");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("2. Second.mp4"), b"kept").unwrap();

        let provider =
            FakeProvider::new(Resolved::Playlist(playlist), vec![combined_480()]);
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        pipe.run("https://example.com/playlist?list=PL1").unwrap();

        assert!(out_dir.join("1. First.mp4").exists());
        assert!(out_dir.join("3. Third.mp4").exists());
        assert_eq!(fs::read(out_dir.join("2. Second.mp4")).unwrap(), b"kept");
        // Only the two missing items were transferred
        assert_eq!(provider.fetch_count(), 2);
    }

    #[test]
    fn playlist_aborts_on_failure_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = three_item_playlist();

        let mut provider =
            FakeProvider::new(Resolved::Playlist(playlist), vec![combined_480()]);
        provider.broken_ids.push("v1".to_string());
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), false);

        let res = pipe.run("https://example.com/playlist?list=PL1");

        assert!(res.is_err());
        assert!(!dir.path().join("My-Playlist").join("2. Second.mp4").exists());
    }

    #[test]
    fn playlist_keeps_going_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = three_item_playlist();

        let mut provider =
            FakeProvider::new(Resolved::Playlist(playlist), vec![combined_480()]);
        provider.broken_ids.push("v2".to_string());
        let muxer = FakeMuxer::default();
        let pipe = pipeline(&provider, &muxer, dir.path(), true);

        pipe.run("https://example.com/playlist?list=PL1").unwrap();

        let out_dir = dir.path().join("My-Playlist");
        assert!(out_dir.join("1. First.mp4").exists());
        assert!(!out_dir.join("2. Second.mp4").exists());
        assert!(out_dir.join("3. Third.mp4").exists());
    }
}
