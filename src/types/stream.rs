use super::Resolution;

/// One downloadable variant of a video, as described by the provider.
///
/// Read-only data: the fields come straight out of the provider's
/// format listing and are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Provider-side identifier, passed back verbatim when fetching.
    pub format_id: String,

    /// Vertical resolution for variants carrying video.
    /// None for audio-only variants or exotic heights outside the fixed set.
    pub resolution: Option<Resolution>,

    pub has_video: bool,
    pub has_audio: bool,

    /// Total size in bytes when the provider knows it upfront.
    pub filesize: Option<u64>,

    /// Suggested on-disk name, before sanitization.
    pub default_filename: String,
}

impl StreamDescriptor {
    /// Audio and video in a single container, no merge step needed.
    pub fn is_combined(&self) -> bool {
        self.has_video && self.has_audio
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video && !self.has_audio
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }
}

/// An identifier for one playable item, resolved lazily into
/// stream metadata by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub id: String,
    pub title: String,
}

/// A playlist title plus its videos, in source order.
#[derive(Debug, Clone)]
pub struct PlaylistContext {
    pub title: String,
    pub videos: Vec<VideoRef>,
}

/// What a user-supplied URL resolved to.
#[derive(Debug, Clone)]
pub enum Resolved {
    Video(VideoRef),
    Playlist(PlaylistContext),
}
