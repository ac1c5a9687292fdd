use crate::{
    result::{Error, Result},
    types::{Resolution, StreamDescriptor},
};

/// What the selector decided to download for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One stream carrying both audio and video. No merge step.
    Combined(StreamDescriptor),

    /// Separate elementary streams that must be muxed afterwards.
    Split {
        video: StreamDescriptor,
        audio: StreamDescriptor,
    },
}

/// Pick the streams to download for a requested resolution.
///
/// Preference order:
/// 1. a combined stream at exactly the requested resolution,
/// 2. a video-only stream at that resolution paired with an audio-only stream,
/// 3. the highest-resolution combined stream,
/// 4. the highest-resolution video-only stream paired with an audio-only stream.
///
/// Within a rule, ties go to the first stream in provider order.
pub fn select_streams(streams: &[StreamDescriptor], want: Resolution) -> Result<Selection> {
    let audio = streams.iter().find(|s| s.is_audio_only());

    if let Some(combined) = streams
        .iter()
        .find(|s| s.is_combined() && s.resolution == Some(want))
    {
        return Ok(Selection::Combined(combined.clone()));
    }

    if let Some(audio) = audio {
        if let Some(video) = streams
            .iter()
            .find(|s| s.is_video_only() && s.resolution == Some(want))
        {
            return Ok(Selection::Split {
                video: video.clone(),
                audio: audio.clone(),
            });
        }
    }

    // Nothing matches the request, fall back to the best the provider has
    if let Some(combined) = streams
        .iter()
        .filter(|s| s.is_combined())
        .max_by_key(|s| s.resolution)
    {
        return Ok(Selection::Combined(combined.clone()));
    }

    if let Some(audio) = audio {
        if let Some(video) = streams
            .iter()
            .filter(|s| s.is_video_only())
            .max_by_key(|s| s.resolution)
        {
            return Ok(Selection::Split {
                video: video.clone(),
                audio: audio.clone(),
            });
        }
    }

    Err(Error::UnavailableStream)
}
