mod command;
mod ffmpeg;
mod ytdl;

pub use ffmpeg::{Ffmpeg, Muxer};
pub use ytdl::{MediaProvider, Ytdl};
