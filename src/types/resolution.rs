use std::{fmt::Display, str::FromStr};

use clap::ValueEnum;

/// The fixed set of resolutions a user may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Resolution {
    #[value(name = "240p")]
    P240,
    #[value(name = "360p")]
    P360,
    #[value(name = "480p")]
    P480,
    #[value(name = "720p")]
    P720,
    #[value(name = "1080p")]
    P1080,
    #[value(name = "1440p")]
    P1440,
    #[value(name = "2160p")]
    P2160,
}

impl Resolution {
    pub const ALL: [Resolution; 7] = [
        Resolution::P240,
        Resolution::P360,
        Resolution::P480,
        Resolution::P720,
        Resolution::P1080,
        Resolution::P1440,
        Resolution::P2160,
    ];

    /// The vertical pixel count, as reported by the provider metadata.
    pub fn height(self) -> u32 {
        match self {
            Resolution::P240 => 240,
            Resolution::P360 => 360,
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
            Resolution::P1440 => 1440,
            Resolution::P2160 => 2160,
        }
    }

    /// Map a provider-reported height back to a known resolution.
    /// Return None for heights outside the fixed set.
    pub fn from_height(height: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|res| res.height() == height)
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}p", self.height())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let height = s
            .trim()
            .trim_end_matches(['p', 'P'])
            .parse::<u32>()
            .map_err(|_| format!("'{s}' is not a resolution"))?;

        Self::from_height(height).ok_or_else(|| format!("'{s}' is not a supported resolution"))
    }
}
