use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

/// Characters that are illegal in filenames on at least one
/// supported filesystem.
const ILLEGAL: &str = r#"[<>:"/\\|?*]"#;

/// Anything that is not alphanumeric or underscore, used to build
/// directory names out of playlist titles.
const NON_WORD: &str = r"\W+";

static RE_ILLEGAL: OnceLock<Regex> = OnceLock::new();
static RE_NON_WORD: OnceLock<Regex> = OnceLock::new();

/// Replace every filesystem-illegal character with `-`,
/// leaving all other characters unchanged.
pub fn sanitize_filename(name: &str) -> Cow<'_, str> {
    RE_ILLEGAL
        .get_or_init(|| Regex::new(ILLEGAL).unwrap())
        .replace_all(name, "-")
}

/// Build a directory name out of a playlist title: collapse every
/// non-word run into a single `-`, then sanitize the result.
pub fn sanitize_dirname(title: &str) -> String {
    let collapsed = RE_NON_WORD
        .get_or_init(|| Regex::new(NON_WORD).unwrap())
        .replace_all(title, "-");

    sanitize_filename(&collapsed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_each_illegal_character() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a-b-c-d-e-f-g-h-i-j");
    }

    #[test]
    fn leaves_legal_characters_unchanged() {
        let name = "Some Video Title (Official) [4K] #1.mp4";
        assert_eq!(sanitize_filename(name), name);
    }

    #[test]
    fn keeps_unicode() {
        assert_eq!(sanitize_filename("日本語のタイトル.mp4"), "日本語のタイトル.mp4");
    }

    #[test]
    fn dirname_collapses_non_word_runs() {
        assert_eq!(sanitize_dirname("My Cool -- Playlist!!"), "My-Cool-Playlist-");
        assert_eq!(sanitize_dirname("plain_name"), "plain_name");
    }
}
