//! Text cleanup before synthesis
//!
//! Strips pictographs and markdown decoration so the speech engine only
//! sees words.

use regex::Regex;
use std::sync::LazyLock;

/// Pictographic code points (emoji, dingbats, symbols, flags, joiners)
static PICTOGRAPH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "[",
        "\u{1F000}-\u{1FAFF}",
        "\u{2300}-\u{23FF}",
        "\u{2500}-\u{2BEF}",
        "\u{2640}-\u{2642}",
        "\u{200D}",
        "\u{20E3}",
        "\u{3030}",
        "\u{FE0F}",
        "\u{E0020}-\u{E007F}",
        "]+",
    ))
    .expect("valid regex")
});

static BOLD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));

static ITALIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid regex"));

static CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.+?)`").expect("valid regex"));

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#{1,6}\s").expect("valid regex"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize text for speech
///
/// Removes pictographs, unwraps bold/italic/code markers, drops heading
/// markers and collapses whitespace. Returns an empty string when nothing
/// speakable remains.
#[must_use]
pub fn normalize(text: &str) -> String {
    let text = PICTOGRAPH_REGEX.replace_all(text, "");
    let text = BOLD_REGEX.replace_all(&text, "$1");
    let text = ITALIC_REGEX.replace_all(&text, "$1");
    let text = CODE_REGEX.replace_all(&text, "$1");
    let text = HEADING_REGEX.replace_all(&text, "");
    let text = WHITESPACE_REGEX.replace_all(&text, " ");

    text.trim().to_string()
}
