//! Helpers for text rendered by the chat client's message formatter.

/// Keycap markers for options 1 through 10.
const NUMBER_EMOJI: [&str; 10] = [
    "1\u{fe0f}\u{20e3}",
    "2\u{fe0f}\u{20e3}",
    "3\u{fe0f}\u{20e3}",
    "4\u{fe0f}\u{20e3}",
    "5\u{fe0f}\u{20e3}",
    "6\u{fe0f}\u{20e3}",
    "7\u{fe0f}\u{20e3}",
    "8\u{fe0f}\u{20e3}",
    "9\u{fe0f}\u{20e3}",
    "\u{1f51f}",
];

pub const MAX_OPTIONS: usize = NUMBER_EMOJI.len();

/// Marker for a 1-indexed option number, if one exists.
pub fn number_emoji(option: usize) -> Option<&'static str> {
    option.checked_sub(1).and_then(|i| NUMBER_EMOJI.get(i)).copied()
}

/// The chat formatter treats `%` as the start of a format directive, so a
/// literal percent sign has to be doubled to survive rendering.
pub fn escape_percent(text: &str) -> String {
    text.replace('%', "%%")
}
