//! Source-script guard for translation requests.
//!
//! Documents whose text contains too few characters of the expected source
//! script (Japanese) are not worth an LLM round-trip; the caller writes the
//! original text back with [`annotate_untranslated`] instead.

/// Count Hiragana, Katakana, and CJK Unified Ideograph characters.
pub fn count_source_script_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(*c, '\u{3040}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}'))
        .count()
}

/// Whether `text` carries at least `min_chars` source-script characters.
pub fn has_enough_source_script(text: &str, min_chars: usize) -> bool {
    count_source_script_chars(text) >= min_chars
}

/// Original text followed by a warning that it was left untranslated.
pub fn annotate_untranslated(text: &str, found: usize, min_chars: usize) -> String {
    format!(
        "{text}\n\n[warning: only {found} Japanese characters detected (minimum {min_chars}); translation skipped]"
    )
}

/// English name of a language code, used when prompting the LLM.
///
/// Unknown codes are passed through unchanged.
pub fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "fr" => "French",
        "en" => "English",
        "es" => "Spanish",
        "de" => "German",
        "ja" => "Japanese",
        _ => code,
    }
}
