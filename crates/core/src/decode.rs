//! Repair of the xkcd API's text encoding.
//!
//! Non-ASCII text in the JSON API is frequently UTF-8 whose bytes were read
//! back as single-byte characters and encoded again, sometimes several times
//! over (`é` arrives as `Ã©`, or worse). Some fields also carry HTML
//! entities.

use html_escape::decode_html_entities;

/// Deepest nesting of the mis-encoding seen upstream.
const MAX_ROUNDS: usize = 10;

/// Undoes repeated UTF-8-as-Latin-1 encoding, then HTML entities.
///
/// Each round reinterprets the code points as bytes and decodes them as
/// UTF-8. Rounds stop at the first string that is not a valid byte string
/// (a code point above U+00FF, or bytes that are not UTF-8), when nothing
/// changes any more, or after ten rounds. Never fails.
pub fn fix_encoding(text: &str) -> String {
    let mut current = text.to_string();

    for _ in 0..MAX_ROUNDS {
        let Some(bytes) = current.chars().map(|c| u8::try_from(c).ok()).collect::<Option<Vec<u8>>>() else {
            break;
        };
        match String::from_utf8(bytes) {
            Ok(decoded) if decoded != current => current = decoded,
            _ => break,
        }
    }

    decode_html_entities(&current).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes `text` as UTF-8 and reads the bytes back as Latin-1.
    fn mis_encode(text: &str) -> String {
        text.bytes().map(char::from).collect()
    }

    #[test]
    fn test_double_encoded() {
        let twice = mis_encode(&mis_encode("é"));
        assert_eq!(twice, "Ã\u{83}Â©");
        assert_eq!(fix_encoding(&twice), "é");
    }

    #[test]
    fn test_single_encoded() {
        assert_eq!(fix_encoding(&mis_encode("Clichéd")), "Clichéd");
    }

    #[test]
    fn test_deeply_encoded() {
        let mut text = "¡play games! Kryptonite™".to_string();
        for _ in 0..6 {
            text = mis_encode(&text);
        }
        assert_eq!(fix_encoding(&text), "¡play games! Kryptonite™");
    }

    #[test]
    fn test_ascii_unchanged() {
        let alt = "I wrote 20 short programs in Python yesterday.  It was wonderful.";
        assert_eq!(fix_encoding(alt), alt);
    }

    #[test]
    fn test_already_correct_text_unchanged() {
        assert_eq!(fix_encoding("é"), "é");
        assert_eq!(fix_encoding("日本語"), "日本語");
    }

    #[test]
    fn test_html_entities() {
        assert_eq!(fix_encoding("Clich&eacute;d Exchanges"), "Clichéd Exchanges");
        assert_eq!(fix_encoding("9-11 &lt;-&gt; Trent Lott!"), "9-11 <-> Trent Lott!");
    }

    #[test]
    fn test_entities_after_mis_encoding() {
        let text = mis_encode("caf\u{e9} &amp; bar");
        assert_eq!(fix_encoding(&text), "café & bar");
    }
}
