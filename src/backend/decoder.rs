//! Line decoder for the device's text protocol
//!
//! One command or sample per newline-terminated line:
//!
//! - `toggle` (any case) decodes to [`Command::Toggle`]
//! - `<float> <float> [...]` decodes to a [`Sample`] from the first two tokens
//! - any other non-empty line decodes to [`Event::Malformed`]
//!
//! Blank lines produce no event at all. Decoding is pure: no state, no I/O,
//! and arbitrary input never panics.

use crate::types::{Command, Event, Sample};

/// Decode one line of text
///
/// Returns `None` for blank lines.
pub fn decode_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(cmd) = Command::from_name(line) {
        return Some(Event::Command(cmd));
    }

    let mut tokens = line.split_whitespace();
    let (Some(x), Some(y)) = (tokens.next(), tokens.next()) else {
        return Some(Event::Malformed(line.to_string()));
    };

    match (x.parse::<f64>(), y.parse::<f64>()) {
        (Ok(x), Ok(y)) => Some(Event::Sample(Sample::new(x, y))),
        _ => Some(Event::Malformed(line.to_string())),
    }
}

/// Decode raw bytes received from the device
///
/// Invalid UTF-8 sequences are replaced rather than rejected, so a single
/// corrupted byte only affects the token it lands in.
pub fn decode_bytes(bytes: &[u8]) -> Option<Event> {
    decode_line(&String::from_utf8_lossy(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sample() {
        assert_eq!(
            decode_line("1.5 2.5"),
            Some(Event::Sample(Sample::new(1.5, 2.5)))
        );
    }

    #[test]
    fn test_decode_sample_with_extra_tokens_and_whitespace() {
        assert_eq!(
            decode_line("  -3\t4e1   ignored 99\r\n"),
            Some(Event::Sample(Sample::new(-3.0, 40.0)))
        );
    }

    #[test]
    fn test_decode_toggle_any_case() {
        assert_eq!(decode_line("TOGGLE"), Some(Event::Command(Command::Toggle)));
        assert_eq!(decode_line(" toggle\n"), Some(Event::Command(Command::Toggle)));
        assert_eq!(decode_line("Toggle"), Some(Event::Command(Command::Toggle)));
    }

    #[test]
    fn test_decode_non_numeric() {
        assert_eq!(
            decode_line("abc def"),
            Some(Event::Malformed("abc def".to_string()))
        );
        assert_eq!(
            decode_line("1.0 two"),
            Some(Event::Malformed("1.0 two".to_string()))
        );
    }

    #[test]
    fn test_decode_too_few_tokens() {
        assert_eq!(decode_line("1.0"), Some(Event::Malformed("1.0".to_string())));
        // "toggle" followed by anything else is not a command
        assert_eq!(
            decode_line("toggle now"),
            Some(Event::Malformed("toggle now".to_string()))
        );
    }

    #[test]
    fn test_decode_blank() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   \r\n"), None);
    }

    #[test]
    fn test_decode_bytes_with_invalid_utf8() {
        assert_eq!(
            decode_bytes(b"1 2\n"),
            Some(Event::Sample(Sample::new(1.0, 2.0)))
        );
        assert!(decode_bytes(&[0xff, b' ', b'2']).unwrap().is_malformed());
        assert_eq!(decode_bytes(&[0xfe, 0xff]).map(|e| e.is_malformed()), Some(true));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode_bytes(&bytes);
        }

        #[test]
        fn test_formatted_pairs_decode_to_samples(
            x in -1.0e6f64..1.0e6,
            y in -1.0e6f64..1.0e6,
        ) {
            let line = format!("{} {}", x, y);
            prop_assert_eq!(decode_line(&line), Some(Event::Sample(Sample::new(x, y))));
        }

        #[test]
        fn test_samples_only_from_two_numeric_tokens(line in "[a-z0-9. -]{0,24}") {
            if let Some(Event::Sample(_)) = decode_line(&line) {
                let tokens: Vec<_> = line.split_whitespace().collect();
                prop_assert!(tokens.len() >= 2);
                prop_assert!(tokens[0].parse::<f64>().is_ok());
                prop_assert!(tokens[1].parse::<f64>().is_ok());
            }
        }
    }
}
