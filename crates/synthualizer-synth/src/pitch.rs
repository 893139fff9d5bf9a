//! Pitch conversions.
//!
//! Equal temperament with A4 (MIDI 69) = 440 Hz and middle C (MIDI 60) = C4.

/// Convert a MIDI note number to frequency in Hz.
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (f32::from(note) - 69.0) / 12.0)
}

/// Convert a frequency in Hz to a (fractional) MIDI note number.
#[inline]
pub fn freq_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * libm::log2f(freq / 440.0)
}

/// Parse a note name such as `C4`, `F#2`, `Bb3` or `C-1` into a MIDI number.
///
/// Returns `None` for malformed names or notes outside `0..=127`.
///
/// # Example
///
/// ```rust
/// use synthualizer_synth::pitch::{midi_to_freq, parse_note};
///
/// assert_eq!(parse_note("A4"), Some(69));
/// assert_eq!(parse_note("C#2"), Some(37));
/// assert!((midi_to_freq(parse_note("C2").unwrap()) - 65.41).abs() < 0.01);
/// ```
pub fn parse_note(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    let octave: i32 = octave.parse().ok()?;
    let note = octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(base + accidental)?;
    u8::try_from(note).ok().filter(|n| *n <= 127)
}

/// Parse a note name straight to Hz.
pub fn note_to_freq(name: &str) -> Option<f32> {
    parse_note(name).map(midi_to_freq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_freq_a4() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-3);
        assert!((midi_to_freq(81) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn test_freq_to_midi_roundtrip() {
        for note in [21_u8, 60, 69, 108] {
            let back = freq_to_midi(midi_to_freq(note));
            assert!((back - f32::from(note)).abs() < 1e-3, "note {note} -> {back}");
        }
    }

    #[test]
    fn test_parse_note_names() {
        assert_eq!(parse_note("C4"), Some(60));
        assert_eq!(parse_note("c4"), Some(60));
        assert_eq!(parse_note("Db4"), Some(61));
        assert_eq!(parse_note("B2"), Some(47));
        assert_eq!(parse_note("C-1"), Some(0));
        assert_eq!(parse_note("G9"), Some(127));
    }

    #[test]
    fn test_parse_note_rejects() {
        assert_eq!(parse_note(""), None);
        assert_eq!(parse_note("H2"), None);
        assert_eq!(parse_note("C"), None);
        assert_eq!(parse_note("G#9"), None);
        assert_eq!(parse_note("Cb-1"), None);
    }

    #[test]
    fn test_parse_note_huge_octave_is_none() {
        assert_eq!(parse_note("C200000000"), None);
        assert_eq!(parse_note("B2147483647"), None);
        assert_eq!(parse_note("Db-2147483648"), None);
        assert_eq!(parse_note("A99999999999"), None);
    }
}
