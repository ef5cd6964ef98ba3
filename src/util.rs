//! Miscellaneous utilities.

/// Get the current time, for run statistics.
pub fn now() -> time::Instant {
    time::Instant::now()
}

/// Number of UTF-8 codepoints in `bytes`, used as the display width in
/// table mode. Lead and ASCII bytes count one, continuation bytes count
/// zero, and a malformed byte counts one like any other lead byte. We
/// never decode: alignment only needs a count.
pub fn display_width(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b & 0xC0 != 0x80).count()
}

/// Try to read `bytes` as a floating-point number. ASCII whitespace
/// around the digits is tolerated; anything else is a `None`, never a
/// panic.
pub fn parse_number(bytes: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(bytes).ok()?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok()
}
