//! ASCII range-finder response parsing

/// Extract a distance in metres from a response line.
///
/// Takes the first unsigned decimal number (`"1.234"`, `"D:1.234"`,
/// `"Distance:2.5m"`). A response mentioning `mm` is converted to metres.
pub fn parse_distance(response: &str) -> Option<f64> {
    let bytes = response.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;

    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    let value: f64 = response[start..end].trim_end_matches('.').parse().ok()?;
    if response.contains("mm") {
        Some(value / 1000.0)
    } else {
        Some(value)
    }
}
