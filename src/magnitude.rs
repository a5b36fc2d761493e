// =============================================================================
// magnitude.rs — PERFORMANCE TEXT TO A NUMBER
// =============================================================================
//
// Marks come off the page as text. Field events and sprints are plain
// decimals ("7.45", "12.08"); anything longer than a minute is clock time
// ("1:02.3", "1:05:12"). The database wants one number so the stats surface
// can sort and take quantiles: metres/points as-is, times in seconds.
// =============================================================================

use crate::error::ConversionError;

/// Convert a mark to its numeric magnitude.
///
/// Tries a plain number first, then `[[h:]m:]s[.frac]` clock time.
pub fn to_magnitude(text: &str) -> Result<f64, ConversionError> {
    let trimmed = text.trim();
    let failure = || ConversionError {
        value: text.to_string(),
    };

    if trimmed.is_empty() {
        return Err(failure());
    }

    if let Ok(value) = trimmed.parse::<f64>() {
        return if value.is_finite() { Ok(value) } else { Err(failure()) };
    }

    parse_clock(trimmed).ok_or_else(failure)
}

/// "1:02.3" -> 62.3, "1:05:12" -> 3912.0. Minutes and seconds after the
/// leading unit must be below 60.
fn parse_clock(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let (seconds_text, units) = parts.split_last()?;
    let seconds = parse_seconds(seconds_text)?;
    if seconds >= 60.0 {
        return None;
    }

    let mut total = 0.0;
    for (i, unit) in units.iter().enumerate() {
        let value = parse_whole(unit)?;
        // Only the leading unit may exceed 59.
        if i > 0 && value >= 60 {
            return None;
        }
        total = total * 60.0 + value as f64;
    }

    Some(total * 60.0 + seconds)
}

fn parse_whole(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_seconds(text: &str) -> Option<f64> {
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    parse_whole(whole)?;
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_plain_numbers() {
        assert!(close(to_magnitude("7.45").unwrap(), 7.45));
        assert!(close(to_magnitude(" 12 ").unwrap(), 12.0));
    }

    #[test]
    fn test_clock_times() {
        assert!(close(to_magnitude("1:02.3").unwrap(), 62.3));
        assert!(close(to_magnitude("4:59").unwrap(), 299.0));
        assert!(close(to_magnitude("1:05:12").unwrap(), 3912.0));
        assert!(close(to_magnitude("2:31:07.5").unwrap(), 9067.5));
        assert!(close(to_magnitude("75:10").unwrap(), 4510.0));
    }

    #[test]
    fn test_garbage_is_a_conversion_error() {
        for bad in ["", "DNF", "1:2:3:4", "1:60", "1:xx", "1::02", "NaN", "inf", "1:02.x"] {
            assert_eq!(
                to_magnitude(bad),
                Err(ConversionError { value: bad.to_string() }),
                "{bad}"
            );
        }
    }
}
