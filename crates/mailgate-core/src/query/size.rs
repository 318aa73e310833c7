//! Human-readable byte sizes.

const UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Formats a byte count, moving to the next unit once the value exceeds
/// 0.9 of it. Two decimals at most, trailing zeros dropped.
///
/// `921` is `921B`, `922` is `0.9kB`, `1023` is `1kB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn human_file_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value / 1024.0 > 0.9 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}{}", UNITS[unit])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_rollover_at_point_nine() {
        assert_eq!(human_file_size(0), "0B");
        assert_eq!(human_file_size(921), "921B");
        assert_eq!(human_file_size(922), "0.9kB");
        assert_eq!(human_file_size(1023), "1kB");
        assert_eq!(human_file_size(1024), "1kB");
        assert_eq!(human_file_size(1536), "1.5kB");
        assert_eq!(human_file_size(1_048_576), "1MB");
        assert_eq!(human_file_size(5_000_000), "4.77MB");
    }

    #[test]
    fn test_largest_values() {
        assert!(human_file_size(u64::MAX).ends_with("EB"));
    }

    fn split(formatted: &str) -> (f64, &str) {
        let at = formatted.find(|c: char| c.is_ascii_alphabetic()).unwrap();
        (formatted[..at].parse().unwrap(), &formatted[at..])
    }

    proptest! {
        #[test]
        fn prop_small_counts_stay_bytes(n in 0u64..=921) {
            prop_assert_eq!(human_file_size(n), format!("{n}B"));
        }

        #[test]
        fn prop_scaled_value_in_band(n in 922u64..) {
            let formatted = human_file_size(n);
            let (value, unit) = split(&formatted);
            prop_assert_ne!(unit, "B");
            prop_assert!((0.9..=921.6).contains(&value), "{} out of band", formatted);
        }
    }
}
