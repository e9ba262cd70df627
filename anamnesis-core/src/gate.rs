//! Follow-up decision for the per-topic question loop.

/// Whether another question should be asked about the current topic.
///
/// A rating of 2 always continues, 1 continues while fewer than two
/// questions have been asked, and anything else stops.
#[must_use]
pub fn should_continue(necessity: u64, asked: u32) -> bool {
    match necessity {
        2 => true,
        1 => asked < 2,
        _ => false,
    }
}

/// Necessity rating from an Oracle reply: the first integer in the text.
pub fn parse_necessity(text: &str) -> Result<u64, String> {
    crate::oracle::first_integer(text).ok_or_else(|| format!("no rating in '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_necessity_always_continues() {
        for asked in 0..10 {
            assert!(should_continue(2, asked));
        }
    }

    #[test]
    fn some_necessity_allows_two_questions() {
        assert!(should_continue(1, 0));
        assert!(should_continue(1, 1));
        assert!(!should_continue(1, 2));
        assert!(!should_continue(1, 7));
    }

    #[test]
    fn zero_or_unknown_stops() {
        for rating in [0, 3, 9, 42, u64::MAX] {
            for asked in 0..4 {
                assert!(!should_continue(rating, asked), "rating {rating}");
            }
        }
    }

    #[test]
    fn parses_first_digit_run() {
        assert_eq!(parse_necessity("2"), Ok(2));
        assert_eq!(parse_necessity("Necessity: 1"), Ok(1));
        assert!(parse_necessity("maybe").is_err());
    }
}
