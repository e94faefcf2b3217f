//! Tracking-code generation.

use chrono::Utc;
use common::TrackingCode;
use uuid::Uuid;

const PREFIX: &str = "PKG";
const SUFFIX_LEN: usize = 7;

/// Generates a fresh tracking code: `PKG-<unix-millis>-<7-char suffix>`.
///
/// Uniqueness is probabilistic here; the storage unique constraint is the
/// authority, and the creating transaction regenerates on collision.
pub fn generate_tracking_code() -> TrackingCode {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    let suffix = random[..SUFFIX_LEN].to_uppercase();
    TrackingCode::new(format!("{PREFIX}-{millis}-{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_expected_shape() {
        let code = generate_tracking_code();
        let parts: Vec<&str> = code.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PKG");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert_eq!(parts[2], parts[2].to_uppercase());
    }

    #[test]
    fn codes_do_not_repeat_in_practice() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_tracking_code()));
        }
    }
}
