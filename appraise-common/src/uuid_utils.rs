//! UUID utilities

use uuid::Uuid;

/// Length of a HIT identifier in hex characters
pub const HIT_ID_LEN: usize = 8;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a candidate HIT identifier: the first 8 hex digits of a UUIDv4.
///
/// Uniqueness is not guaranteed; callers retry against their store.
pub fn generate_hit_id() -> String {
    let mut id = generate().simple().to_string();
    id.truncate(HIT_ID_LEN);
    id
}

/// Check that a string looks like a HIT identifier
pub fn is_hit_id(s: &str) -> bool {
    s.len() == HIT_ID_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_hit_id_shape() {
        for _ in 0..100 {
            let id = generate_hit_id();
            assert!(is_hit_id(&id), "unexpected id: {}", id);
        }
    }

    #[test]
    fn test_is_hit_id() {
        assert!(is_hit_id("ab12cd34"));
        assert!(!is_hit_id("ab12cd3"));
        assert!(!is_hit_id("AB12CD34"));
        assert!(!is_hit_id("ab12cd3g"));
    }
}
