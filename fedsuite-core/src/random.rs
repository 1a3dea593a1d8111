//! Random fixture content

use rand::distributions::{Alphanumeric, DistString};

/// Shortest string that keeps fixture names from colliding.
pub const MIN_RANDOM_LEN: usize = 5;

/// Random alphanumeric string of at least [`MIN_RANDOM_LEN`] characters.
pub fn random_string(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), len.max(MIN_RANDOM_LEN))
}

/// Name usable for communities and usernames, which must start with a letter.
pub fn random_name(len: usize) -> String {
    let len = len.max(MIN_RANDOM_LEN);
    let mut rng = rand::thread_rng();
    let first = loop {
        let c = Alphanumeric.sample_string(&mut rng, 1);
        if c.chars().all(|c| c.is_ascii_alphabetic()) {
            break c.to_ascii_lowercase();
        }
    };
    first + &Alphanumeric.sample_string(&mut rng, len - 1).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_minimum_length_enforced() {
        assert_eq!(random_string(0).len(), MIN_RANDOM_LEN);
        assert_eq!(random_string(3).len(), MIN_RANDOM_LEN);
        assert_eq!(random_string(12).len(), 12);
    }

    #[test]
    fn test_alphabet() {
        let s = random_string(200);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_names_start_with_letter() {
        for _ in 0..50 {
            let name = random_name(10);
            assert_eq!(name.len(), 10);
            assert!(name.starts_with(|c: char| c.is_ascii_lowercase()));
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_no_collisions_in_small_sample() {
        let set: HashSet<String> = (0..1000).map(|_| random_string(10)).collect();
        assert_eq!(set.len(), 1000);
    }
}
