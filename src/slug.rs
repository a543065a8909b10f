//! Random public slugs and generated usernames

use rand::Rng;

const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const ADJECTIVES: &[&str] = &[
    "brave", "curious", "daring", "eager", "gentle", "happy", "lively", "lucky", "merry",
    "nimble", "quiet", "sunny", "swift", "wild", "wandering",
];

const NOUNS: &[&str] = &[
    "falcon", "otter", "explorer", "voyager", "comet", "summit", "harbor", "meadow", "nomad",
    "pilot", "ranger", "sparrow", "tiger", "trail", "wave",
];

/// Random lowercase alphanumeric slug. Uniqueness is left to the gateway.
pub fn generate_slug(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SLUG_ALPHABET[rng.gen_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// Username from a display name plus a random suffix, or adjective+noun
/// when the name has nothing usable in it.
pub fn generate_username(display_name: Option<&str>) -> String {
    let mut rng = rand::thread_rng();
    let base = display_name
        .map(slugify)
        .filter(|base| !base.is_empty())
        .unwrap_or_else(|| {
            let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
            let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
            format!("{}{}", adjective, noun)
        });
    format!("{}{}", base, rng.gen_range(100..10_000))
}

fn slugify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(20)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_url_safe_and_sized() {
        let slug = generate_slug(10);
        assert_eq!(slug.len(), 10);
        assert!(slug.bytes().all(|b| SLUG_ALPHABET.contains(&b)));
        assert_ne!(generate_slug(10), slug);
    }

    #[test]
    fn username_from_name() {
        let username = generate_username(Some("Ada Lovelace"));
        assert!(username.starts_with("adalovelace"));
        assert!(username["adalovelace".len()..]
            .chars()
            .all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn username_without_usable_name() {
        for name in [None, Some(""), Some("李雷")] {
            let username = generate_username(name);
            assert!(ADJECTIVES.iter().any(|a| username.starts_with(a)));
            assert!(username.chars().last().is_some_and(|c| c.is_ascii_digit()));
        }
    }
}
