//! Storage key generation shared by every upload entry point.

use crate::models::object::StorageKey;
use chrono::Utc;
use rand::Rng;
use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Byte budgets for the sanitized name, keeping keys well under the
/// 255-byte file name limit of common filesystems.
const MAX_BASENAME_LEN: usize = 128;
const MAX_EXTENSION_LEN: usize = 16;

/// Source of fresh storage keys.
///
/// The orchestrator only ever asks for a key through this trait, which lets
/// tests pin the clock and the random suffix.
pub trait KeyGenerator: Send + Sync {
    fn generate_key(&self, original_name: &str) -> StorageKey;
}

/// Wall-clock + random suffix generator.
///
/// Remembers the suffixes handed out during the current millisecond and
/// re-draws on a repeat, so a burst of same-named uploads inside one tick
/// still gets distinct keys.
#[derive(Debug, Default)]
pub struct SystemKeyGenerator {
    issued: Mutex<(u64, HashSet<String>)>,
}

impl SystemKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyGenerator for SystemKeyGenerator {
    fn generate_key(&self, original_name: &str) -> StorageKey {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let mut rng = rand::thread_rng();

        let mut guard = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        let (tick, seen) = &mut *guard;
        // A clock that steps backwards keeps the newer tick and its suffixes.
        if millis > *tick {
            *tick = millis;
            seen.clear();
        }
        let millis = *tick;
        let suffix = loop {
            let candidate = random_suffix(&mut rng);
            if seen.insert(candidate.clone()) {
                break candidate;
            }
        };
        drop(guard);

        build_key(millis, &suffix, original_name)
    }
}

/// Generator with a frozen clock and suffix, for reproducible keys.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct FixedKeyGenerator {
    pub millis: u64,
    pub suffix: String,
}

#[cfg(test)]
impl KeyGenerator for FixedKeyGenerator {
    fn generate_key(&self, original_name: &str) -> StorageKey {
        build_key(self.millis, &self.suffix, original_name)
    }
}

/// Assemble a key from its parts. Never fails, whatever the input name.
///
/// Overlong names are cut down to `MAX_BASENAME_LEN` bytes, keeping the
/// extension (itself capped at `MAX_EXTENSION_LEN`).
pub fn build_key(millis: u64, suffix: &str, original_name: &str) -> StorageKey {
    let sanitized = sanitize_filename(original_name);
    let (basename, extension) = split_extension(&sanitized);
    // sanitized names are ASCII, so byte slicing stays on char boundaries
    let basename = &basename[..basename.len().min(MAX_BASENAME_LEN)];
    let extension = &extension[..extension.len().min(MAX_EXTENSION_LEN)];
    StorageKey::from_parts(millis, suffix, &format!("{}{}", basename, extension))
}

/// Map every character outside `[A-Za-z0-9.-]` to `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Split at the last `.`; the extension keeps its dot. No dot means no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

fn random_suffix(rng: &mut impl Rng) -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looks_like_key(key: &str) -> bool {
        let mut parts = key.splitn(3, '_');
        let millis = parts.next().unwrap_or_default();
        let suffix = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();
        !millis.is_empty()
            && millis.chars().all(|c| c.is_ascii_digit())
            && suffix.len() == SUFFIX_LEN
            && suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            && !rest.is_empty()
    }

    #[test]
    fn banner_scenario_produces_expected_key() {
        let key = build_key(1_700_000_000_000, "ab12cd", "My Banner.JPG");
        assert_eq!(key.as_str(), "1700000000000_ab12cd_My_Banner.JPG");
        assert_eq!(
            key.in_folder("covers"),
            "covers/1700000000000_ab12cd_My_Banner.JPG"
        );
    }

    #[test]
    fn sanitizes_everything_outside_the_allowed_set() {
        assert_eq!(sanitize_filename("a b/c\\d?.png"), "a_b_c_d_.png");
        assert_eq!(sanitize_filename("été-01.webp"), "_t_-01.webp");
        assert_eq!(sanitize_filename("already-fine.v2.gif"), "already-fine.v2.gif");
    }

    #[test]
    fn odd_names_never_fail() {
        assert_eq!(build_key(1, "aaaaaa", "").as_str(), "1_aaaaaa_");
        assert_eq!(build_key(1, "aaaaaa", "README").as_str(), "1_aaaaaa_README");
        assert_eq!(build_key(1, "aaaaaa", ".hidden").as_str(), "1_aaaaaa_.hidden");
        assert_eq!(build_key(1, "aaaaaa", "trailing.").as_str(), "1_aaaaaa_trailing.");
    }

    #[test]
    fn long_names_are_truncated_but_keep_their_extension() {
        let name = format!("{}.jpg", "a".repeat(300));
        let key = build_key(1_700_000_000_000, "ab12cd", &name);
        let expected = format!("1700000000000_ab12cd_{}.jpg", "a".repeat(MAX_BASENAME_LEN));
        assert_eq!(key.as_str(), expected);
        assert!(key.in_folder("covers").rsplit('/').next().unwrap().len() < 255);

        let dotted = format!("photo.{}", "x".repeat(300));
        let key = build_key(1, "aaaaaa", &dotted);
        assert_eq!(
            key.as_str(),
            format!("1_aaaaaa_photo.{}", "x".repeat(MAX_EXTENSION_LEN - 1))
        );
    }

    #[test]
    fn backwards_clock_keeps_the_newer_tick() {
        let generator = SystemKeyGenerator::new();
        let future = Utc::now().timestamp_millis() as u64 + 60_000;
        {
            let mut guard = generator.issued.lock().unwrap();
            guard.0 = future;
            guard.1.insert("zzzzzz".to_string());
        }

        let key = generator.generate_key("same.png");
        assert!(key.as_str().starts_with(&format!("{}_", future)));
        let guard = generator.issued.lock().unwrap();
        assert_eq!(guard.0, future);
        assert!(guard.1.contains("zzzzzz"));
        assert_eq!(guard.1.len(), 2);
    }

    #[test]
    fn system_keys_have_the_documented_shape() {
        let generator = SystemKeyGenerator::new();
        for name in ["photo.jpg", "My Banner.JPG", "x", "../../etc/passwd"] {
            let key = generator.generate_key(name);
            assert!(looks_like_key(key.as_str()), "bad key {}", key);
        }
    }

    #[test]
    fn ten_thousand_keys_for_the_same_name_are_unique() {
        let generator = SystemKeyGenerator::new();
        let keys: HashSet<String> = (0..10_000)
            .map(|_| generator.generate_key("same.png").as_str().to_string())
            .collect();
        assert_eq!(keys.len(), 10_000);
    }
}
