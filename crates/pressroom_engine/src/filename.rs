use std::fmt::Write;

use sha2::{Digest, Sha256};

const MAX_SLUG_CHARS: usize = 60;

/// Stable id for a run's document: `{slug(name)}-{hash8(seed)}`.
///
/// The id doubles as a storage key prefix, so it only contains lowercase
/// letters, digits and `-`.
pub fn file_id(name: &str, seed: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    let slug = slugify(stem);
    let slug = if slug.is_empty() { "document".to_string() } else { slug };
    format!("{slug}-{}", short_hash(seed))
}

/// Lowercase, `-`-separated slug. Non-ASCII letters and digits are kept.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.chars().count() >= MAX_SLUG_CHARS {
            break;
        }
    }
    slug
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
