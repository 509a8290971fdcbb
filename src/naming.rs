//! Centralized naming rules: trip slugs and blob storage keys.
//!
//! ## Slugs
//!
//! Trip URLs use a slug derived from the title. Accents are folded to their
//! base letter, anything that is not an ASCII word character, space or dash
//! is dropped, and runs of whitespace/dashes collapse to a single dash:
//! - `"Pico da Bandeira"` → `"pico-da-bandeira"`
//! - `"Travessia Petrópolis × Teresópolis"` → `"travessia-petropolis-teresopolis"`
//! - `"Camping & Cachoeira!"` → `"camping-cachoeira"`
//!
//! ## Storage keys
//!
//! Uploaded objects are stored under `[folder/]{unix_millis}-{token}.{ext}`.
//! The token is a short base-36 random string. Nothing checks the bucket for
//! an existing key first; two uploads landing on the same millisecond *and*
//! token is possible in principle and surfaces as an upload error, since the
//! blob store refuses to overwrite.

use crate::types::UploadFile;
use rand::Rng;

/// Length of the random part of a storage key.
pub const TOKEN_LEN: usize = 6;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Build a URL-safe slug from free text.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
        // Everything else is dropped without breaking the word.
    }
    slug
}

/// Map accented Latin letters to their unaccented base.
fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Extension used for a file's storage key.
///
/// Text after the last dot of the original name; files without a dot fall
/// back to the MIME subtype (`image/webp` → `webp`).
pub fn file_extension(file: &UploadFile) -> String {
    match file.name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => file
            .mime
            .rsplit_once('/')
            .map(|(_, sub)| sub.to_string())
            .unwrap_or_else(|| "bin".to_string()),
    }
}

/// Generate a random lowercase base-36 token.
pub fn random_token(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Assemble a storage key: `[folder/]{millis}-{token}.{ext}`.
pub fn storage_key(folder: Option<&str>, millis: i64, token: &str, ext: &str) -> String {
    let name = format!("{millis}-{token}.{ext}");
    match folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) {
        Some(folder) => format!("{folder}/{name}"),
        None => name,
    }
}

/// Recover the object key from a public URL, or return the input if it is already a key.
///
/// `https://x.supabase.co/storage/v1/object/public/galeria/momentos/1-a.jpg`
/// with bucket `galeria` → `momentos/1-a.jpg`.
pub fn key_from_public_url<'a>(url_or_key: &'a str, bucket: &str) -> &'a str {
    const PUBLIC_SEGMENT: &str = "/storage/v1/object/public/";
    match url_or_key.split_once(PUBLIC_SEGMENT) {
        Some((_, rest)) => rest
            .strip_prefix(bucket)
            .and_then(|r| r.strip_prefix('/'))
            .unwrap_or(rest),
        None => url_or_key,
    }
}
