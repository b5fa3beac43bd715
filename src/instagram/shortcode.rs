//! Shortcode <-> numeric media id conversion.
//!
//! A shortcode is the media pk written in base 64 with the URL-safe alphabet,
//! most significant digit first. Both directions are computed locally.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Private shares append a 28 character suffix that is not part of the pk.
const PRIVATE_SUFFIX_LEN: usize = 28;

/// Encode a numeric media id as a shortcode.
pub fn media_id_to_shortcode(mut media_id: u64) -> String {
    if media_id == 0 {
        return (ALPHABET[0] as char).to_string();
    }
    let mut digits = Vec::new();
    while media_id > 0 {
        digits.push(ALPHABET[(media_id % 64) as usize]);
        media_id /= 64;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Decode a shortcode into its numeric media id.
///
/// Returns `None` for empty input, characters outside the alphabet, or overflow.
pub fn shortcode_to_media_id(code: &str) -> Option<u64> {
    if !code.is_ascii() {
        return None;
    }
    let code = if code.len() > PRIVATE_SUFFIX_LEN {
        &code[..code.len() - PRIVATE_SUFFIX_LEN]
    } else {
        code
    };
    if code.is_empty() {
        return None;
    }
    code.bytes().try_fold(0u64, |acc, byte| {
        let digit = ALPHABET.iter().position(|&c| c == byte)? as u64;
        acc.checked_mul(64)?.checked_add(digit)
    })
}

/// Numeric pk part of a media id.
///
/// The private API reports ids as `"<pk>_<owner id>"`; the bare pk is accepted as well.
pub fn media_pk(media_id: &str) -> Option<u64> {
    let pk = media_id.split('_').next()?.trim();
    if pk.is_empty() || !pk.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    pk.parse().ok()
}

/// True when `s` is non-empty and made only of ASCII digits.
pub fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// True when `s` could be a shortcode (non-empty, alphabet characters only).
pub fn is_shortcode(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| ALPHABET.contains(&b))
}
