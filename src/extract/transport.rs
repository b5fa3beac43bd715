//! Encoding records for the downstream consumer.
//!
//! Output is ASCII-only JSON (non-ASCII escaped as `\uXXXX`). Long captions and
//! image URLs are cut before encoding; a payload that is still too large, or that
//! fails to encode, is replaced by a reduced record.

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter, Serializer};
use std::io;

use crate::core::config::record::{
    CAPTION_MAX_CHARS, ELLIPSIS, FALLBACK_MAX_IMAGES, FALLBACK_TEXT_MAX_CHARS, IMAGE_URL_MAX_CHARS,
    MAX_PAYLOAD_BYTES,
};
use crate::extract::record::ContentRecord;
use crate::instagram::MediaKind;

/// Cut `s` to `max` characters, appending the ellipsis when anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}{}", &s[..byte_idx], ELLIPSIS),
        None => s.to_string(),
    }
}

/// Cut `s` to `max` characters without a marker.
fn cut_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Copy of `record` with caption and image URLs bounded for transport.
pub fn bounded(record: &ContentRecord) -> ContentRecord {
    ContentRecord {
        caption: truncate_chars(&record.caption, CAPTION_MAX_CHARS),
        image_urls: record
            .image_urls
            .iter()
            .map(|url| truncate_chars(url, IMAGE_URL_MAX_CHARS))
            .collect(),
        ..record.clone()
    }
}

/// Reduced record sent when the full one cannot be delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackRecord {
    pub username: String,
    pub caption: String,
    pub media_type: MediaKind,
    pub url: String,
    pub pk: String,
    /// Placeholder names (`Image 1`, ...) instead of URLs
    pub image_urls: Vec<String>,
}

impl From<&ContentRecord> for FallbackRecord {
    fn from(record: &ContentRecord) -> Self {
        Self {
            username: record.username.clone(),
            caption: cut_chars(&record.caption, FALLBACK_TEXT_MAX_CHARS),
            media_type: record.media_type,
            url: cut_chars(&record.url, FALLBACK_TEXT_MAX_CHARS),
            pk: record.pk.clone(),
            image_urls: (1..=record.image_urls.len().min(FALLBACK_MAX_IMAGES))
                .map(|i| format!("Image {}", i))
                .collect(),
        }
    }
}

/// Compact single-line payload for the stdout protocol.
pub fn encode_line(record: &ContentRecord) -> serde_json::Result<String> {
    match to_ascii_json(&bounded(record), false) {
        Ok(json) if json.len() <= MAX_PAYLOAD_BYTES => {
            log::debug!("JSON output size: {} bytes", json.len());
            Ok(json)
        }
        Ok(json) => {
            log::warn!(
                "Record for {} is {} bytes (max {}), sending reduced record",
                record.url,
                json.len(),
                MAX_PAYLOAD_BYTES
            );
            to_ascii_json(&FallbackRecord::from(record), false)
        }
        Err(e) => {
            log::error!("Failed to serialize record to JSON: {}", e);
            to_ascii_json(&FallbackRecord::from(record), false)
        }
    }
}

/// Pretty ASCII JSON of the bounded record, as printed by single-shot extraction.
pub fn render_extract(record: &ContentRecord) -> serde_json::Result<String> {
    to_ascii_json(&bounded(record), true)
}

/// Serialize with every non-ASCII character escaped.
pub fn to_ascii_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> serde_json::Result<String> {
    let mut out = Vec::new();
    if pretty {
        let mut ser = Serializer::with_formatter(&mut out, AsciiFormatter(PrettyFormatter::new()));
        value.serialize(&mut ser)?;
    } else {
        let mut ser = Serializer::with_formatter(&mut out, AsciiFormatter(CompactFormatter));
        value.serialize(&mut ser)?;
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Wraps a formatter and escapes non-ASCII string content.
struct AsciiFormatter<F>(F);

impl<F: Formatter> Formatter for AsciiFormatter<F> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..idx].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn end_object_key<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object_key(writer)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object_value(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn record() -> ContentRecord {
        ContentRecord {
            username: "author".into(),
            caption: "hello".into(),
            media_type: MediaKind::Photo,
            media_url: "https://cdn/a.jpg".into(),
            image_urls: vec!["https://cdn/a.jpg".into()],
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            url: "https://www.instagram.com/p/X/".into(),
            pk: "1".into(),
        }
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abcd", 3), "abc...");
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
    }

    #[test]
    fn test_long_caption_and_image_url_bounded() {
        let mut long = record();
        long.caption = "c".repeat(1500);
        long.image_urls = vec!["u".repeat(500), "short".into()];
        let out = bounded(&long);
        assert_eq!(out.caption.chars().count(), 1003);
        assert!(out.caption.ends_with("..."));
        assert_eq!(&out.caption[..1000], "c".repeat(1000));
        assert_eq!(out.image_urls[0].chars().count(), 403);
        assert_eq!(&out.image_urls[0][..400], "u".repeat(400));
        assert_eq!(out.image_urls[1], "short");
    }

    #[test]
    fn test_ascii_escaping() {
        let json = to_ascii_json(&"café 😀", false).unwrap();
        assert_eq!(json, r#""caf\u00e9 \ud83d\ude00""#);
        assert!(json.is_ascii());
    }

    #[test]
    fn test_encode_line_is_compact_ascii() {
        let mut rec = record();
        rec.caption = "línea\nnueva".into();
        let line = encode_line(&rec).unwrap();
        assert!(line.is_ascii());
        assert!(!line.contains('\n'));
        let back: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(back["caption"], "línea\nnueva");
        assert_eq!(back["timestamp"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_oversized_payload_replaced_by_fallback() {
        let mut rec = record();
        rec.caption = "x".repeat(900);
        rec.image_urls = (0..200).map(|i| format!("https://cdn/{}/{}", i, "p".repeat(380))).collect();
        let line = encode_line(&rec).unwrap();
        assert!(line.len() <= MAX_PAYLOAD_BYTES);
        let back: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(back["image_urls"], serde_json::json!(["Image 1", "Image 2", "Image 3"]));
        assert_eq!(back["caption"].as_str().unwrap().chars().count(), 200);
        assert!(back.get("media_url").is_none());
    }

    #[test]
    fn test_render_extract_is_bounded() {
        let mut long = record();
        long.caption = "é".repeat(1500);
        long.image_urls = vec!["u".repeat(500)];
        let json = render_extract(&long).unwrap();
        assert!(json.is_ascii());
        assert!(json.contains('\n'));
        let back: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back["caption"], format!("{}...", "é".repeat(1000)));
        assert_eq!(back["image_urls"][0], format!("{}...", "u".repeat(400)));
    }

    #[test]
    fn test_pretty_output_indents() {
        let json = to_ascii_json(&record(), true).unwrap();
        assert!(json.contains("\n  \"username\": \"author\""));
    }
}
