//! Normalization of raw media payloads before typed parsing.
//!
//! Reels carry `clips_metadata.original_sound_info`, which the platform often sends
//! as `null`, as an empty object, as an unexpanded proxy placeholder, or with
//! required fields missing. Strict parsing of such payloads fails the whole inbox
//! response, so every payload goes through [`repair`] first.

use serde_json::{Map, Value};

/// Marker key of an unexpanded proxy placeholder object.
const PROXY_MARKER: &str = "_proxy____args";

/// Sound info fields that must exist, defaulted to `{}`.
const OBJECT_FIELDS: &[&str] = &["ig_artist", "consumption_info", "fb_downstream_use_xpost_metadata"];

/// Sound info fields that must exist, defaulted to `""`.
const STRING_FIELDS: &[&str] = &[
    "audio_asset_id",
    "dash_manifest",
    "duration_in_ms",
    "original_media_id",
    "progressive_download_url",
    "time_created",
];

/// Repair every media object found anywhere inside `raw`.
///
/// Pure: the input is consumed and a repaired copy returned. Payloads without
/// `clips_metadata` come back unchanged.
pub fn repair(mut raw: Value) -> Value {
    repair_in_place(&mut raw);
    raw
}

fn repair_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(clips)) = map.get_mut("clips_metadata") {
                repair_clips_metadata(clips);
            }
            for child in map.values_mut() {
                repair_in_place(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                repair_in_place(item);
            }
        }
        _ => {}
    }
}

fn repair_clips_metadata(clips: &mut Map<String, Value>) {
    let remove = match clips.get("original_sound_info") {
        None => return,
        Some(Value::Null) => true,
        Some(Value::Object(info)) => info.is_empty() || info.contains_key(PROXY_MARKER),
        Some(_) => false,
    };
    if remove {
        log::debug!("Dropping unusable clips_metadata.original_sound_info");
        clips.remove("original_sound_info");
        return;
    }

    let Some(Value::Object(info)) = clips.get_mut("original_sound_info") else {
        return;
    };

    for field in OBJECT_FIELDS {
        info.entry(*field).or_insert_with(|| Value::Object(Map::new()));
    }
    for field in STRING_FIELDS {
        info.entry(*field).or_insert_with(|| Value::String(String::new()));
    }

    if let Some(Value::Object(artist)) = info.get_mut("ig_artist") {
        artist
            .entry("profile_pic_id")
            .or_insert_with(|| Value::String(String::new()));
    }

    let placeholder_title = matches!(
        info.get("original_audio_title"),
        Some(Value::Object(title)) if title.contains_key(PROXY_MARKER)
    );
    if placeholder_title {
        info.insert("original_audio_title".to_string(), Value::String("Unknown".to_string()));
    }
}
