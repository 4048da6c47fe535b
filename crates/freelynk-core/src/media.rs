//! Media Fallback Codec
//!
//! When the remote schema lacks a rich column (no `video` on `posts`, no
//! `media_url` on `messages`), the write path folds the payload into the
//! supported text column under a reserved string prefix, and the read
//! path transparently unfolds it before rows reach rendering logic.
//!
//! The prefix table is fixed and versioned: adding a new mapping must
//! never change the meaning of an existing prefix.

use base64::Engine;

// ----------------------------------------------------------------------------
// Fallback Table
// ----------------------------------------------------------------------------

/// Rich field a reserved prefix stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackField {
    /// `posts.video`
    PostVideo,
    /// `posts.image`
    PostImage,
    /// `messages.media_url` with audio media type
    MessageAudio,
}

/// One entry of the reserved-prefix table
#[derive(Debug, Clone, Copy)]
pub struct FallbackMapping {
    pub field: FallbackField,
    pub prefix: &'static str,
}

/// Version 1 of the fallback table. Entries are append-only.
pub const FALLBACK_TABLE: &[FallbackMapping] = &[
    FallbackMapping {
        field: FallbackField::PostVideo,
        prefix: "__MEDIA_VIDEO__",
    },
    FallbackMapping {
        field: FallbackField::PostImage,
        prefix: "__MEDIA_IMAGE__",
    },
    FallbackMapping {
        field: FallbackField::MessageAudio,
        prefix: "__MEDIA_AUDIO__",
    },
];

// ----------------------------------------------------------------------------
// Encode / Decode
// ----------------------------------------------------------------------------

/// Fold a rich payload into a text column under the field's prefix
pub fn encode_fallback(field: FallbackField, payload: &str) -> String {
    let mapping = FALLBACK_TABLE
        .iter()
        .find(|m| m.field == field)
        .expect("every FallbackField has a table entry");
    let mut encoded = String::with_capacity(mapping.prefix.len() + payload.len());
    encoded.push_str(mapping.prefix);
    encoded.push_str(payload);
    encoded
}

/// Inverse transform: recognize a reserved prefix and return the field it
/// stands in for together with the original payload. Returns `None` for
/// ordinary content.
pub fn decode_fallback(content: &str) -> Option<(FallbackField, &str)> {
    FALLBACK_TABLE
        .iter()
        .find_map(|m| content.strip_prefix(m.prefix).map(|rest| (m.field, rest)))
}

/// Whether content carries any reserved fallback prefix
pub fn is_fallback_encoded(content: &str) -> bool {
    decode_fallback(content).is_some()
}

/// Build a base64 data URI for raw media bytes
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
