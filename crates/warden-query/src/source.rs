//! `get_source_file_data` (§4.5): look up a file's path and, optionally,
//! its content — base64-encoded so it survives the same binary-unsafe RPC
//! transport the bundle format itself works around (spec §6).

use serde::{Deserialize, Serialize};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// How `content` is encoded when returned, mirroring the bundle's own
/// base64-over-a-string-field convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentEncoding {
    Base64,
    Utf8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileData {
    pub file_id: i64,
    pub path: String,
    pub content: Option<String>,
}

pub(crate) fn encode(bytes: &[u8], encoding: ContentEncoding) -> String {
    match encoding {
        ContentEncoding::Base64 => BASE64.encode(bytes),
        ContentEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
    }
}
