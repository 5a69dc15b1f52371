use serde::{Deserialize, Serialize};

/// Per-chunk acknowledgement returned by the storage server.
///
/// Every field is optional on the wire; the server omits what a given chunk
/// does not produce (e.g. `version` is only echoed on the final chunk).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkAck {
    /// Server-issued object identifier correlating all chunks of one file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guid: String,

    /// Identifier of the in-flight multipart upload, embedded in the request
    /// URI of every subsequent chunk.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_id: String,

    /// Last byte offset the server has accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_byte: Option<u64>,

    /// Server-side hash of the chunk it just received.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,

    /// Version/clock token the server accepted for this object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Object name as the server stored it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub orig_name: String,

    /// Human-readable detail, mostly on rejections.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Credentials posted to the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Successful login payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginReply {
    pub token: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<StorageGroup>,
}

/// A bucket group the logged-in user may upload into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageGroup {
    pub bucket_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}
