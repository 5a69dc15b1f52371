//! Wire protocol types for chunked uploads to a Skiff storage server.
//!
//! Everything that crosses the HTTP boundary is described here: the multipart
//! chunk payload, the JSON acknowledgement the server returns per chunk, the
//! login exchange, and upload URI construction. The transport crate turns a
//! [`ChunkPayload`] into an actual request; this crate stays transport-free.

mod ack;
mod payload;
mod url;

pub use ack::{ChunkAck, LoginReply, LoginRequest, StorageGroup};
pub use payload::{ChunkPayload, ContentRange, etags_line};
pub use url::{combine, login_uri, part_uri, upload_uri};

/// Multipart field name carrying the raw chunk bytes.
pub const FIELD_FILES: &str = "files[]";

/// Multipart field carrying the aggregate per-chunk hash list (last chunk only).
pub const FIELD_ETAGS: &str = "etags[]";

/// Text field names sent with every chunk request.
pub const PARAM_USER_ID: &str = "user_id";
pub const PARAM_VERSION: &str = "version";
pub const PARAM_PREFIX: &str = "prefix";
pub const PARAM_GUID: &str = "guid";
pub const PARAM_MD5: &str = "md5";
pub const PARAM_PART_NUMBER: &str = "part_number";
