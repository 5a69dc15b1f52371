use std::fmt;

/// Byte range of one chunk within the file, rendered as the request-level
/// `content-range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ContentRange {
    /// Range for chunk `part_number` (0-based) of a `total`-byte file split
    /// into `chunk_size` pieces. The end byte is clamped to the file length.
    pub fn for_part(part_number: u64, chunk_size: u64, total: u64) -> Self {
        let start = part_number * chunk_size;
        let end = ((part_number + 1) * chunk_size - 1).min(total.saturating_sub(1));
        Self { start, end, total }
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Aggregate hash list sent on the final chunk: `"1,<h1>,2,<h2>"`, 1-based,
/// trailing separator trimmed.
pub fn etags_line(hashes: &[String]) -> String {
    let mut line = String::new();
    for (i, hash) in hashes.iter().enumerate() {
        line.push_str(&format!("{},{},", i + 1, hash));
    }
    line.pop();
    line
}

/// Complete description of one chunk request body.
///
/// The transport rebuilds an actual multipart form from this on every retry
/// attempt, since a form body is single-use. Keeping the description as plain
/// data also lets the transport log what it is about to discard.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    /// Ordered text fields (`user_id`, `version`, `prefix`, optional `guid`,
    /// `part_number`).
    pub params: Vec<(String, String)>,
    /// Name the file part is labelled with.
    pub file_name: String,
    /// Raw chunk bytes.
    pub bytes: Vec<u8>,
    /// Hex hash of `bytes`; sent as the `md5` field and the part's
    /// `content-md5` header.
    pub chunk_hash: String,
    /// Request-level `content-range` header value.
    pub range: ContentRange,
    /// Aggregate hash list, present on the last chunk only.
    pub etags: Option<String>,
}

impl ChunkPayload {
    /// One-line summary for retry diagnostics: everything but the raw bytes.
    pub fn describe(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "{} file={} bytes={} md5={} range={} etags={}",
            params,
            self.file_name,
            self.bytes.len(),
            self.chunk_hash,
            self.range,
            self.etags.as_deref().unwrap_or("-"),
        )
    }
}
