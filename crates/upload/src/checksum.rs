use skiff_protocol::etags_line;

/// Hex-encoded MD5 of one chunk, as the server computes it.
pub fn chunk_hash(bytes: &[u8]) -> String {
    hex::encode(md5::compute(bytes).0)
}

/// Ordered list of per-chunk hashes, folded into the `etags[]` field on the
/// final chunk. Append-only; chunks are hashed in upload order.
#[derive(Debug, Default)]
pub struct ChecksumLedger {
    hashes: Vec<String>,
}

impl ChecksumLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the hash of the chunk about to be sent.
    pub fn push(&mut self, hash: String) {
        self.hashes.push(hash);
    }

    /// Hashes recorded so far, in order.
    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    /// The aggregate `"1,<h1>,2,<h2>"` line for the final chunk.
    pub fn etags(&self) -> String {
        etags_line(&self.hashes)
    }
}
