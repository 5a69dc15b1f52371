/// Source of the opaque version tokens that order edits of one object.
///
/// The server uses these to order or merge concurrent edits; constructing
/// them is the job of an external causality library, and only the increment
/// call matters here. The returned string is treated as opaque — never
/// parsed, only forwarded with every chunk and persisted on completion.
pub trait VersionSource: Send + Sync {
    /// Returns the next version for `actor`, derived from `previous` when one
    /// is known. Implementations must accept an unknown or malformed
    /// `previous` by issuing a fresh version rather than failing.
    fn increment(&self, actor: &str, previous: Option<&str>) -> String;
}
