/// Joins URI segments with single slashes, keeping a trailing slash.
///
/// The first segment keeps its scheme; empty segments are skipped. The
/// trailing slash matters: chunk URIs are extended in place by appending
/// `upload_id/part/` once the server has assigned an upload id.
pub fn combine(segments: &[&str]) -> String {
    let mut result = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let trimmed = if i == 0 {
            segment.trim_end_matches('/')
        } else {
            segment.trim_matches('/')
        };
        if trimmed.is_empty() {
            continue;
        }
        result.push_str(trimmed);
        result.push('/');
    }
    result
}

/// Base URI all chunks of one upload session start from.
pub fn upload_uri(host: &str, bucket_id: &str) -> String {
    combine(&[host, "storage", "upload", bucket_id])
}

/// URI for the login exchange.
pub fn login_uri(host: &str) -> String {
    combine(&[host, "storage", "login"])
}

/// Chunk URI once the server has assigned an upload id: the base URI extended
/// with the upload id and the 1-based index of the chunk about to be sent.
pub fn part_uri(base: &str, upload_id: &str, one_based_part: u64) -> String {
    format!("{base}{upload_id}/{one_based_part}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_strips_doubled_slashes() {
        assert_eq!(
            combine(&["https://host.example/", "/storage/", "upload", "b-1"]),
            "https://host.example/storage/upload/b-1/"
        );
    }

    #[test]
    fn combine_skips_empty_segments() {
        assert_eq!(
            combine(&["https://host.example", "", "storage"]),
            "https://host.example/storage/"
        );
    }

    #[test]
    fn upload_uri_shape() {
        assert_eq!(
            upload_uri("https://host.example", "bucket-1"),
            "https://host.example/storage/upload/bucket-1/"
        );
    }

    #[test]
    fn login_uri_shape() {
        assert_eq!(
            login_uri("https://host.example/"),
            "https://host.example/storage/login/"
        );
    }

    #[test]
    fn part_uri_extends_base() {
        let base = upload_uri("https://host.example", "b-1");
        assert_eq!(
            part_uri(&base, "up-77", 2),
            "https://host.example/storage/upload/b-1/up-77/2/"
        );
    }
}
