//! Upload-specific helpers and invariants.

const IMAGE_PREFIX: &str = "image/";

/// Directory (relative to the upload root) that post images are written into.
pub const POST_IMAGE_DIR: &str = "posts";

/// Post images must declare an `image/*` content type.
pub fn is_supported_image(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .strip_prefix(IMAGE_PREFIX)
        .is_some_and(|subtype| !subtype.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_types_are_accepted() {
        assert!(is_supported_image("image/gif"));
        assert!(is_supported_image("IMAGE/PNG"));
        assert!(!is_supported_image("image/"));
        assert!(!is_supported_image("text/plain"));
        assert!(!is_supported_image("application/octet-stream"));
    }
}
