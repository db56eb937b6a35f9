//! Shared name generation for storage backends.
//!
//! Name format: `{32 hex chars}.{extension}`, or just the hex id when the original
//! filename carries no usable extension. Both backends store under this name.

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Content type used when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const MAX_EXTENSION_LEN: usize = 16;

/// Extract the extension of a client-supplied filename, without the dot.
///
/// Directory components (either separator) are ignored. Extensions that are not
/// short ASCII alphanumerics are treated as absent so they can never smuggle path
/// characters into a storage key.
pub fn extension_of(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (_, ext) = name.rsplit_once('.')?;

    let usable = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    usable.then_some(ext)
}

/// Generate a fresh, collision-resistant name that keeps the original extension.
pub fn generate_name(original_filename: &str) -> String {
    let id = Uuid::new_v4().simple();
    match extension_of(original_filename) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

/// Guess a video content type from the filename extension.
pub fn guess_content_type(filename: &str) -> Option<&'static str> {
    let ext = extension_of(filename)?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        "ogv" => "video/ogg",
        "3gp" => "video/3gpp",
        _ => return None,
    };
    Some(content_type)
}

/// Reject names that could escape the destination directory or bucket prefix.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_keeps_extension() {
        let name = generate_name("movie.mov");
        assert!(name.ends_with(".mov"));
        assert_eq!(name.len(), 32 + ".mov".len());
        assert!(name[..32].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_name_without_extension() {
        let name = generate_name("");
        assert_eq!(name.len(), 32);
        assert!(!name.contains('.'));

        assert!(!generate_name("README").contains('.'));
    }

    #[test]
    fn test_generated_names_are_unique() {
        assert_ne!(generate_name("a.mp4"), generate_name("a.mp4"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("clip.mp4"), Some("mp4"));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz"));
        assert_eq!(extension_of("Holiday.MOV"), Some("MOV"));
        assert_eq!(extension_of("C:\\fakepath\\clip.webm"), Some("webm"));
        assert_eq!(extension_of("dir.d/noext"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("evil.mp4/../x"), None);
        assert_eq!(extension_of("weird.m p4"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a.mp4"), Some("video/mp4"));
        assert_eq!(guess_content_type("a.MOV"), Some("video/quicktime"));
        assert_eq!(guess_content_type("a.bin"), None);
        assert_eq!(guess_content_type("noext"), None);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name(&generate_name("clip.mp4")).is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name("a/b.mp4").is_err());
        assert!(validate_name(".hidden").is_err());
    }
}
