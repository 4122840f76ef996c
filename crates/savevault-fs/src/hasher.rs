use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Compute the SHA-256 hash of a file, returned as lowercase hex.
pub fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let result = hasher.finalize();
    Ok(format!("{:x}", result))
}

/// Compute the SHA-256 hash of a string's UTF-8 bytes, as lowercase hex.
pub fn sha256_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sha256_known() {
        let mut f = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"hello world").unwrap();
        let h = sha256_file(f.path()).unwrap();
        assert_eq!(
            h,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_string_matches_file() {
        let mut f = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"abc").unwrap();
        assert_eq!(sha256_string("abc"), sha256_file(f.path()).unwrap());
    }

    #[test]
    fn test_sha256_string_deterministic() {
        assert_eq!(sha256_string("xyz"), sha256_string("xyz"));
        assert_ne!(sha256_string("xyz"), sha256_string("xy"));
    }
}
