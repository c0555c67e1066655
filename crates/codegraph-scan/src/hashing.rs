use sha2::{Digest, Sha256};

/// Change-detection fingerprint over raw file bytes (spec §4.3: "MD5 (or any
/// 128-bit fast non-cryptographic hash)"). Truncates SHA-256 to 128 bits
/// rather than pulling in a dedicated MD5 crate — `sha2` is already the
/// hashing dependency this tree uses everywhere else.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_hash_the_same() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
    }

    #[test]
    fn different_bytes_hash_differently() {
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }

    #[test]
    fn hash_is_128_bits_of_hex() {
        assert_eq!(content_hash(b"x").len(), 32);
    }
}
