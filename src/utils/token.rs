// Random token and hex helpers

use rand::RngCore;

/// Lowercase hex of raw bytes
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// `len` random bytes from the thread RNG, hex encoded
pub fn random_hex_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0x0f, 0xab]), "000fab");
        assert_eq!(hex_encode(&[]), "");
    }

    #[test]
    fn test_random_hex_token_length() {
        let token = random_hex_token(32);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, random_hex_token(32));
    }
}
