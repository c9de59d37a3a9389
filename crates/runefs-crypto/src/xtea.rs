//! XTEA block cipher as used by the JS5 store.
//!
//! Encrypted group payloads are ciphered in 8-byte blocks with a 128-bit
//! key (four 32-bit words), 32 rounds, big-endian words on the wire. A
//! trailing partial block is carried through untouched - the store format
//! never pads, so any bytes past the last whole block are plaintext.

use crate::CryptoError;

/// XTEA round constant.
const DELTA: u32 = 0x9E37_79B9;

/// Number of Feistel rounds per block.
const ROUNDS: u32 = 32;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 8;

/// A 128-bit XTEA key.
///
/// Key words are signed 32-bit values because that is how they appear in
/// key files and community key dumps; the cipher itself treats them as
/// unsigned words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XteaKey(pub [i32; 4]);

impl XteaKey {
    /// The all-zero key, used by convention to mark an unkeyed entry.
    pub const ZERO: Self = Self([0; 4]);

    /// Build a key from a word slice.
    pub fn from_words(words: &[i32]) -> Result<Self, CryptoError> {
        if words.len() != 4 {
            return Err(CryptoError::InvalidKeySize {
                expected: 4,
                actual: words.len(),
            });
        }
        let mut key = [0i32; 4];
        key.copy_from_slice(words);
        Ok(Self(key))
    }

    /// A key is usable when at least one word is non-zero.
    pub fn is_valid(&self) -> bool {
        self.0.iter().any(|&word| word != 0)
    }

    fn words(&self) -> [u32; 4] {
        [
            self.0[0] as u32,
            self.0[1] as u32,
            self.0[2] as u32,
            self.0[3] as u32,
        ]
    }
}

/// Encipher a single block.
fn encipher_block(key: &[u32; 4], mut v0: u32, mut v1: u32) -> (u32, u32) {
    let mut sum = 0u32;
    for _ in 0..ROUNDS {
        v0 = v0.wrapping_add(
            ((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1) ^ sum.wrapping_add(key[(sum & 3) as usize]),
        );
        sum = sum.wrapping_add(DELTA);
        v1 = v1.wrapping_add(
            ((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0)
                ^ sum.wrapping_add(key[((sum >> 11) & 3) as usize]),
        );
    }
    (v0, v1)
}

/// Decipher a single block.
fn decipher_block(key: &[u32; 4], mut v0: u32, mut v1: u32) -> (u32, u32) {
    let mut sum = DELTA.wrapping_mul(ROUNDS);
    for _ in 0..ROUNDS {
        v1 = v1.wrapping_sub(
            ((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0)
                ^ sum.wrapping_add(key[((sum >> 11) & 3) as usize]),
        );
        sum = sum.wrapping_sub(DELTA);
        v0 = v0.wrapping_sub(
            ((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1) ^ sum.wrapping_add(key[(sum & 3) as usize]),
        );
    }
    (v0, v1)
}

/// Decrypt `data` in place with the given key.
///
/// Whole 8-byte blocks are deciphered; a trailing partial block is left
/// as-is.
pub fn decrypt(data: &mut [u8], key: &XteaKey) {
    apply(data, key, decipher_block);
}

/// Encrypt `data` in place with the given key.
///
/// Whole 8-byte blocks are enciphered; a trailing partial block is left
/// as-is.
pub fn encrypt(data: &mut [u8], key: &XteaKey) {
    apply(data, key, encipher_block);
}

fn apply(data: &mut [u8], key: &XteaKey, block_fn: fn(&[u32; 4], u32, u32) -> (u32, u32)) {
    let words = key.words();
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        let v0 = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
        let v1 = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
        let (v0, v1) = block_fn(&words, v0, v1);
        block[..4].copy_from_slice(&v0.to_be_bytes());
        block[4..].copy_from_slice(&v1.to_be_bytes());
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const KEY: XteaKey = XteaKey([0x1A2B3C4D, -0x12345678, 0x0BADF00D, 0x600DCAFE]);

    #[test]
    fn test_round_trip() {
        let original = b"sixteen byte msg".to_vec();
        let mut data = original.clone();

        encrypt(&mut data, &KEY);
        assert_ne!(original, data);

        decrypt(&mut data, &KEY);
        assert_eq!(original, data);
    }

    #[test]
    fn test_known_vector() {
        // Reference XTEA vector: all-zero key, all-zero block.
        let key = XteaKey::ZERO;
        let (v0, v1) = encipher_block(&key.words(), 0, 0);
        assert_eq!((v0, v1), (0xDEE9_D4D8, 0xF7131ED9));

        let (v0, v1) = decipher_block(&key.words(), v0, v1);
        assert_eq!((v0, v1), (0, 0));
    }

    #[test]
    fn test_partial_block_untouched() {
        let mut data = b"eight by+tail".to_vec();
        let tail = data[8..].to_vec();

        encrypt(&mut data, &KEY);
        assert_eq!(tail, data[8..]);

        decrypt(&mut data, &KEY);
        assert_eq!(data, b"eight by+tail");
    }

    #[test]
    fn test_empty_input() {
        let mut data = Vec::new();
        decrypt(&mut data, &KEY);
        assert!(data.is_empty());
    }

    #[test]
    fn test_key_validity() {
        assert!(!XteaKey::ZERO.is_valid());
        assert!(XteaKey([0, 0, 1, 0]).is_valid());
        assert!(KEY.is_valid());
    }

    #[test]
    fn test_from_words() {
        assert!(XteaKey::from_words(&[1, 2, 3, 4]).is_ok());
        assert!(XteaKey::from_words(&[1, 2, 3]).is_err());
        assert!(XteaKey::from_words(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_different_keys_differ() {
        let mut a = b"same plaintext__".to_vec();
        let mut b = a.clone();

        encrypt(&mut a, &KEY);
        encrypt(&mut b, &XteaKey([1, 2, 3, 4]));
        assert_ne!(a, b);
    }
}
