//! Hex codec for the prediction hot path.
//!
//! Fixed-buffer encode/decode with lookup tables, address syntax validation,
//! and the right-zero-padding rule salts go through before hashing.

/// Case-insensitive hex decode table; 0xff marks a non-hex byte.
const HEX_DECODE_TABLE: [u8; 256] = {
    let mut table = [0xffu8; 256];
    let mut i = b'0';
    while i <= b'9' {
        table[i as usize] = i - b'0';
        i += 1;
    }
    let mut i = b'a';
    while i <= b'f' {
        table[i as usize] = i - b'a' + 10;
        i += 1;
    }
    let mut i = b'A';
    while i <= b'F' {
        table[i as usize] = i - b'A' + 10;
        i += 1;
    }
    table
};

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Syntactic check for a 20-byte hex address: `0x` or `0X` prefix followed by
/// exactly 40 hex digits. Fails closed on anything else, never errors.
pub fn is_hex_address(address: &str) -> bool {
    let bytes = address.as_bytes();
    if bytes.len() != 42 || bytes[0] != b'0' || (bytes[1] != b'x' && bytes[1] != b'X') {
        return false;
    }
    bytes[2..].iter().all(|&b| HEX_DECODE_TABLE[b as usize] != 0xff)
}

/// Decode a hex string into a fixed output buffer.
/// Caller guarantees `hex.len() == 2 * out.len()` and valid hex digits.
#[inline(always)]
pub fn decode_into(hex: &str, out: &mut [u8]) {
    let hex_bytes = hex.as_bytes();
    debug_assert_eq!(hex_bytes.len(), out.len() * 2);
    for (i, byte) in out.iter_mut().enumerate() {
        let high = HEX_DECODE_TABLE[hex_bytes[i * 2] as usize];
        let low = HEX_DECODE_TABLE[hex_bytes[i * 2 + 1] as usize];
        *byte = (high << 4) | low;
    }
}

/// Encode bytes as lowercase hex into a fixed output buffer.
/// Caller guarantees `out.len() == 2 * bytes.len()`.
#[inline(always)]
pub fn encode_into(bytes: &[u8], out: &mut [u8]) {
    debug_assert_eq!(out.len(), bytes.len() * 2);
    for (i, &byte) in bytes.iter().enumerate() {
        out[i * 2] = HEX_CHARS[(byte >> 4) as usize];
        out[i * 2 + 1] = HEX_CHARS[(byte & 0x0f) as usize];
    }
}

/// Right-zero-pad the UTF-8 bytes of `s` to exactly `N` bytes.
///
/// This is string-byte padding, not numeric padding: a short input keeps its
/// bytes in the leading positions and zero bytes trail. Returns `None` when
/// the input is longer than `N`.
#[inline(always)]
pub fn pad_bytes<const N: usize>(s: &str) -> Option<[u8; N]> {
    let data = s.as_bytes();
    if data.len() > N {
        return None;
    }
    let mut out = [0u8; N];
    out[..data.len()].copy_from_slice(data);
    Some(out)
}

/// Right-zero-pad `s` to `size` bytes and hex-encode the result
/// (lowercase, no prefix). Returns `None` when the input exceeds `size`.
pub fn hex_pad(s: &str, size: usize) -> Option<String> {
    let data = s.as_bytes();
    if data.len() > size {
        return None;
    }
    let mut padded = vec![0u8; size];
    padded[..data.len()].copy_from_slice(data);
    Some(hex::encode(padded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        assert!(is_hex_address("0xa84c57e9966df7df79bff42f35c68aae71796f64"));
        assert!(is_hex_address("0Xa84c57e9966df7df79bff42f35c68aae71796f64"));
        assert!(is_hex_address("0xA84C57E9966DF7DF79BFF42F35C68AAE71796F64"));
        assert!(is_hex_address("0x0000000000000000000000000000000000000000"));
    }

    #[test]
    fn test_invalid_addresses() {
        // wrong length
        assert!(!is_hex_address("0xa84c57e9966df7df79bff42f35c68aae71796f6"));
        assert!(!is_hex_address("0xa84c57e9966df7df79bff42f35c68aae71796f644"));
        assert!(!is_hex_address(""));
        // missing or mangled prefix
        assert!(!is_hex_address("a84c57e9966df7df79bff42f35c68aae71796f6400"));
        assert!(!is_hex_address("1xa84c57e9966df7df79bff42f35c68aae71796f64"));
        // non-hex character
        assert!(!is_hex_address("0xg84c57e9966df7df79bff42f35c68aae71796f64"));
        assert!(!is_hex_address("0xa84c57e9966df7df79bff42f35c68aae71796f6 "));
    }

    #[test]
    fn test_decode_encode_round_trip() {
        let hex_str = "a84c57e9966df7df79bff42f35c68aae71796f64";
        let mut bytes = [0u8; 20];
        decode_into(hex_str, &mut bytes);

        let mut out = [0u8; 40];
        encode_into(&bytes, &mut out);
        assert_eq!(std::str::from_utf8(&out).unwrap(), hex_str);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let mut lower = [0u8; 4];
        let mut upper = [0u8; 4];
        decode_into("deadbeef", &mut lower);
        decode_into("DEADBEEF", &mut upper);
        assert_eq!(lower, upper);
        assert_eq!(lower, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_pad_bytes() {
        let padded: [u8; 8] = pad_bytes("abc").unwrap();
        assert_eq!(&padded, b"abc\0\0\0\0\0");

        let exact: [u8; 3] = pad_bytes("abc").unwrap();
        assert_eq!(&exact, b"abc");

        assert!(pad_bytes::<2>("abc").is_none());

        let empty: [u8; 4] = pad_bytes("").unwrap();
        assert_eq!(empty, [0u8; 4]);
    }

    #[test]
    fn test_hex_pad() {
        assert_eq!(hex_pad("abc", 4).unwrap(), "61626300");
        assert_eq!(hex_pad("", 2).unwrap(), "0000");
        assert!(hex_pad("abcde", 4).is_none());
    }
}
