use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::hex as hexc;

/// Keccak-256 digest (legacy 0x01 padding as used by Ethereum, not SHA-3)
#[inline(always)]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut hash = [0u8; 32];
    keccak.finalize(&mut hash);
    hash
}

/// Double SHA-256 hash (used for the Base58Check checksum)
#[inline(always)]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// EIP-55 mixed-case checksum encoding of a 20-byte address
///
/// The casing signal comes from the Keccak-256 hash of the 40-character
/// lowercase hex form: a hex letter is uppercased iff the nibble at the same
/// position in the hash is >= 8 (high nibble first).
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let mut address_hex = [0u8; 40];
    hexc::encode_into(address, &mut address_hex);
    let address_hash = keccak256(&address_hex);

    let mut checksum = String::with_capacity(42);
    checksum.push_str("0x");

    for (i, &c) in address_hex.iter().enumerate() {
        if c.is_ascii_digit() {
            checksum.push(c as char);
        } else {
            let byte_value = address_hash[i / 2];
            let nibble_value = if i % 2 == 0 {
                byte_value >> 4
            } else {
                byte_value & 0x0f
            };

            if nibble_value >= 8 {
                checksum.push(c.to_ascii_uppercase() as char);
            } else {
                checksum.push(c as char);
            }
        }
    }

    checksum
}

/// Base58Check encoding of a 21-byte `[network prefix || address]` payload
///
/// Appends the first 4 bytes of the double SHA-256 checksum and encodes the
/// resulting 25-byte payload with the Bitcoin Base58 alphabet. Leading zero
/// bytes become leading '1' characters; the output length is whatever the
/// base conversion produces, never assumed.
pub fn base58check(payload: &[u8; 21]) -> String {
    let checksum = double_sha256(payload);
    let mut full = [0u8; 25];
    full[..21].copy_from_slice(payload);
    full[21..25].copy_from_slice(&checksum[..4]);
    bs58::encode(full).into_string()
}
