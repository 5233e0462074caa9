//! Content hash verification shared by `put_content`.

use warden_core::hashing::sha256_hex;
use warden_core::WardenError;

pub fn verify_hash(expected: &str, bytes: &[u8]) -> Result<(), WardenError> {
    let actual = sha256_hex(bytes);
    if actual != expected.to_lowercase() {
        return Err(WardenError::invalid_content(expected));
    }
    Ok(())
}
