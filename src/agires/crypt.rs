use anyhow::Result;

use crate::agires::bytes;

/// XORs `data[start..]` with the repeating key; the key index restarts at `start`.
/// Applying it twice restores the input.
pub fn crypt(data: &mut [u8], key: &[u8], start: usize) {
    if key.is_empty() || start >= data.len() { return; }
    for (n, b) in data[start..].iter_mut().enumerate() {
        *b ^= key[n % key.len()];
    }
}

/// Decrypts the message text of a logic resource in place. The text starts
/// after the message count and offset table.
pub fn decrypt_logic_messages(data: &mut [u8], key: &[u8]) -> Result<()> {
    let messages_offset = bytes::read_lohi(data, 0)? as usize + 2;
    if messages_offset >= data.len() {
        return Ok(());
    }
    let num_messages = data[messages_offset] as usize;
    crypt(data, key, messages_offset + 3 + num_messages * 2);
    Ok(())
}
