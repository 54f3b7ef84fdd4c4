use anyhow::{anyhow, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied()
        .ok_or_else(|| anyhow!("read of byte at {} beyond end of data ({} bytes)", offset, data.len()))
}

/// Little-endian ("lohi") u16
pub fn read_lohi(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = segment(data, offset, 2)?;
    Ok(LittleEndian::read_u16(bytes))
}

/// Big-endian ("hilo") u16
pub fn read_hilo(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = segment(data, offset, 2)?;
    Ok(BigEndian::read_u16(bytes))
}

/// Window of `length` bytes starting at `offset`
pub fn segment(data: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    let end = offset.checked_add(length).ok_or_else(|| anyhow!("segment length overflow"))?;
    data.get(offset..end)
        .ok_or_else(|| anyhow!("segment {}..{} beyond end of data ({} bytes)", offset, end, data.len()))
}

/// NUL-terminated string starting at `offset`; runs to the end if unterminated
pub fn read_cstring(data: &[u8], offset: usize) -> Result<String> {
    let tail = data.get(offset..)
        .ok_or_else(|| anyhow!("string at {} beyond end of data ({} bytes)", offset, data.len()))?;
    let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Ok(tail[..len].iter().map(|&b| b as char).collect())
}
