use crate::error::MalformedVertex;
use crate::wire_read::Reader;

/// Bitcoin-style CompactSize as carried inside the external chain's
/// proof data. Non-minimal encodings are rejected.
pub fn read_compact_size(r: &mut Reader<'_>) -> Result<u64, MalformedVertex> {
    let (value, floor) = match r.read_u8()? {
        tag @ 0x00..=0xfc => return Ok(u64::from(tag)),
        0xfd => (u64::from(r.read_u16_le()?), 0xfd),
        0xfe => (u64::from(r.read_u32_le()?), 0x1_0000),
        0xff => (r.read_u64_le()?, 0x1_0000_0000),
    };
    if value < floor {
        return Err(MalformedVertex::NonMinimalCompactSize);
    }
    Ok(value)
}

/// Length prefix bounded by `max`, so a hostile prefix never drives an
/// allocation.
pub fn read_compact_len(r: &mut Reader<'_>, max: u64, what: &'static str) -> Result<usize, MalformedVertex> {
    let n = read_compact_size(r)?;
    if n > max {
        return Err(MalformedVertex::FieldRange(what));
    }
    usize::try_from(n).map_err(|_| MalformedVertex::FieldRange(what))
}

pub fn encode_compact_size(n: u64, out: &mut Vec<u8>) {
    if n < 0xfd {
        out.push(n as u8);
    } else if let Ok(v) = u16::try_from(n) {
        out.push(0xfd);
        out.extend_from_slice(&v.to_le_bytes());
    } else if let Ok(v) = u32::try_from(n) {
        out.push(0xfe);
        out.extend_from_slice(&v.to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}
