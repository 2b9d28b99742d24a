// varint.rs - bspatch sign-magnitude integers

/// Width of every integer in the header and control block.
pub const INT_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// Reads sign-magnitude i64 as used in bspatch
/// This is NOT plain little-endian i64!
///
/// Bytes 0..=6 and the low 7 bits of byte 7 hold the magnitude, the top bit
/// of byte 7 is the sign.
#[inline]
pub fn decode(buf: [u8; INT_LEN]) -> i64 {
    let y = u64::from_le_bytes(buf);
    let magnitude = (y & !SIGN_BIT) as i64;
    if y & SIGN_BIT == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Encode signed integer in bspatch sign-magnitude format
///
/// `i64::MIN` has no sign-magnitude form and comes out as negative zero.
#[inline]
pub fn encode(x: i64) -> [u8; INT_LEN] {
    let magnitude = x.unsigned_abs() & !SIGN_BIT;
    let y = if x < 0 { magnitude | SIGN_BIT } else { magnitude };
    y.to_le_bytes()
}
