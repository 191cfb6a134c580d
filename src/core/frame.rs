//! Length prefix of variable-width frames.
//!
//! Variable-width objects carry a signed 32-bit length. Its sign doubles as
//! the compression flag: a negative value `-c` announces `c` compressed
//! bytes, a non-negative value `n` announces `n` raw bytes. Byte arrays and
//! strings use the same field but are never compressed.
//!
//! ```text
//! object:  [i32 len][len bytes]          len >= 0
//!          [i32 -c ][c compressed bytes] len <  0
//! block:   [i32 len][len bytes]          len >= 0 always
//! ```

use crate::error::{Result, WireError};

/// Width of every length field on the wire
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Decoded meaning of a length field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// `n` uncompressed bytes follow
    Raw(usize),
    /// `c` compressed bytes follow
    Compressed(usize),
}

impl LengthPrefix {
    /// Number of payload bytes that follow the field
    pub fn payload_len(self) -> usize {
        match self {
            LengthPrefix::Raw(n) | LengthPrefix::Compressed(n) => n,
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, LengthPrefix::Compressed(_))
    }

    /// Encode to the signed wire value.
    ///
    /// Fails with `OversizeWrite` when the length does not fit a positive i32,
    /// since its negation must also be representable.
    pub fn to_wire(self) -> Result<i32> {
        let len = self.payload_len();
        let value = i32::try_from(len).map_err(|_| WireError::OversizeWrite {
            len,
            limit: i32::MAX as usize,
        })?;
        Ok(match self {
            LengthPrefix::Raw(_) => value,
            LengthPrefix::Compressed(_) => -value,
        })
    }

    /// Decode an object length field.
    ///
    /// `i32::MIN` has no positive counterpart and can only come from a
    /// desynchronized stream.
    pub fn from_wire(value: i32) -> Result<Self> {
        if value >= 0 {
            Ok(LengthPrefix::Raw(value as usize))
        } else if value == i32::MIN {
            Err(WireError::InvalidLength(value))
        } else {
            Ok(LengthPrefix::Compressed(value.unsigned_abs() as usize))
        }
    }

    /// Decode a block length field, where negative values are never valid.
    pub fn block_from_wire(value: i32) -> Result<usize> {
        usize::try_from(value).map_err(|_| WireError::InvalidLength(value))
    }
}

/// Pick the frame kind for an encoded object of `len` bytes.
pub fn should_compress(len: usize, threshold: usize) -> bool {
    len > threshold
}
