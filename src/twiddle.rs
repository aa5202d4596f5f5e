//! # In-Place Endian Conversion
//!
//! Payload scalars in data and log files are stored in the producer's
//! native byte order. When the file header's marker shows the swapped
//! magic, every fixed-width scalar must be byte-reversed before use.
//! Decoded attributes are views into the tuple buffer, so the conversion
//! happens in place on the buffer after it is read; no per-cell allocation.
//!
//! `twiddle` operates on a byte slice holding `count` scalars of the given
//! width:
//!
//! | Width (bits) | Action |
//! |--------------|--------|
//! | 8 | no-op |
//! | 16 / 32 / 64 | reverse bytes within each element |
//! | anything else | `Format` error |
//!
//! Swapping is an involution: applying it twice restores the original
//! bytes.

use eyre::{bail, ensure, Result};

use crate::error::ReadError;

/// Reverses the byte order of `count` scalars of `width_bits` at the start
/// of `buf`, in place. Bytes past `count` elements are left untouched.
pub fn twiddle(buf: &mut [u8], width_bits: u32, count: usize) -> Result<()> {
    let elem_bytes = match width_bits {
        8 => return Ok(()),
        16 => 2,
        32 => 4,
        64 => 8,
        other => bail!(ReadError::format(format!(
            "unsupported scalar width: {} bits",
            other
        ))),
    };

    let needed = elem_bytes * count;
    ensure!(
        buf.len() >= needed,
        ReadError::format(format!(
            "scalar area too short: {} bytes for {} x {}-bit elements",
            buf.len(),
            count,
            width_bits
        ))
    );

    for elem in buf[..needed].chunks_exact_mut(elem_bytes) {
        elem.reverse();
    }

    Ok(())
}
