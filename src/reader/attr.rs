//! # Decoded Cells
//!
//! A decoded attribute is a view into the byte buffer owned by its
//! enclosing tuple or log entry: a slot records where the cell's bytes
//! live (`offset`, `len`) and whether it is null; [`Attribute`] pairs a
//! slot with its descriptor and the buffer and is what consumers see.
//!
//! Cells never own their bytes. The buffer outlives every attribute view
//! borrowed from it, enforced by lifetimes rather than convention. After
//! decoding, cell bytes are already in host order (the reader twiddles the
//! buffer in place before handing it out), so the typed accessors read
//! native-endian.

use crate::schema::AttributeDesc;

/// Location of one decoded cell inside its value's buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttrSlot {
    pub attr_id: u32,
    pub null: bool,
    pub offset: u32,
    pub len: u32,
}

impl AttrSlot {
    pub(crate) fn null(attr_id: u32) -> Self {
        Self {
            attr_id,
            null: true,
            offset: 0,
            len: 0,
        }
    }

    pub(crate) fn data(attr_id: u32, offset: usize, len: usize) -> Self {
        Self {
            attr_id,
            null: false,
            offset: offset as u32,
            len: len as u32,
        }
    }
}

/// One decoded cell: descriptor plus a borrowed view of its bytes.
#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a> {
    desc: &'a AttributeDesc,
    bytes: Option<&'a [u8]>,
}

impl<'a> Attribute<'a> {
    pub(crate) fn new(desc: &'a AttributeDesc, buffer: &'a [u8], slot: &AttrSlot) -> Self {
        let bytes = if slot.null {
            None
        } else {
            Some(&buffer[slot.offset as usize..(slot.offset + slot.len) as usize])
        };
        Self { desc, bytes }
    }

    pub fn desc(&self) -> &'a AttributeDesc {
        self.desc
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    /// The cell's bytes over the declared array length, or `None` for a
    /// null cell. Already in host order.
    pub fn bytes(&self) -> Option<&'a [u8]> {
        self.bytes
    }

    fn element(&self, width_bits: u32, index: usize) -> Option<&'a [u8]> {
        if self.desc.width_bits() != width_bits {
            return None;
        }
        let size = width_bits as usize / 8;
        let start = index * size;
        let bytes = self.bytes?;
        bytes.get(start..start + size)
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.u8_at(0)
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.u16_at(0)
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.u32_at(0)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.u64_at(0)
    }

    pub fn u8_at(&self, index: usize) -> Option<u8> {
        self.element(8, index).map(|b| b[0])
    }

    pub fn u16_at(&self, index: usize) -> Option<u16> {
        self.element(16, index)
            .map(|b| u16::from_ne_bytes(b.try_into().unwrap()))
    }

    pub fn u32_at(&self, index: usize) -> Option<u32> {
        self.element(32, index)
            .map(|b| u32::from_ne_bytes(b.try_into().unwrap()))
    }

    pub fn u64_at(&self, index: usize) -> Option<u64> {
        self.element(64, index)
            .map(|b| u64::from_ne_bytes(b.try_into().unwrap()))
    }
}
