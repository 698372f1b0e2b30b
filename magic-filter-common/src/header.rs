use crate::{APP_HEADER_BYTES, Cursor, FrameBounds};

/// Fixed 8-byte header at the start of an application payload.
///
/// Layout: `magic[2] | frame_type | flags | payload_length (u32, big-endian)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AppHeader {
    pub magic: [u8; 2],
    pub frame_type: u8,
    pub flags: u8,
    pub payload_length: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameKind {
    Predicted,
    Intra,
    Bidirectional,
}

impl AppHeader {
    pub const SIZE: usize = APP_HEADER_BYTES;

    /// Decodes the header at `cursor` without checking the magic.
    pub fn decode(frame: &FrameBounds<'_>, cursor: Cursor) -> Option<Self> {
        let at = cursor.offset();
        if !frame.fits(at, Self::SIZE) {
            return None;
        }
        Some(Self {
            magic: frame.read_bytes::<2>(at)?,
            frame_type: frame.read_u8(at + 2)?,
            flags: frame.read_u8(at + 3)?,
            payload_length: frame.read_u32_be(at + 4)?,
        })
    }

    pub fn frame_kind(&self) -> Option<FrameKind> {
        match self.frame_type {
            0x00 => Some(FrameKind::Predicted),
            0x01 => Some(FrameKind::Intra),
            0x02 => Some(FrameKind::Bidirectional),
            _ => None,
        }
    }
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Predicted => "P",
            FrameKind::Intra => "I",
            FrameKind::Bidirectional => "B",
        }
    }
}
