use core::{marker::PhantomData, mem, ptr};

/// The `[start, end)` window of one received frame.
///
/// Every accessor re-checks [`FrameBounds::fits`] before dereferencing, so a
/// read that would cross `end` yields `None` instead of touching memory. The
/// comparison is written as `start + offset + size <= end` because that is
/// the shape the verifier tracks as a packet range proof.
#[derive(Copy, Clone, Debug)]
pub struct FrameBounds<'a> {
    start: usize,
    end: usize,
    _frame: PhantomData<&'a [u8]>,
}

impl<'a> FrameBounds<'a> {
    /// Bounds over a host-side buffer.
    pub fn from_slice(frame: &'a [u8]) -> Self {
        let start = frame.as_ptr() as usize;
        Self {
            start,
            end: start + frame.len(),
            _frame: PhantomData,
        }
    }

    /// Bounds over raw `data`/`data_end` addresses handed in by the runtime.
    ///
    /// # Safety
    ///
    /// `[start, end)` must be readable for the whole of `'a` and `start <= end`.
    #[inline(always)]
    pub unsafe fn from_raw(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            _frame: PhantomData,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True iff `[start + offset, start + offset + size)` lies inside the frame.
    #[inline(always)]
    pub fn fits(&self, offset: usize, size: usize) -> bool {
        self.start + offset + size <= self.end
    }

    #[inline(always)]
    pub fn read_u8(&self, offset: usize) -> Option<u8> {
        self.read::<u8>(offset)
    }

    /// Reads a network-order `u16` and returns it in host order.
    #[inline(always)]
    pub fn read_u16_be(&self, offset: usize) -> Option<u16> {
        self.read::<u16>(offset).map(u16::from_be)
    }

    #[inline(always)]
    pub fn read_u32_be(&self, offset: usize) -> Option<u32> {
        self.read::<u32>(offset).map(u32::from_be)
    }

    #[inline(always)]
    pub fn read_bytes<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.read::<[u8; N]>(offset)
    }

    // Restricted to plain integer and byte-array types via the public
    // wrappers above: every bit pattern of `T` must be valid.
    #[inline(always)]
    fn read<T: Copy>(&self, offset: usize) -> Option<T> {
        if !self.fits(offset, mem::size_of::<T>()) {
            return None;
        }
        let p = (self.start + offset) as *const T;
        Some(unsafe { ptr::read_unaligned(p) })
    }
}

/// Offset of the next undecoded header.
///
/// Only the stage decoders hand these out, and only after the bytes in front
/// of the cursor have been checked against the frame bounds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Cursor(usize);

impl Cursor {
    pub(crate) const START: Cursor = Cursor(0);

    #[inline(always)]
    pub fn offset(self) -> usize {
        self.0
    }

    #[inline(always)]
    pub(crate) fn advance(self, by: usize) -> Cursor {
        Cursor(self.0 + by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_accepts_exact_length() {
        let buf = [0u8; 14];
        let frame = FrameBounds::from_slice(&buf);
        assert!(frame.fits(0, 14));
        assert!(frame.fits(14, 0));
        assert!(!frame.fits(0, 15));
        assert!(!frame.fits(13, 2));
    }

    #[test]
    fn empty_frame_fits_nothing() {
        let buf: [u8; 0] = [];
        let frame = FrameBounds::from_slice(&buf);
        assert!(frame.is_empty());
        assert!(frame.fits(0, 0));
        assert!(!frame.fits(0, 1));
        assert_eq!(frame.read_u8(0), None);
    }

    #[test]
    fn reads_are_network_order() {
        let buf = [0x08, 0x00, 0x27, 0x0f, 0xde, 0xad, 0xbe, 0xef];
        let frame = FrameBounds::from_slice(&buf);
        assert_eq!(frame.read_u16_be(0), Some(0x0800));
        assert_eq!(frame.read_u16_be(2), Some(9999));
        assert_eq!(frame.read_u32_be(4), Some(0xdead_beef));
        assert_eq!(frame.read_bytes::<2>(6), Some([0xbe, 0xef]));
    }

    #[test]
    fn reads_past_end_are_refused() {
        let buf = [1u8, 2, 3];
        let frame = FrameBounds::from_slice(&buf);
        assert_eq!(frame.read_u8(2), Some(3));
        assert_eq!(frame.read_u8(3), None);
        assert_eq!(frame.read_u16_be(2), None);
        assert_eq!(frame.read_u32_be(0), None);
        assert_eq!(frame.read_bytes::<4>(0), None);
    }

    #[test]
    fn reads_are_unaligned_safe() {
        let buf = [0u8, 0x12, 0x34, 0x56, 0x78, 0x9a];
        let frame = FrameBounds::from_slice(&buf);
        assert_eq!(frame.read_u16_be(1), Some(0x1234));
        assert_eq!(frame.read_u32_be(1), Some(0x1234_5678));
    }

    #[test]
    fn cursor_advances_by_header_size() {
        let c = Cursor::START.advance(14).advance(20);
        assert_eq!(c.offset(), 34);
    }
}
