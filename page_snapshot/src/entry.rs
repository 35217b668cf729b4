//! Typed views over the raw words the kernel hands out and the flags word we
//! write back out. The kernel and output bit positions do not line up, so each
//! layout keeps its own offset table.
//!
//! https://www.kernel.org/doc/Documentation/vm/pagemap.txt

/// Bit offsets in a `/proc/<pid>/pagemap` entry.
pub mod pagemap_bits {
    /// Highest bit of the frame number (bits 0-54).
    pub const PFN_HIGH: u32 = 54;
    /// Lowest bit of the swap offset; bits 0-4 are the swap type.
    pub const SWAP_OFFSET_LOW: u32 = 5;
    pub const FILE: u32 = 61;
    pub const SWAPPED: u32 = 62;
    pub const PRESENT: u32 = 63;
}

/// Bit offsets in a `/proc/kpageflags` entry.
pub mod kpageflags_bits {
    pub const DIRTY: u32 = 4;
    pub const ANON: u32 = 12;
}

/// Bit offsets in the flags word of an output record.
pub mod record_bits {
    pub const DIRTY: u32 = 4;
    pub const ANON: u32 = 12;
    pub const PRESENT: u32 = 26;
}

pub const ENTRY_SIZE: usize = 8;

const PFN_MASK: u64 = (1 << (pagemap_bits::PFN_HIGH + 1)) - 1;
const SWAP_OFFSET_MASK: u64 = PFN_MASK & !((1 << pagemap_bits::SWAP_OFFSET_LOW) - 1);

#[inline]
fn bit64(word: u64, offset: u32) -> bool {
    (word >> offset) & 1 == 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagemapEntry(pub u64);

impl PagemapEntry {
    pub fn present(self) -> bool {
        bit64(self.0, pagemap_bits::PRESENT)
    }

    pub fn swapped(self) -> bool {
        bit64(self.0, pagemap_bits::SWAPPED)
    }

    pub fn file_mapped(self) -> bool {
        bit64(self.0, pagemap_bits::FILE)
    }

    pub fn pfn(self) -> u64 {
        self.0 & PFN_MASK
    }

    /// Swap offset bits left in place (not shifted down).
    pub fn swap_offset(self) -> u64 {
        self.0 & SWAP_OFFSET_MASK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFlags(pub u64);

impl FrameFlags {
    pub fn dirty(self) -> bool {
        bit64(self.0, kpageflags_bits::DIRTY)
    }

    pub fn anon(self) -> bool {
        bit64(self.0, kpageflags_bits::ANON)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFlags(pub u32);

impl RecordFlags {
    pub fn new(dirty: bool, anon: bool, present: bool) -> Self {
        RecordFlags(
            (dirty as u32) << record_bits::DIRTY
                | (anon as u32) << record_bits::ANON
                | (present as u32) << record_bits::PRESENT,
        )
    }

    pub fn dirty(self) -> bool {
        (self.0 >> record_bits::DIRTY) & 1 == 1
    }

    pub fn anon(self) -> bool {
        (self.0 >> record_bits::ANON) & 1 == 1
    }

    pub fn present(self) -> bool {
        (self.0 >> record_bits::PRESENT) & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks() {
        assert_eq!(PFN_MASK, 0x7F_FFFF_FFFF_FFFF);
        assert_eq!(SWAP_OFFSET_MASK, 0x7F_FFFF_FFFF_FFE0);
    }

    #[test]
    fn present_entry() {
        let entry = PagemapEntry(1 << 63 | 0x1234);
        assert!(entry.present());
        assert!(!entry.swapped());
        assert!(!entry.file_mapped());
        assert_eq!(entry.pfn(), 0x1234);
    }

    #[test]
    fn swapped_entry_drops_swap_type() {
        let entry = PagemapEntry(1 << 62 | 1 << 61 | 0xabc0 | 0x1f);
        assert!(!entry.present());
        assert!(entry.swapped());
        assert!(entry.file_mapped());
        assert_eq!(entry.swap_offset(), 0xabc0);
    }

    #[test]
    fn high_flag_bits_do_not_leak_into_pfn() {
        let entry = PagemapEntry(u64::MAX);
        assert_eq!(entry.pfn(), PFN_MASK);
        assert_eq!(entry.swap_offset() & 0x1f, 0);
    }

    #[test]
    fn frame_flags() {
        let flags = FrameFlags(1 << 4);
        assert!(flags.dirty());
        assert!(!flags.anon());
        let flags = FrameFlags(1 << 12 | 1 << 5);
        assert!(!flags.dirty());
        assert!(flags.anon());
    }

    #[test]
    fn record_flags_use_their_own_offsets() {
        let flags = RecordFlags::new(true, true, true);
        assert_eq!(flags.0, 1 << 4 | 1 << 12 | 1 << 26);
        assert_eq!(RecordFlags::new(false, false, false).0, 0);
        let flags = RecordFlags::new(false, true, false);
        assert!(!flags.dirty());
        assert!(flags.anon());
        assert!(!flags.present());
    }
}
