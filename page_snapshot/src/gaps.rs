use crate::config::GapMode;
use crate::{AddressRange, PageRecord};

/// Tracks the end of the last walked range so holes in the address space can
/// be marked with a single sentinel each.
#[derive(Debug)]
pub struct GapTracker {
    mode: GapMode,
    cursor: u64,
    gaps: u64,
}

impl GapTracker {
    pub fn new(mode: GapMode) -> Self {
        GapTracker {
            mode,
            cursor: 0,
            gaps: 0,
        }
    }

    /// Call before walking `range`. Returns the sentinel for the hole in
    /// front of it, if there is one and sentinels are enabled.
    pub fn before_range(&mut self, range: &AddressRange) -> Option<PageRecord> {
        if self.mode != GapMode::Sentinels || range.begin <= self.cursor {
            return None;
        }
        self.gaps += 1;
        Some(PageRecord::Gap(self.cursor))
    }

    pub fn after_range(&mut self, range: &AddressRange) {
        self.cursor = range.end;
    }

    pub fn gaps(&self) -> u64 {
        self.gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_sentinel_per_hole() {
        let mut tracker = GapTracker::new(GapMode::Sentinels);
        let first = AddressRange::new(0, 0x1000);
        let second = AddressRange::new(0x2000, 0x3000);
        let third = AddressRange::new(0x3000, 0x4000);
        let fourth = AddressRange::new(0x100000, 0x101000);

        assert_eq!(tracker.before_range(&first), None);
        tracker.after_range(&first);
        assert_eq!(tracker.before_range(&second), Some(PageRecord::Gap(0x1000)));
        tracker.after_range(&second);
        assert_eq!(tracker.before_range(&third), None);
        tracker.after_range(&third);
        assert_eq!(tracker.before_range(&fourth), Some(PageRecord::Gap(0x4000)));
        tracker.after_range(&fourth);
        assert_eq!(tracker.gaps(), 2);
    }

    #[test]
    fn leading_hole_starts_at_zero() {
        let mut tracker = GapTracker::new(GapMode::Sentinels);
        let range = AddressRange::new(0x400000, 0x401000);
        assert_eq!(tracker.before_range(&range), Some(PageRecord::Gap(0)));
    }

    #[test]
    fn off_mode_never_emits() {
        let mut tracker = GapTracker::new(GapMode::Off);
        for range in [AddressRange::new(0x1000, 0x2000), AddressRange::new(0x5000, 0x6000)].iter() {
            assert_eq!(tracker.before_range(range), None);
            tracker.after_range(range);
        }
        assert_eq!(tracker.gaps(), 0);
    }
}
