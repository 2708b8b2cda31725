use crate::pipeline::types::SlotCounts;
use serde::{Deserialize, Serialize};

/// Per-video occupancy, averaged over every frame that was read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyStats {
    pub total_slots: u64,
    pub available_slots: u64,
    pub occupied_slots: u64,
}

/// Running totals for one pipeline run.
#[derive(Debug, Default)]
pub struct OccupancyAccumulator {
    total_sum: u64,
    free_sum: u64,
    frames: u64,
}

impl OccupancyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the frame even when the collaborator reported no slot counts.
    pub fn record(&mut self, counts: Option<SlotCounts>) {
        if let Some(counts) = counts {
            self.total_sum += counts.total as u64;
            self.free_sum += counts.free as u64;
        }
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn finish(&self) -> OccupancyStats {
        if self.frames == 0 {
            return OccupancyStats::default();
        }

        let total_slots = self.total_sum / self.frames;
        let available_slots = self.free_sum / self.frames;
        let occupied_slots = if total_slots > 0 {
            total_slots.saturating_sub(available_slots)
        } else {
            0
        };

        OccupancyStats {
            total_slots,
            available_slots,
            occupied_slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: u32, free: u32) -> Option<SlotCounts> {
        Some(SlotCounts { free, total })
    }

    #[test]
    fn test_no_frames_yields_zero_stats() {
        let acc = OccupancyAccumulator::new();
        assert_eq!(acc.finish(), OccupancyStats::default());
    }

    #[test]
    fn test_average_is_floor_division() {
        let mut acc = OccupancyAccumulator::new();
        for total in [2, 3, 2, 3] {
            acc.record(counts(total, 0));
        }
        // 10 / 4 = 2.5 -> 2
        assert_eq!(acc.finish().total_slots, 2);
    }

    #[test]
    fn test_frames_without_counts_still_divide() {
        let mut acc = OccupancyAccumulator::new();
        acc.record(counts(5, 2));
        acc.record(counts(5, 1));
        acc.record(None);

        assert_eq!(acc.frames(), 3);
        let stats = acc.finish();
        assert_eq!(stats.total_slots, 3);
        assert_eq!(stats.available_slots, 1);
        assert_eq!(stats.occupied_slots, 2);
    }

    #[test]
    fn test_occupied_is_zero_without_slots() {
        let mut acc = OccupancyAccumulator::new();
        acc.record(None);
        acc.record(counts(0, 0));
        let stats = acc.finish();
        assert_eq!(stats.total_slots, 0);
        assert_eq!(stats.occupied_slots, 0);
    }

    #[test]
    fn test_occupied_matches_difference() {
        let mut acc = OccupancyAccumulator::new();
        for (total, free) in [(12, 4), (12, 5), (12, 3), (11, 9)] {
            acc.record(counts(total, free));
        }
        let stats = acc.finish();
        assert!(stats.total_slots > 0);
        assert_eq!(
            stats.occupied_slots,
            stats.total_slots - stats.available_slots
        );
    }

    #[test]
    fn test_more_free_than_total_saturates() {
        let mut acc = OccupancyAccumulator::new();
        acc.record(counts(2, 5));
        let stats = acc.finish();
        assert_eq!(stats.occupied_slots, 0);
    }
}
