//! Switch counters

use std::fmt;

/// Counters maintained by the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchStats {
    /// Completed transfers of the shared stack
    pub switches: u64,
    /// Stack images captured
    pub saves: u64,
    /// Stack images restored
    pub restores: u64,
    pub bytes_saved: u64,
    pub bytes_restored: u64,
    /// Image buffers (re)allocated by the growth policy
    pub reallocations: u64,
    pub spawned: u64,
    /// Coroutines reclaimed after their entry returned
    pub retired: u64,
}

impl SwitchStats {
    /// Difference between two snapshots
    pub fn since(&self, earlier: &SwitchStats) -> SwitchStats {
        SwitchStats {
            switches: self.switches - earlier.switches,
            saves: self.saves - earlier.saves,
            restores: self.restores - earlier.restores,
            bytes_saved: self.bytes_saved - earlier.bytes_saved,
            bytes_restored: self.bytes_restored - earlier.bytes_restored,
            reallocations: self.reallocations - earlier.reallocations,
            spawned: self.spawned - earlier.spawned,
            retired: self.retired - earlier.retired,
        }
    }
}

impl fmt::Display for SwitchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "switches={} saves={} restores={} saved={}B restored={}B reallocs={} spawned={} retired={}",
            self.switches,
            self.saves,
            self.restores,
            self.bytes_saved,
            self.bytes_restored,
            self.reallocations,
            self.spawned,
            self.retired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since() {
        let a = SwitchStats {
            switches: 3,
            saves: 2,
            ..Default::default()
        };
        let b = SwitchStats {
            switches: 10,
            saves: 7,
            retired: 1,
            ..a
        };
        let d = b.since(&a);
        assert_eq!(d.switches, 7);
        assert_eq!(d.saves, 5);
        assert_eq!(d.retired, 1);
        assert_eq!(d.restores, 0);
    }

    #[test]
    fn test_display() {
        let s = SwitchStats::default();
        assert!(s.to_string().starts_with("switches=0 saves=0"));
    }
}
