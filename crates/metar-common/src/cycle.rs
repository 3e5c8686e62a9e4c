//! Hourly METAR cycles published by the NOAA archive.
//!
//! The archive publishes one file per UTC hour (`00Z.TXT` .. `23Z.TXT`).
//! Each cycle also owns exactly one local dedup-state file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MetarError, MetarResult};

/// Number of cycles published per day.
pub const CYCLE_COUNT: usize = 24;

/// One of the 24 fixed UTC-hour cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Cycle(u8);

impl Cycle {
    /// All 24 cycles in hour order.
    pub const ALL: [Cycle; CYCLE_COUNT] = {
        let mut cycles = [Cycle(0); CYCLE_COUNT];
        let mut hour = 0;
        while hour < CYCLE_COUNT {
            cycles[hour] = Cycle(hour as u8);
            hour += 1;
        }
        cycles
    };

    /// Create a cycle from an hour in `0..24`.
    pub fn new(hour: u32) -> MetarResult<Self> {
        if (hour as usize) < CYCLE_COUNT {
            Ok(Self(hour as u8))
        } else {
            Err(MetarError::InvalidCycle(hour))
        }
    }

    /// Iterate over all cycles in hour order.
    pub fn all() -> impl Iterator<Item = Cycle> {
        Self::ALL.into_iter()
    }

    /// Hour of day (0-23).
    pub fn hour(&self) -> u32 {
        self.0 as u32
    }

    /// Position of this cycle in a fixed 24-slot collection.
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Name of the file the archive publishes for this cycle, e.g. `07Z.TXT`.
    pub fn remote_filename(&self) -> String {
        format!("{:02}Z.TXT", self.0)
    }

    /// Name of the local dedup-state file for this cycle.
    pub fn state_filename(&self) -> String {
        format!("cycle-state-{:02}", self.0)
    }

    /// Full path of the dedup-state file below `state_dir`.
    pub fn state_path(&self, state_dir: &Path) -> PathBuf {
        state_dir.join(self.state_filename())
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}Z", self.0)
    }
}

impl TryFrom<u32> for Cycle {
    type Error = MetarError;

    fn try_from(hour: u32) -> MetarResult<Self> {
        Cycle::new(hour)
    }
}

impl From<Cycle> for u32 {
    fn from(cycle: Cycle) -> u32 {
        cycle.hour()
    }
}
