use serde::{Deserialize, Serialize};

/// G12w-style two-zone time-of-use tariff. L2 is the cheap zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Tariff {
    L1,
    L2,
}

impl Tariff {
    /// Resolve the tariff zone from the wall clock and the workday flag.
    ///
    /// Deliberately computed instead of read from the external tariff
    /// sensor: that sensor updates asynchronously and can lag the hour
    /// boundary, which previously produced charge decisions against the
    /// wrong zone.
    ///
    /// Non-workdays are L2 around the clock. Workdays are L2 during the
    /// night window 22:00-06:00 and the midday window 13:00-15:00.
    pub fn resolve(hour: u32, is_workday: bool) -> Self {
        if !is_workday {
            return Tariff::L2;
        }
        if hour >= 22 || hour < 6 || (13..15).contains(&hour) {
            Tariff::L2
        } else {
            Tariff::L1
        }
    }

    pub fn is_cheap(self) -> bool {
        self == Tariff::L2
    }
}
