use serde::{Deserialize, Serialize};

/// One grid-charge time window, applied every day of the week
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChargeWindow {
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,
}

impl ChargeWindow {
    pub const fn new(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Self {
        Self {
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        }
    }
}

/// Time-of-use grid-charge schedule pushed to the inverter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TouSchedule {
    pub windows: Vec<ChargeWindow>,
}

impl TouSchedule {
    /// The normal schedule charges only inside the cheap night zone,
    /// split at midnight because the inverter cannot express a window
    /// that wraps across it.
    pub fn night(night_start: u32, night_end: u32) -> Self {
        Self {
            windows: vec![
                ChargeWindow::new(night_start, 0, 23, 59),
                ChargeWindow::new(0, 0, night_end.saturating_sub(1), 59),
            ],
        }
    }

    /// Urgent charging ignores the tariff entirely: one all-day window,
    /// every day, until the emergency target is reached.
    pub fn all_day() -> Self {
        Self {
            windows: vec![ChargeWindow::new(0, 0, 23, 59)],
        }
    }

    /// Wire encoding understood by the inverter integration:
    /// `HH:MM-HH:MM/1234567/+`, one line per window.
    pub fn encode(&self) -> String {
        self.windows
            .iter()
            .map(|w| {
                format!(
                    "{:02}:{:02}-{:02}:{:02}/1234567/+",
                    w.start_hour, w.start_minute, w.end_hour, w.end_minute
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_night_schedule_encoding() {
        let tou = TouSchedule::night(22, 6);
        assert_eq!(tou.encode(), "22:00-23:59/1234567/+\n00:00-05:59/1234567/+");
    }

    #[test]
    fn test_urgent_schedule_is_single_all_day_window() {
        let tou = TouSchedule::all_day();
        assert_eq!(tou.windows.len(), 1);
        assert_eq!(tou.encode(), "00:00-23:59/1234567/+");
    }
}
