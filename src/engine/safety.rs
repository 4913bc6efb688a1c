use tracing::error;

use crate::config::SafetyConfig;
use crate::domain::{Mode, Priority, Strategy};

/// Battery temperature interlock, evaluated before anything else on
/// every tick. It needs only the raw temperature reading, so it also
/// runs when the rest of the snapshot fails validation.
pub struct SafetyInterlock {
    min_temp_c: f64,
    max_temp_c: f64,
}

impl SafetyInterlock {
    pub fn new(cfg: &SafetyConfig) -> Self {
        Self {
            min_temp_c: cfg.min_battery_temp_c,
            max_temp_c: cfg.max_battery_temp_c,
        }
    }

    /// `None` when the temperature is inside the safe band or no reading
    /// is available; an absent sensor must not halt the installation.
    /// A trip carries the offending temperature in its reason, which is
    /// all downstream consumers need.
    pub fn check(&self, battery_temp_c: Option<f64>) -> Option<Strategy> {
        let temp = battery_temp_c?;
        if (self.min_temp_c..=self.max_temp_c).contains(&temp) {
            return None;
        }
        error!(
            temperature_c = temp,
            min_c = self.min_temp_c,
            max_c = self.max_temp_c,
            "battery temperature outside safe band, halting grid charge"
        );
        Some(Strategy::new(
            Mode::Idle,
            Priority::Critical,
            format!(
                "SAFETY: battery temperature {temp:.1}C outside safe band \
                 {:.0}..{:.0}C - grid charging halted",
                self.min_temp_c, self.max_temp_c
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn interlock() -> SafetyInterlock {
        SafetyInterlock::new(&SafetyConfig::default())
    }

    #[rstest]
    #[case(0.0)]
    #[case(25.0)]
    #[case(45.0)]
    fn test_safe_band_passes(#[case] temp: f64) {
        assert!(interlock().check(Some(temp)).is_none());
    }

    #[rstest]
    #[case(-3.0)]
    #[case(48.0)]
    fn test_out_of_band_trips(#[case] temp: f64) {
        let halt = interlock().check(Some(temp)).unwrap();
        assert_eq!(halt.mode, Mode::Idle);
        assert_eq!(halt.priority, Priority::Critical);
        assert!(halt.reason.contains("temperature"));
        // the reading itself is preserved in the audit trail
        assert!(halt.reason.contains(&format!("{temp:.1}C")));
    }

    #[test]
    fn test_missing_reading_does_not_trip() {
        assert!(interlock().check(None).is_none());
    }
}
