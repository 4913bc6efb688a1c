use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Polish public holidays 2024-2026. The tariff treats these like
/// weekends, so they feed both the resolver and the planner projection.
static HOLIDAYS: Lazy<HashSet<NaiveDate>> = Lazy::new(|| {
    const DATES: &[(i32, u32, u32)] = &[
        (2024, 1, 1),
        (2024, 1, 6),
        (2024, 11, 1),
        (2024, 11, 11),
        (2024, 12, 25),
        (2024, 12, 26),
        (2025, 1, 1),
        (2025, 1, 6),
        (2025, 4, 20),
        (2025, 4, 21),
        (2025, 5, 1),
        (2025, 5, 3),
        (2025, 6, 19),
        (2025, 8, 15),
        (2025, 11, 1),
        (2025, 11, 11),
        (2025, 12, 25),
        (2025, 12, 26),
        (2026, 1, 1),
        (2026, 1, 6),
        (2026, 4, 5),
        (2026, 4, 6),
        (2026, 5, 1),
        (2026, 5, 3),
        (2026, 8, 15),
        (2026, 11, 1),
        (2026, 11, 11),
        (2026, 12, 25),
        (2026, 12, 26),
    ];
    DATES
        .iter()
        .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .collect()
});

pub fn is_holiday(date: NaiveDate) -> bool {
    HOLIDAYS.contains(&date)
}

/// Weekend or public holiday: the whole day runs on the cheap zone.
pub fn is_weekend_or_holiday(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || is_holiday(date)
}

/// The "energy weekend" protection window: Friday 22:00 through Sunday
/// 22:00. Inside it the cascade keeps the battery on self-consumption
/// and suppresses grid charging (critically low SOC excepted) - the
/// whole span is cheap tariff, so there is nothing to pre-charge for.
pub fn is_energy_weekend(weekday: Weekday, hour: u32, is_workday: bool) -> bool {
    let friday_evening = weekday == Weekday::Fri && hour >= 22;
    let sunday_evening = weekday == Weekday::Sun && hour >= 22;
    (!is_workday || friday_evening) && !sunday_evening
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturday_is_weekend() {
        let saturday = NaiveDate::from_ymd_opt(2025, 11, 29).unwrap();
        assert_eq!(saturday.weekday(), Weekday::Sat);
        assert!(is_weekend_or_holiday(saturday));
    }

    #[test]
    fn test_monday_is_workday() {
        let monday = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        assert!(!is_weekend_or_holiday(monday));
    }

    #[test]
    fn test_christmas_is_holiday() {
        let christmas = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        assert!(is_holiday(christmas));
        assert!(is_weekend_or_holiday(christmas));
    }

    #[test]
    fn test_easter_monday_2025() {
        assert!(is_holiday(NaiveDate::from_ymd_opt(2025, 4, 21).unwrap()));
    }

    #[test]
    fn test_regular_thursday_not_holiday() {
        assert!(!is_weekend_or_holiday(
            NaiveDate::from_ymd_opt(2025, 11, 27).unwrap()
        ));
    }

    #[test]
    fn test_friday_evening_starts_energy_weekend() {
        assert!(is_energy_weekend(Weekday::Fri, 22, true));
        assert!(!is_energy_weekend(Weekday::Fri, 21, true));
    }

    #[test]
    fn test_saturday_is_energy_weekend() {
        assert!(is_energy_weekend(Weekday::Sat, 12, false));
    }

    #[test]
    fn test_sunday_evening_ends_energy_weekend() {
        assert!(is_energy_weekend(Weekday::Sun, 21, false));
        assert!(!is_energy_weekend(Weekday::Sun, 22, false));
    }
}
