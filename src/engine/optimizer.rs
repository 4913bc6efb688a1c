use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::decision_log::MAX_REASON_LEN;
use crate::domain::{PriceCurve, SensorSnapshot};

/// Store-or-sell verdict for the current surplus hour.
///
/// `Indeterminate` means the price curve was unavailable; callers must
/// fall back to the static price threshold, never treat it as "sell".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheapHourVerdict {
    Store,
    Sell,
    Indeterminate,
}

/// Result of ranking the remaining daylight hours by sell price.
/// Computed every tick for observability, consumed by the surplus rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheapHoursReport {
    pub verdict: CheapHourVerdict,
    /// Hours of the cheapest set, ascending by price
    pub cheapest_hours: Vec<u32>,
    pub hours_needed: Option<u32>,
    pub reason: String,
    /// Bounded one-liner for the dashboard status field
    pub status: String,
}

impl CheapHoursReport {
    fn sell(reason: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            verdict: CheapHourVerdict::Sell,
            cheapest_hours: Vec::new(),
            hours_needed: None,
            reason: reason.into(),
            status: bounded(status.into()),
        }
    }

    fn indeterminate(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            verdict: CheapHourVerdict::Indeterminate,
            cheapest_hours: Vec::new(),
            hours_needed: None,
            status: bounded(reason.clone()),
            reason,
        }
    }
}

fn bounded(mut s: String) -> String {
    s.truncate(MAX_REASON_LEN);
    s
}

/// Rank the remaining daylight hours of today's sell-price curve and
/// decide whether the current hour is one of the N cheapest, where N is
/// the number of hours still needed to fill the battery to target.
///
/// Storing during the cheapest sell hours and exporting during the rest
/// maximizes revenue for the same daily production.
pub fn evaluate(
    cfg: &Config,
    snap: &SensorSnapshot,
    curve: Option<&PriceCurve>,
) -> CheapHoursReport {
    let capacity = cfg.battery.capacity_kwh;
    let energy_to_store = (f64::from(snap.target_soc) - snap.soc) / 100.0 * capacity;

    if energy_to_store <= cfg.cheapest_hours.min_energy_to_store_kwh {
        return CheapHoursReport::sell(
            format!("battery already at target {}%", snap.target_soc),
            "already charged to target".to_string(),
        );
    }

    let sunrise = cfg.cheapest_hours.sunrise(snap.month);
    let sunset = cfg.cheapest_hours.sunset(snap.month);
    let after_sunset = snap.hour >= sunset;
    let hours_left = if snap.hour < sunrise || after_sunset {
        // Outside daylight the window only feeds the dashboard display
        cfg.cheapest_hours.fallback_window_hours
    } else {
        sunset - snap.hour
    };

    let hours_needed = if snap.forecast_today_kwh <= 0.0 {
        hours_left
    } else {
        let avg_pv_per_hour = snap.forecast_today_kwh / 12.0;
        (energy_to_store / avg_pv_per_hour).ceil() as u32
    }
    .clamp(1, hours_left.max(1));

    let Some(curve) = curve else {
        return CheapHoursReport::indeterminate("no price data available");
    };
    let mut daylight = curve.between(sunrise, sunset);
    if daylight.is_empty() {
        return CheapHoursReport::indeterminate(format!(
            "no prices for daylight hours {sunrise}-{sunset}"
        ));
    }

    // Stable sort: equal prices keep the earlier hour first
    daylight.sort_by_key(|slot| OrderedFloat(slot.price));
    let cheapest_hours: Vec<u32> = daylight
        .iter()
        .take(hours_needed as usize)
        .map(|s| s.hour)
        .collect();

    let status = bounded(format!(
        "need: {hours_needed}h | cheapest: {cheapest_hours:?} | now: {}h",
        snap.hour
    ));

    if after_sunset {
        return CheapHoursReport {
            verdict: CheapHourVerdict::Sell,
            cheapest_hours,
            hours_needed: Some(hours_needed),
            reason: "already past sunset".to_string(),
            status,
        };
    }

    let current_price = curve.price_at(snap.hour);
    let is_cheap = cheapest_hours.contains(&snap.hour);
    let reason = match (is_cheap, current_price) {
        (true, Some(p)) => format!(
            "cheap hour ({}h: {p:.3}) - in top {hours_needed} cheapest - store",
            snap.hour
        ),
        (true, None) => format!("cheap hour ({}h) - store", snap.hour),
        (false, Some(p)) => {
            let cheapest = daylight.first().map(|s| s.price).unwrap_or(p);
            format!(
                "expensive hour ({}h: {p:.3} vs cheapest {cheapest:.3}) - sell",
                snap.hour
            )
        }
        (false, None) => format!("hour {}h not in cheapest set - sell", snap.hour),
    };

    CheapHoursReport {
        verdict: if is_cheap {
            CheapHourVerdict::Store
        } else {
            CheapHourVerdict::Sell
        },
        cheapest_hours,
        hours_needed: Some(hours_needed),
        reason,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::HeatingMode;
    use chrono::{NaiveDate, Weekday};
    use proptest::prelude::*;

    fn snapshot(hour: u32, soc: f64, target: u8, forecast: f64) -> SensorSnapshot {
        SensorSnapshot {
            hour,
            month: 6,
            weekday: Weekday::Tue,
            is_workday: true,
            soc,
            battery_temp_c: 25.0,
            pv_power_kw: 3.0,
            home_load_kw: 1.0,
            price_now: 0.40,
            forecast_today_kwh: forecast,
            forecast_tomorrow_kwh: 18.0,
            temp_outdoor_c: 18.0,
            heating_mode: HeatingMode::NoHeating,
            pc_active: false,
            cwu_window: false,
            target_soc: target,
        }
    }

    fn curve(prices: &[(u32, f64)]) -> PriceCurve {
        PriceCurve::from_samples(
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            prices.iter().copied(),
        )
    }

    #[test]
    fn test_already_charged_skips_ranking() {
        let cfg = Config::default();
        let snap = snapshot(10, 70.0, 70, 20.0);
        let report = evaluate(&cfg, &snap, Some(&curve(&[(10, 0.30)])));
        assert_eq!(report.verdict, CheapHourVerdict::Sell);
        assert!(report.cheapest_hours.is_empty());
        assert!(report.reason.contains("already at target"));
    }

    #[test]
    fn test_no_curve_is_indeterminate() {
        let cfg = Config::default();
        let snap = snapshot(10, 40.0, 70, 20.0);
        let report = evaluate(&cfg, &snap, None);
        assert_eq!(report.verdict, CheapHourVerdict::Indeterminate);
    }

    #[test]
    fn test_single_cheapest_hour_membership() {
        let cfg = Config::default();
        // Needs ~4.5 kWh, forecast 60 -> 5 kWh/h -> 1 hour needed
        let snap = snapshot(10, 40.0, 70, 60.0);
        let c = curve(&[(9, 0.40), (10, 0.30), (11, 0.50)]);

        let report = evaluate(&cfg, &snap, Some(&c));
        assert_eq!(report.hours_needed, Some(1));
        assert_eq!(report.cheapest_hours, vec![10]);
        assert_eq!(report.verdict, CheapHourVerdict::Store);

        let at_nine = evaluate(&cfg, &snapshot(9, 40.0, 70, 60.0), Some(&c));
        assert_eq!(at_nine.verdict, CheapHourVerdict::Sell);
        let at_eleven = evaluate(&cfg, &snapshot(11, 40.0, 70, 60.0), Some(&c));
        assert_eq!(at_eleven.verdict, CheapHourVerdict::Sell);
    }

    #[test]
    fn test_increasing_prices_mark_earliest_hours() {
        let cfg = Config::default();
        // June daylight 4..21; strictly increasing prices
        let prices: Vec<(u32, f64)> = (4..21).map(|h| (h, 0.10 + f64::from(h) * 0.02)).collect();
        let c = curve(&prices);
        // 9 kWh to store, 20/12 kWh per hour forecast -> 6 hours needed
        let snap = snapshot(5, 20.0, 80, 20.0);
        let report = evaluate(&cfg, &snap, Some(&c));
        let needed = report.hours_needed.unwrap();
        let expected: Vec<u32> = (4..(4 + needed)).collect();
        assert_eq!(report.cheapest_hours, expected);
    }

    #[test]
    fn test_tie_break_keeps_earlier_hour() {
        let cfg = Config::default();
        let snap = snapshot(10, 40.0, 70, 60.0);
        let c = curve(&[(9, 0.30), (10, 0.30), (11, 0.50)]);
        let report = evaluate(&cfg, &snap, Some(&c));
        assert_eq!(report.cheapest_hours, vec![9]);
        assert_eq!(report.verdict, CheapHourVerdict::Sell);
    }

    #[test]
    fn test_no_forecast_uses_full_window() {
        let cfg = Config::default();
        let snap = snapshot(10, 20.0, 80, 0.0);
        let prices: Vec<(u32, f64)> = (4..21).map(|h| (h, 0.30)).collect();
        let report = evaluate(&cfg, &snap, Some(&curve(&prices)));
        // 11 daylight hours left (sunset 21), all needed
        assert_eq!(report.hours_needed, Some(11));
    }

    #[test]
    fn test_after_sunset_sells() {
        let cfg = Config::default();
        let snap = snapshot(22, 40.0, 70, 20.0);
        let prices: Vec<(u32, f64)> = (4..21).map(|h| (h, 0.30)).collect();
        let report = evaluate(&cfg, &snap, Some(&curve(&prices)));
        assert_eq!(report.verdict, CheapHourVerdict::Sell);
        assert!(report.reason.contains("sunset"));
    }

    proptest! {
        /// Swapping two daylight prices swaps the classification of the
        /// corresponding hours (sortedness property).
        #[test]
        fn prop_swap_prices_swaps_membership(a in 6u32..12, b in 12u32..18) {
            let cfg = Config::default();
            let mut prices: Vec<(u32, f64)> =
                (4..21).map(|h| (h, 0.10 + f64::from(h) * 0.02)).collect();
            let snap = snapshot(5, 20.0, 80, 40.0);

            let before = evaluate(&cfg, &snap, Some(&curve(&prices)));
            let in_before_a = before.cheapest_hours.contains(&a);
            let in_before_b = before.cheapest_hours.contains(&b);

            let ia = prices.iter().position(|&(h, _)| h == a).unwrap();
            let ib = prices.iter().position(|&(h, _)| h == b).unwrap();
            let tmp = prices[ia].1;
            prices[ia].1 = prices[ib].1;
            prices[ib].1 = tmp;

            let after = evaluate(&cfg, &snap, Some(&curve(&prices)));
            prop_assert_eq!(after.cheapest_hours.contains(&a), in_before_b);
            prop_assert_eq!(after.cheapest_hours.contains(&b), in_before_a);
        }
    }
}
