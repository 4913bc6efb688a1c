use tracing::debug;

use super::{arbitrage, charge_priority, deficit, surplus, RuleCtx};
use crate::domain::{calendar, Mode, Priority, Strategy, Tariff};

pub type Rule = fn(&RuleCtx) -> Option<Strategy>;

/// The decision cascade, evaluated top to bottom; the first rule that
/// returns a strategy wins. Order is load-bearing: battery protection
/// outranks tariff games, tariff games outrank autoconsumption.
pub const RULES: &[(&str, Rule)] = &[
    ("critical_soc", critical_soc),
    ("low_soc", low_soc),
    ("high_soc_protect", high_soc_protect),
    ("energy_weekend", energy_weekend),
    ("cheap_window", cheap_window),
    ("expensive_window", expensive_window),
    ("autoconsumption", autoconsumption),
];

pub fn decide(ctx: &RuleCtx) -> Strategy {
    for (name, rule) in RULES {
        if let Some(strategy) = rule(ctx) {
            debug!(rule = name, mode = %strategy.mode, "cascade rule matched");
            return strategy;
        }
    }
    // autoconsumption always matches; this is unreachable in practice
    Strategy::new(Mode::Idle, Priority::Low, "no rule matched - holding idle")
}

fn is_energy_weekend(ctx: &RuleCtx) -> bool {
    calendar::is_energy_weekend(ctx.snap.weekday, ctx.snap.hour, ctx.snap.is_workday)
}

/// Rule 1: a nearly empty battery charges right now, whatever the price.
fn critical_soc(ctx: &RuleCtx) -> Option<Strategy> {
    let snap = ctx.snap;
    if snap.soc >= ctx.cfg.engine.critical_soc {
        return None;
    }
    Some(
        Strategy::new(
            Mode::ChargeFromGrid,
            Priority::Critical,
            format!("SOC {:.0}% critically low - emergency 24x7 charge", snap.soc),
        )
        .with_target(ctx.cfg.engine.emergency_target_soc)
        .urgent(),
    )
}

/// Rule 2: low battery waits for the next cheap window instead of
/// charging immediately. Suppressed on energy weekends, which allow no
/// grid charging below the critical level.
fn low_soc(ctx: &RuleCtx) -> Option<Strategy> {
    let snap = ctx.snap;
    if snap.soc >= ctx.cfg.engine.low_soc || is_energy_weekend(ctx) {
        return None;
    }
    Some(
        Strategy::new(
            Mode::ChargeFromGrid,
            Priority::High,
            format!(
                "SOC {:.0}% low - scheduling a charge for the cheap window",
                snap.soc
            ),
        )
        .with_target(snap.target_soc),
    )
}

/// Rule 3: a full battery is protected from further charging.
fn high_soc_protect(ctx: &RuleCtx) -> Option<Strategy> {
    let snap = ctx.snap;
    if snap.soc < ctx.cfg.engine.high_soc {
        return None;
    }
    if ctx.tariff.is_cheap() {
        return Some(Strategy::new(
            Mode::GridToHome,
            Priority::Low,
            format!("SOC {:.0}% high in cheap zone - preserving the battery", snap.soc),
        ));
    }
    if ctx.balance.surplus_kw >= ctx.cfg.engine.meaningful_surplus_kw {
        return Some(Strategy::new(
            Mode::DischargeToGrid,
            Priority::Normal,
            format!(
                "battery full, surplus {:.1} kW - selling",
                ctx.balance.surplus_kw
            ),
        ));
    }
    Some(Strategy::new(
        Mode::DischargeToHome,
        Priority::Normal,
        "battery full - covering the household load",
    ))
}

/// Rule 4: all-day cheap distribution on weekends and holidays makes
/// grid charging pointless; the battery only serves the house.
fn energy_weekend(ctx: &RuleCtx) -> Option<Strategy> {
    if !is_energy_weekend(ctx) {
        return None;
    }
    Some(Strategy::new(
        Mode::DischargeToHome,
        Priority::Normal,
        "energy weekend - self-consumption only, no grid charging",
    ))
}

/// Rule 5: a cheap window with the target unmet either charges or, with
/// plenty of PV expected tomorrow, deliberately leaves room for the sun.
/// PV surplus situations are delegated to the surplus handler instead.
fn cheap_window(ctx: &RuleCtx) -> Option<Strategy> {
    let snap = ctx.snap;
    if !ctx.tariff.is_cheap() || ctx.balance.surplus_kw >= ctx.cfg.engine.meaningful_surplus_kw {
        return None;
    }
    if snap.soc >= f64::from(snap.target_soc) {
        return Some(Strategy::new(
            Mode::GridToHome,
            Priority::Low,
            format!(
                "target {}% reached in cheap zone - preserving the battery",
                snap.target_soc
            ),
        ));
    }
    if snap.forecast_tomorrow_kwh >= ctx.cfg.forecast_tiers.good {
        return Some(Strategy::new(
            Mode::GridToHome,
            Priority::Low,
            format!(
                "forecast {:.0} kWh tomorrow - leaving room for the sun",
                snap.forecast_tomorrow_kwh
            ),
        ));
    }
    Some(
        Strategy::new(
            Mode::ChargeFromGrid,
            charge_priority(ctx.cfg, snap),
            format!(
                "cheap window - charging to {}% (forecast {:.0} kWh)",
                snap.target_soc, snap.forecast_tomorrow_kwh
            ),
        )
        .with_target(snap.target_soc),
    )
}

/// Rule 6: expensive hours run off the battery while PV, if any, goes
/// to the grid. Evening peak hours fall through so the deficit handler
/// can judge the arbitrage sale first.
fn expensive_window(ctx: &RuleCtx) -> Option<Strategy> {
    let snap = ctx.snap;
    if ctx.tariff != Tariff::L1
        || snap.soc <= ctx.cfg.engine.discharge_floor_soc
        || ctx.balance.surplus_kw >= ctx.cfg.engine.meaningful_surplus_kw
        || arbitrage::in_evening_window(ctx.cfg, snap.hour)
    {
        return None;
    }
    Some(Strategy::new(
        Mode::DischargeToHome,
        Priority::Normal,
        "expensive zone - battery covers the load, PV kept for resale",
    ))
}

/// Rule 7: plain autoconsumption, split by the power balance.
fn autoconsumption(ctx: &RuleCtx) -> Option<Strategy> {
    Some(if ctx.balance.surplus_kw > 0.0 {
        surplus::handle(ctx)
    } else if ctx.balance.deficit_kw > 0.0 {
        deficit::handle(ctx)
    } else {
        Strategy::new(
            Mode::Idle,
            Priority::Low,
            "production matches the load - idle",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{PowerBalance, SensorSnapshot};
    use crate::engine::optimizer::CheapHoursReport;
    use crate::engine::testutil::snapshot;
    use crate::engine::CheapHourVerdict;
    use chrono::Weekday;

    fn run(snap: &SensorSnapshot) -> Strategy {
        let cfg = Config::default();
        let cheap = CheapHoursReport {
            verdict: CheapHourVerdict::Indeterminate,
            cheapest_hours: Vec::new(),
            hours_needed: None,
            reason: "no price data available".into(),
            status: "no price data available".into(),
        };
        decide(&RuleCtx {
            cfg: &cfg,
            snap,
            balance: PowerBalance::from_power(snap.pv_power_kw, snap.home_load_kw),
            tariff: Tariff::resolve(snap.hour, snap.is_workday),
            cheap_hours: &cheap,
        })
    }

    #[test]
    fn test_critical_soc_beats_everything() {
        let mut snap = snapshot();
        snap.soc = 4.0;
        snap.pv_power_kw = 6.0; // even with a big surplus
        let s = run(&snap);
        assert_eq!(s.mode, Mode::ChargeFromGrid);
        assert!(s.urgent);
    }

    #[test]
    fn test_low_soc_schedules_cheap_charge() {
        let mut snap = snapshot();
        snap.soc = 15.0;
        snap.pv_power_kw = 0.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::ChargeFromGrid);
        assert!(!s.urgent);
        assert_eq!(s.target_soc, Some(70));
    }

    #[test]
    fn test_high_soc_expensive_hour_sells_surplus() {
        let mut snap = snapshot();
        snap.soc = 82.0;
        snap.hour = 10;
        snap.pv_power_kw = 4.0;
        snap.home_load_kw = 1.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::DischargeToGrid);
    }

    #[test]
    fn test_high_soc_no_surplus_covers_load() {
        let mut snap = snapshot();
        snap.soc = 82.0;
        snap.hour = 10;
        snap.pv_power_kw = 0.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::DischargeToHome);
    }

    #[test]
    fn test_friday_late_evening_is_weekend() {
        let mut snap = snapshot();
        snap.weekday = Weekday::Fri;
        snap.hour = 23;
        snap.pv_power_kw = 0.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::DischargeToHome);
        assert!(s.reason.contains("weekend"));
    }

    #[test]
    fn test_sunday_late_evening_allows_charging() {
        let mut snap = snapshot();
        snap.weekday = Weekday::Sun;
        snap.is_workday = false;
        snap.hour = 23;
        snap.soc = 40.0;
        snap.forecast_tomorrow_kwh = 8.0;
        snap.pv_power_kw = 0.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::ChargeFromGrid);
    }

    #[test]
    fn test_cheap_window_target_met_uses_grid() {
        let mut snap = snapshot();
        snap.hour = 2;
        snap.soc = 72.0;
        snap.pv_power_kw = 0.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::GridToHome);
        assert_eq!(s.priority, Priority::Low);
    }

    #[test]
    fn test_cheap_window_abundant_forecast_skips_charge() {
        let mut snap = snapshot();
        snap.hour = 2;
        snap.soc = 40.0;
        snap.forecast_tomorrow_kwh = 26.0;
        snap.pv_power_kw = 0.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::GridToHome);
        assert!(s.reason.contains("room for the sun"));
    }

    #[test]
    fn test_cheap_window_scarce_forecast_charges() {
        let mut snap = snapshot();
        snap.hour = 2;
        snap.soc = 40.0;
        snap.forecast_tomorrow_kwh = 8.0;
        snap.pv_power_kw = 0.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::ChargeFromGrid);
        assert_eq!(s.priority, Priority::Critical);
        assert_eq!(s.target_soc, Some(70));
    }

    #[test]
    fn test_expensive_window_discharges() {
        let mut snap = snapshot();
        snap.hour = 10;
        snap.soc = 55.0;
        snap.pv_power_kw = 0.2;
        snap.home_load_kw = 2.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::DischargeToHome);
        assert!(s.reason.contains("expensive zone"));
    }

    #[test]
    fn test_evening_window_reaches_deficit_handler() {
        let mut snap = snapshot();
        snap.hour = 20;
        snap.soc = 60.0;
        snap.price_now = 0.60;
        snap.forecast_tomorrow_kwh = 22.0;
        snap.pv_power_kw = 0.0;
        snap.home_load_kw = 1.5;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::DischargeToGrid);
        assert!(s.reason.contains("evening peak"));
    }

    #[test]
    fn test_low_soc_outranks_balanced_idle() {
        let mut snap = snapshot();
        snap.hour = 16; // L1, between peaks
        snap.soc = 15.0;
        snap.pv_power_kw = 2.0;
        snap.home_load_kw = 2.0;
        let s = run(&snap);
        assert_eq!(s.mode, Mode::ChargeFromGrid);
    }

    #[test]
    fn test_balanced_cheap_hour_at_floor_idles() {
        let mut snap = snapshot();
        snap.hour = 14; // cheap midday slot
        snap.soc = 72.0;
        snap.target_soc = 70;
        snap.pv_power_kw = 2.0;
        snap.home_load_kw = 2.0;
        let s = run(&snap);
        // target met in the cheap zone wins before the balanced default
        assert_eq!(s.mode, Mode::GridToHome);

        snap.hour = 16;
        let s = run(&snap);
        // L1 with charge in the battery covers the load
        assert_eq!(s.mode, Mode::DischargeToHome);
    }

    #[test]
    fn test_midday_surplus_delegates_to_surplus_handler() {
        let mut snap = snapshot();
        snap.hour = 13; // cheap midday slot
        snap.soc = 50.0;
        snap.pv_power_kw = 5.0;
        snap.home_load_kw = 1.0;
        snap.price_now = 0.30;
        let s = run(&snap);
        // indeterminate curve + price below static threshold stores
        assert_eq!(s.mode, Mode::ChargeFromPv);
    }
}
