use super::{arbitrage, charge_priority, RuleCtx};
use crate::domain::types::HeatingMode;
use crate::domain::{Mode, Priority, Strategy, Tariff};

/// Household load exceeds PV: pick the cheapest source for the gap and
/// decide whether this hour is worth a grid charge or an evening sale.
pub fn handle(ctx: &RuleCtx) -> Strategy {
    if let Some(s) = grid_charge_opportunity(ctx) {
        return s;
    }

    if let Some(sale) = arbitrage::evaluate(ctx.cfg, ctx.snap) {
        return Strategy::new(Mode::DischargeToGrid, Priority::High, sale.reason)
            .with_target(sale.floor_soc);
    }

    let snap = ctx.snap;
    match snap.heating_mode {
        HeatingMode::HeatingSeason => {
            if ctx.tariff == Tariff::L1 {
                if snap.soc > 25.0 {
                    return Strategy::new(
                        Mode::DischargeToHome,
                        Priority::Critical,
                        "heat pump in expensive zone - battery carries the load",
                    );
                }
                return Strategy::new(
                    Mode::ChargeFromGrid,
                    Priority::High,
                    format!(
                        "SOC {:.0}% too low for the heat pump - topping up",
                        snap.soc
                    ),
                )
                .with_target(snap.target_soc);
            }
            if snap.cwu_window {
                if snap.soc > 70.0 {
                    return Strategy::new(
                        Mode::GridToHome,
                        Priority::Normal,
                        "water heating in cheap zone - battery saved for expensive hours",
                    );
                }
                return Strategy::new(
                    Mode::ChargeFromGrid,
                    Priority::High,
                    "water heating in cheap zone - grid covers it and tops up the battery",
                )
                .with_target(snap.target_soc);
            }
        }
        HeatingMode::NoHeating => {
            if ctx.tariff == Tariff::L1 && snap.soc > 20.0 {
                return Strategy::new(
                    Mode::DischargeToHome,
                    Priority::High,
                    "expensive zone - the battery covers the load",
                );
            }
            if snap.cwu_window {
                return Strategy::new(
                    Mode::GridToHome,
                    Priority::Low,
                    "water heating in cheap zone - grid covers it",
                );
            }
        }
    }

    if snap.soc > ctx.cfg.engine.discharge_floor_soc {
        Strategy::new(
            Mode::DischargeToHome,
            Priority::Normal,
            "standard self-consumption",
        )
    } else {
        Strategy::new(
            Mode::GridToHome,
            Priority::High,
            format!("SOC {:.0}% at the floor - grid covers the load", snap.soc),
        )
    }
}

/// Ordered grid-charge eligibility checks; the first match wins.
fn grid_charge_opportunity(ctx: &RuleCtx) -> Option<Strategy> {
    let snap = ctx.snap;
    let e = &ctx.cfg.engine;
    let max_policy = f64::from(e.max_policy_soc);

    if snap.price_now < 0.0 && snap.soc < max_policy {
        return Some(
            Strategy::new(
                Mode::ChargeFromGrid,
                Priority::Critical,
                format!(
                    "negative price {:.3}/kWh - the market pays for charging",
                    snap.price_now
                ),
            )
            .with_target(e.max_policy_soc),
        );
    }

    if snap.price_now < e.ultra_low_price
        && (11..=14).contains(&snap.hour)
        && snap.forecast_tomorrow_kwh < 10.0
        && snap.soc < 70.0
    {
        return Some(
            Strategy::new(
                Mode::ChargeFromGrid,
                Priority::High,
                format!(
                    "midday price {:.3}/kWh with cloudy tomorrow - charging now",
                    snap.price_now
                ),
            )
            .with_target(e.max_policy_soc),
        );
    }

    let night = snap.hour >= 22 || snap.hour < 6;
    if ctx.tariff.is_cheap() && night && snap.soc < f64::from(snap.target_soc) {
        return Some(
            Strategy::new(
                Mode::ChargeFromGrid,
                charge_priority(ctx.cfg, snap),
                format!("night window - charging to the {}% target", snap.target_soc),
            )
            .with_target(snap.target_soc),
        );
    }

    // Last cheap hours before the morning L1 block
    if (4..=5).contains(&snap.hour)
        && ctx.tariff.is_cheap()
        && snap.forecast_tomorrow_kwh < ctx.cfg.forecast_tiers.poor
        && snap.soc < 70.0
    {
        return Some(
            Strategy::new(
                Mode::ChargeFromGrid,
                Priority::Critical,
                "last cheap hours before morning peak with a poor forecast",
            )
            .with_target(e.max_policy_soc),
        );
    }

    if snap.soc < 15.0 {
        return Some(
            Strategy::new(
                Mode::ChargeFromGrid,
                Priority::Critical,
                format!("SOC {:.0}% dangerously low - charging regardless of price", snap.soc),
            )
            .with_target(30),
        );
    }

    None
}
