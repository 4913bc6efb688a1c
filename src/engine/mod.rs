pub mod arbitrage;
pub mod cascade;
pub mod deficit;
pub mod optimizer;
pub mod planner;
pub mod safety;
pub mod surplus;

pub use optimizer::{CheapHourVerdict, CheapHoursReport};
pub use safety::SafetyInterlock;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::domain::types::{HeatingMode, SnapshotError};
use crate::domain::{
    Mode, PowerBalance, PriceCurve, Priority, RawSnapshot, SensorSnapshot, Strategy, Tariff,
};

/// Errors the dispatch pipeline distinguishes at the tick boundary.
/// Each variant maps to a different degraded behavior, never a crash.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing input: {0}")]
    MissingInput(#[from] SnapshotError),
    #[error("price data unavailable: {0}")]
    PriceDataUnavailable(String),
    #[error("actuation failure: {0}")]
    ActuationFailure(String),
}

/// Everything a cascade rule may look at for one tick. Borrowed, so
/// rules stay plain functions without state of their own.
pub struct RuleCtx<'a> {
    pub cfg: &'a Config,
    pub snap: &'a SensorSnapshot,
    pub balance: PowerBalance,
    pub tariff: Tariff,
    pub cheap_hours: &'a CheapHoursReport,
}

/// Full output of one dispatch evaluation, kept for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct TickDecision {
    pub strategy: Strategy,
    pub balance: PowerBalance,
    pub tariff: Tariff,
    pub cheap_hours: CheapHoursReport,
    /// The daily target is met; grid charging gets switched off while
    /// discharge and protection rules still apply.
    pub target_achieved: bool,
}

/// Pure decision core: same snapshot and curve in, same decision out.
pub struct DispatchEngine {
    cfg: Config,
}

impl DispatchEngine {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn decide(&self, snap: &SensorSnapshot, curve: Option<&PriceCurve>) -> TickDecision {
        let tariff = Tariff::resolve(snap.hour, snap.is_workday);
        let balance = PowerBalance::from_power(snap.pv_power_kw, snap.home_load_kw);
        let cheap_hours = optimizer::evaluate(&self.cfg, snap, curve);
        let target_achieved = snap.soc >= f64::from(snap.target_soc);

        let strategy = if target_achieved && self.cfg.engine.target_achieved_short_circuits {
            Strategy::new(
                Mode::DischargeToHome,
                Priority::Low,
                format!(
                    "target {}% reached at SOC {:.0}% - grid charging off",
                    snap.target_soc, snap.soc
                ),
            )
        } else {
            let ctx = RuleCtx {
                cfg: &self.cfg,
                snap,
                balance,
                tariff,
                cheap_hours: &cheap_hours,
            };
            cascade::decide(&ctx)
        };

        debug!(
            mode = %strategy.mode,
            priority = %strategy.priority,
            soc = snap.soc,
            hour = snap.hour,
            tariff = ?tariff,
            "dispatch decision"
        );

        TickDecision {
            strategy,
            balance,
            tariff,
            cheap_hours,
            target_achieved,
        }
    }

    /// Degraded policy for a snapshot that failed validation: protect
    /// the battery from running empty, otherwise hold still until the
    /// sensors come back.
    pub fn fallback(&self, raw: &RawSnapshot, err: &SnapshotError) -> Strategy {
        match raw.soc {
            Some(soc) if soc < self.cfg.engine.fallback_low_soc => Strategy::new(
                Mode::ChargeFromGrid,
                Priority::High,
                format!("FALLBACK ({err}): SOC {soc:.0}% low - charging to safe level"),
            )
            .with_target(self.cfg.engine.fallback_charge_target),
            _ => Strategy::new(
                Mode::Idle,
                Priority::Low,
                format!("FALLBACK ({err}): holding idle until sensors recover"),
            ),
        }
    }
}

/// Priority for a scheduled grid charge, scaled by how much PV tomorrow
/// is expected to bring and whether the heat pump depends on the battery.
pub(crate) fn charge_priority(cfg: &Config, snap: &SensorSnapshot) -> Priority {
    let tiers = &cfg.forecast_tiers;
    let base = if snap.forecast_tomorrow_kwh < tiers.medium {
        Priority::Critical
    } else if snap.forecast_tomorrow_kwh < tiers.very_good {
        Priority::High
    } else {
        Priority::Normal
    };
    if snap.heating_mode == HeatingMode::HeatingSeason {
        match base {
            Priority::Normal => Priority::High,
            Priority::High => Priority::Critical,
            other => other,
        }
    } else {
        base
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use chrono::Weekday;

    /// Mid-day workday snapshot with sane defaults; tests override fields.
    pub fn snapshot() -> SensorSnapshot {
        SensorSnapshot {
            hour: 12,
            month: 6,
            weekday: Weekday::Tue,
            is_workday: true,
            soc: 50.0,
            battery_temp_c: 25.0,
            pv_power_kw: 2.0,
            home_load_kw: 2.0,
            price_now: 0.45,
            forecast_today_kwh: 18.0,
            forecast_tomorrow_kwh: 18.0,
            temp_outdoor_c: 18.0,
            heating_mode: HeatingMode::NoHeating,
            pc_active: false,
            cwu_window: false,
            target_soc: 70,
        }
    }
}
