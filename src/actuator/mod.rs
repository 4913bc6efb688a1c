pub mod sim;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Config;
use crate::domain::{Mode, Strategy, TouSchedule};

/// Inverter operating modes the installation actually supports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkingMode {
    SelfConsumption,
    TimeOfUse,
    FeedToGrid,
}

/// Concrete register values derived from a strategy. Building the plan
/// is pure; pushing it to the hardware is the actuator's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuationPlan {
    pub working_mode: WorkingMode,
    pub grid_charge: bool,
    /// Grid charge cutoff, percent; `None` leaves the register alone
    pub charge_soc_limit: Option<u8>,
    /// Discharge cutoff for feed-in, percent
    pub discharge_soc_limit: Option<u8>,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub tou: Option<TouSchedule>,
}

impl ActuationPlan {
    pub fn for_strategy(strategy: &Strategy, cfg: &Config) -> Self {
        let b = &cfg.battery;
        match strategy.mode {
            Mode::ChargeFromGrid => Self {
                working_mode: WorkingMode::TimeOfUse,
                grid_charge: true,
                charge_soc_limit: Some(strategy.target_soc.unwrap_or(b.hardware_max_soc)),
                discharge_soc_limit: Some(b.hardware_min_soc),
                max_charge_kw: b.max_charge_kw,
                max_discharge_kw: b.max_discharge_kw,
                tou: Some(if strategy.urgent {
                    TouSchedule::all_day()
                } else {
                    TouSchedule::night(22, 6)
                }),
            },
            Mode::DischargeToGrid => Self {
                working_mode: WorkingMode::FeedToGrid,
                grid_charge: false,
                charge_soc_limit: None,
                discharge_soc_limit: Some(strategy.target_soc.unwrap_or(30)),
                max_charge_kw: b.max_charge_kw,
                max_discharge_kw: b.max_discharge_kw,
                tou: None,
            },
            Mode::ChargeFromPv | Mode::DischargeToHome | Mode::GridToHome | Mode::Idle => Self {
                working_mode: WorkingMode::SelfConsumption,
                grid_charge: false,
                charge_soc_limit: None,
                discharge_soc_limit: Some(b.hardware_min_soc),
                max_charge_kw: b.max_charge_kw,
                max_discharge_kw: b.max_discharge_kw,
                tou: None,
            },
        }
    }

    /// Interlock response: no grid charging, no charge power at all.
    pub fn safety_halt(cfg: &Config) -> Self {
        Self {
            working_mode: WorkingMode::SelfConsumption,
            grid_charge: false,
            charge_soc_limit: None,
            discharge_soc_limit: Some(cfg.battery.hardware_min_soc),
            max_charge_kw: 0.0,
            max_discharge_kw: cfg.battery.max_discharge_kw,
            tou: None,
        }
    }

    /// Conservative default applied when a tick fails unexpectedly.
    pub fn safe_default(cfg: &Config) -> Self {
        Self {
            working_mode: WorkingMode::SelfConsumption,
            grid_charge: false,
            charge_soc_limit: None,
            discharge_soc_limit: Some(cfg.battery.hardware_min_soc),
            max_charge_kw: cfg.battery.max_charge_kw,
            max_discharge_kw: cfg.battery.max_discharge_kw,
            tou: None,
        }
    }
}

/// Low-level inverter writes, one per register group. Every method is
/// independent; a failed write must not block the remaining ones.
#[async_trait]
pub trait ModeActuator: Send + Sync {
    async fn set_working_mode(&self, mode: WorkingMode) -> anyhow::Result<()>;
    async fn set_grid_charge(&self, enabled: bool) -> anyhow::Result<()>;
    async fn set_charge_soc_limit(&self, percent: u8) -> anyhow::Result<()>;
    async fn set_discharge_soc_limit(&self, percent: u8) -> anyhow::Result<()>;
    async fn set_power_caps(&self, charge_kw: f64, discharge_kw: f64) -> anyhow::Result<()>;
    async fn set_tou_schedule(&self, schedule: &TouSchedule) -> anyhow::Result<()>;
}

/// Outcome of pushing one plan: which writes failed, if any.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ActuationReport {
    pub failures: Vec<String>,
}

impl ActuationReport {
    pub fn all_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Push every register of the plan, best effort. Failures are collected
/// and logged rather than propagated so one bad write cannot leave the
/// rest of the inverter state stale.
pub async fn apply_plan(actuator: &dyn ModeActuator, plan: &ActuationPlan) -> ActuationReport {
    let mut report = ActuationReport::default();
    let mut note = |label: &str, result: anyhow::Result<()>| {
        if let Err(e) = result {
            warn!(register = label, error = %e, "inverter write failed");
            report.failures.push(format!("{label}: {e:#}"));
        }
    };

    note(
        "working_mode",
        actuator.set_working_mode(plan.working_mode).await,
    );
    note("grid_charge", actuator.set_grid_charge(plan.grid_charge).await);
    if let Some(limit) = plan.charge_soc_limit {
        note(
            "charge_soc_limit",
            actuator.set_charge_soc_limit(limit).await,
        );
    }
    if let Some(limit) = plan.discharge_soc_limit {
        note(
            "discharge_soc_limit",
            actuator.set_discharge_soc_limit(limit).await,
        );
    }
    note(
        "power_caps",
        actuator
            .set_power_caps(plan.max_charge_kw, plan.max_discharge_kw)
            .await,
    );
    if let Some(tou) = &plan.tou {
        note("tou_schedule", actuator.set_tou_schedule(tou).await);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::sim::SimulatedActuator;
    use super::*;
    use crate::domain::Priority;

    #[test]
    fn test_grid_charge_plan_uses_night_schedule() {
        let cfg = Config::default();
        let strategy =
            Strategy::new(Mode::ChargeFromGrid, Priority::High, "test").with_target(65);
        let plan = ActuationPlan::for_strategy(&strategy, &cfg);
        assert_eq!(plan.working_mode, WorkingMode::TimeOfUse);
        assert!(plan.grid_charge);
        assert_eq!(plan.charge_soc_limit, Some(65));
        assert_eq!(plan.tou, Some(TouSchedule::night(22, 6)));
    }

    #[test]
    fn test_urgent_charge_gets_all_day_window() {
        let cfg = Config::default();
        let strategy = Strategy::new(Mode::ChargeFromGrid, Priority::Critical, "test")
            .with_target(35)
            .urgent();
        let plan = ActuationPlan::for_strategy(&strategy, &cfg);
        assert_eq!(plan.tou, Some(TouSchedule::all_day()));
    }

    #[test]
    fn test_feed_in_plan_sets_discharge_floor() {
        let cfg = Config::default();
        let strategy =
            Strategy::new(Mode::DischargeToGrid, Priority::High, "test").with_target(45);
        let plan = ActuationPlan::for_strategy(&strategy, &cfg);
        assert_eq!(plan.working_mode, WorkingMode::FeedToGrid);
        assert!(!plan.grid_charge);
        assert_eq!(plan.discharge_soc_limit, Some(45));
    }

    #[test]
    fn test_household_modes_share_self_consumption() {
        let cfg = Config::default();
        for mode in [
            Mode::ChargeFromPv,
            Mode::DischargeToHome,
            Mode::GridToHome,
            Mode::Idle,
        ] {
            let plan =
                ActuationPlan::for_strategy(&Strategy::new(mode, Priority::Normal, "test"), &cfg);
            assert_eq!(plan.working_mode, WorkingMode::SelfConsumption);
            assert!(!plan.grid_charge);
        }
    }

    #[test]
    fn test_safety_halt_zeroes_charge_power() {
        let cfg = Config::default();
        let plan = ActuationPlan::safety_halt(&cfg);
        assert!(!plan.grid_charge);
        assert_eq!(plan.max_charge_kw, 0.0);
    }

    #[tokio::test]
    async fn test_apply_plan_records_state() {
        let cfg = Config::default();
        let actuator = SimulatedActuator::default();
        let strategy =
            Strategy::new(Mode::ChargeFromGrid, Priority::High, "test").with_target(70);
        let plan = ActuationPlan::for_strategy(&strategy, &cfg);
        let report = apply_plan(&actuator, &plan).await;
        assert!(report.all_ok());
        let state = actuator.state();
        assert_eq!(state.working_mode, Some(WorkingMode::TimeOfUse));
        assert_eq!(state.grid_charge, Some(true));
        assert_eq!(state.charge_soc_limit, Some(70));
    }

    #[tokio::test]
    async fn test_apply_plan_continues_past_failures() {
        let cfg = Config::default();
        let actuator = SimulatedActuator::failing_register("grid_charge");
        let strategy = Strategy::new(Mode::DischargeToHome, Priority::Normal, "test");
        let plan = ActuationPlan::for_strategy(&strategy, &cfg);
        let report = apply_plan(&actuator, &plan).await;
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("grid_charge"));
        // later writes still landed
        assert_eq!(
            actuator.state().working_mode,
            Some(WorkingMode::SelfConsumption)
        );
    }
}
