use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, Timelike};
use parking_lot::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::actuator::{apply_plan, ActuationPlan, ModeActuator};
use crate::config::Config;
use crate::decision_log::DecisionLog;
use crate::domain::types::HeatingMode;
use crate::domain::{DailyPlan, Strategy};
use crate::engine::planner::{self, PlannerInputs};
use crate::engine::{DispatchEngine, EngineError, SafetyInterlock, TickDecision};
use crate::providers::profile::default_profile;
use crate::providers::{ConsumptionProfileSource, PriceDay, PriceProvider, SensorBus, TargetSocStore};

/// Shared handle the HTTP API works against.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<DispatchController>,
}

impl AppState {
    pub fn new(cfg: Config, controller: Arc<DispatchController>) -> Self {
        Self { cfg, controller }
    }
}

/// Owns one installation: reads sensors, runs the engine, pushes the
/// result to the inverter, and keeps the recent history for the API.
pub struct DispatchController {
    cfg: Config,
    engine: DispatchEngine,
    safety: SafetyInterlock,
    sensors: Arc<dyn SensorBus>,
    prices: Arc<dyn PriceProvider>,
    profile: Arc<dyn ConsumptionProfileSource>,
    target_store: Arc<dyn TargetSocStore>,
    actuator: Arc<dyn ModeActuator>,
    decision_log: Mutex<DecisionLog>,
    last_decision: RwLock<Option<TickDecision>>,
    last_strategy: RwLock<Option<Strategy>>,
    last_plan: RwLock<Option<DailyPlan>>,
    last_plan_date: Mutex<Option<NaiveDate>>,
}

impl DispatchController {
    pub fn new(
        cfg: Config,
        sensors: Arc<dyn SensorBus>,
        prices: Arc<dyn PriceProvider>,
        profile: Arc<dyn ConsumptionProfileSource>,
        target_store: Arc<dyn TargetSocStore>,
        actuator: Arc<dyn ModeActuator>,
    ) -> Self {
        Self {
            engine: DispatchEngine::new(cfg.clone()),
            safety: SafetyInterlock::new(&cfg.safety),
            cfg,
            sensors,
            prices,
            profile,
            target_store,
            actuator,
            decision_log: Mutex::new(DecisionLog::default()),
            last_decision: RwLock::new(None),
            last_strategy: RwLock::new(None),
            last_plan: RwLock::new(None),
            last_plan_date: Mutex::new(None),
        }
    }

    /// One guarded dispatch cycle. Whatever fails inside, the inverter
    /// ends the tick in a known state and the loop keeps running.
    pub async fn run_tick(&self) {
        if let Err(e) = self.tick().await {
            error!(error = %format!("{e:#}"), "tick failed, reverting to self-consumption");
            let plan = ActuationPlan::safe_default(&self.cfg);
            let report = apply_plan(self.actuator.as_ref(), &plan).await;
            if !report.all_ok() {
                error!(failures = ?report.failures, "safe-default actuation incomplete");
            }
            self.decision_log
                .lock()
                .record_error(format!("tick failed: {e:#} - reverted to self-consumption"));
        }
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let mut raw = self.sensors.read_snapshot().await?;

        // The interlock only needs the temperature reading, so it runs
        // before validation can reject the snapshot.
        if let Some(halt) = self.safety.check(raw.battery_temp_c) {
            let plan = ActuationPlan::safety_halt(&self.cfg);
            let report = apply_plan(self.actuator.as_ref(), &plan).await;
            if !report.all_ok() {
                error!(failures = ?report.failures, "safety halt actuation incomplete");
            }
            self.decision_log.lock().record_strategy(&halt);
            *self.last_strategy.write() = Some(halt);
            return Ok(());
        }

        // The planner's stored target outranks whatever the bus reports
        match self.target_store.read().await {
            Ok(Some(target)) => raw.target_soc = Some(target),
            Ok(None) => {}
            Err(e) => warn!(error = %format!("{e:#}"), "target store unreadable"),
        }

        let strategy = match raw.validate() {
            Ok(snap) => {
                let curve = match self.prices.curve_for(PriceDay::Today).await {
                    Ok(curve) => Some(curve),
                    Err(e) => {
                        let err = EngineError::PriceDataUnavailable(format!("{e:#}"));
                        warn!(error = %err, "degrading to the static price thresholds");
                        self.decision_log.lock().record_failure(&err);
                        None
                    }
                };
                let decision = self.engine.decide(&snap, curve.as_ref());
                let strategy = decision.strategy.clone();
                *self.last_decision.write() = Some(decision);
                strategy
            }
            Err(invalid) => {
                let strategy = self.engine.fallback(&raw, &invalid);
                let err = EngineError::MissingInput(invalid);
                warn!(error = %err, mode = %strategy.mode, "snapshot invalid, fallback policy");
                self.decision_log.lock().record_failure(&err);
                strategy
            }
        };

        let plan = ActuationPlan::for_strategy(&strategy, &self.cfg);
        let report = apply_plan(self.actuator.as_ref(), &plan).await;
        if !report.all_ok() {
            let err = EngineError::ActuationFailure(report.failures.join("; "));
            error!(error = %err, "inverter rejected part of the plan");
            self.decision_log.lock().record_failure(&err);
        }

        info!(
            mode = %strategy.mode,
            priority = %strategy.priority,
            reason = %strategy.reason,
            "tick complete"
        );
        self.decision_log.lock().record_strategy(&strategy);
        *self.last_strategy.write() = Some(strategy);
        Ok(())
    }

    /// Compute tonight's charge target and persist it for the cascade.
    pub async fn run_planner(&self) {
        let raw = self.sensors.read_snapshot().await.unwrap_or_default();
        let inputs = PlannerInputs {
            current_soc: raw.soc.unwrap_or(50.0),
            forecast_tomorrow_kwh: raw.forecast_tomorrow_kwh.unwrap_or(0.0),
            temp_outdoor_c: raw.temp_outdoor_c.unwrap_or(5.0),
            heating_mode: raw.heating_mode.unwrap_or(HeatingMode::NoHeating),
        };
        let profile = match self.profile.load().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "profile unavailable, using built-in");
                default_profile()
            }
        };

        let plan = planner::compute_plan(&self.cfg, &profile, Local::now(), &inputs);
        if let Err(e) = self.target_store.write(plan.target_soc).await {
            error!(error = %format!("{e:#}"), "could not persist the charge target");
            self.decision_log
                .lock()
                .record_error(format!("target store write failed: {e:#}"));
        }

        let (title, body) = planner::notification_text(&plan);
        info!(target_soc = plan.target_soc, %title, %body, "daily plan computed");
        *self.last_plan.write() = Some(plan);
    }

    fn planner_due(&self, now: chrono::DateTime<Local>) -> bool {
        if now.hour() != self.cfg.planner.run_hour {
            return false;
        }
        let today = now.date_naive();
        let mut last = self.last_plan_date.lock();
        if *last == Some(today) {
            return false;
        }
        *last = Some(today);
        true
    }

    pub fn last_decision(&self) -> Option<TickDecision> {
        self.last_decision.read().clone()
    }

    pub fn last_strategy(&self) -> Option<Strategy> {
        self.last_strategy.read().clone()
    }

    pub fn last_plan(&self) -> Option<DailyPlan> {
        self.last_plan.read().clone()
    }

    pub fn log_entries(&self) -> Vec<crate::decision_log::LogEntry> {
        self.decision_log.lock().entries()
    }

    /// Bounded one-liner for dashboards, from the latest optimizer run.
    pub fn status_line(&self) -> String {
        self.last_decision
            .read()
            .as_ref()
            .map(|d| d.cheap_hours.status.clone())
            .unwrap_or_else(|| "no decision yet".to_string())
    }
}

/// Spawn the hourly dispatch loop and the minutely planner check.
pub fn spawn_controller_tasks(controller: Arc<DispatchController>) {
    let dispatch = controller.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(dispatch.cfg.controller.tick_seconds));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            dispatch.run_tick().await;
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if controller.planner_due(Local::now()) {
                controller.run_planner().await;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::sim::SimulatedActuator;
    use crate::actuator::WorkingMode;
    use crate::decision_log::Category;
    use crate::domain::{Mode, RawSnapshot};
    use crate::providers::prices::synthetic_curve;
    use crate::providers::{
        DefaultProfileSource, InMemoryTargetSocStore, StaticPriceProvider, StaticSensorBus,
    };
    use chrono::Weekday;

    fn full_raw() -> RawSnapshot {
        RawSnapshot {
            hour: Some(12),
            month: Some(6),
            weekday: Some(Weekday::Tue),
            is_workday: Some(true),
            soc: Some(50.0),
            battery_temp_c: Some(25.0),
            pv_power_kw: Some(4.0),
            home_load_kw: Some(1.0),
            price_now: Some(0.45),
            forecast_today_kwh: Some(20.0),
            forecast_tomorrow_kwh: Some(18.0),
            temp_outdoor_c: Some(18.0),
            heating_mode: Some(HeatingMode::NoHeating),
            pc_active: Some(false),
            cwu_window: Some(false),
            target_soc: Some(70),
        }
    }

    struct Fixture {
        controller: Arc<DispatchController>,
        actuator: Arc<SimulatedActuator>,
        target_store: Arc<InMemoryTargetSocStore>,
    }

    fn fixture(raw: RawSnapshot) -> Fixture {
        let cfg = Config::default();
        let actuator = Arc::new(SimulatedActuator::default());
        let target_store = Arc::new(InMemoryTargetSocStore::default());
        let prices = StaticPriceProvider::with_today(synthetic_curve(Local::now().date_naive()));
        let controller = Arc::new(DispatchController::new(
            cfg,
            Arc::new(StaticSensorBus::new(raw)),
            Arc::new(prices),
            Arc::new(DefaultProfileSource),
            target_store.clone(),
            actuator.clone(),
        ));
        Fixture {
            controller,
            actuator,
            target_store,
        }
    }

    #[tokio::test]
    async fn test_tick_applies_decision_and_logs() {
        let f = fixture(full_raw());
        f.controller.run_tick().await;
        let strategy = f.controller.last_strategy().unwrap();
        assert!(f.controller.last_decision().is_some());
        assert_eq!(f.controller.log_entries().len(), 1);
        assert!(f.actuator.state().working_mode.is_some());
        // hour 12 is outside the two cheapest valley hours, so the
        // surplus goes to the grid
        assert_eq!(strategy.mode, Mode::DischargeToGrid);
    }

    #[tokio::test]
    async fn test_safety_trip_halts_charging() {
        let mut raw = full_raw();
        raw.battery_temp_c = Some(52.0);
        let f = fixture(raw);
        f.controller.run_tick().await;
        let state = f.actuator.state();
        assert_eq!(state.grid_charge, Some(false));
        assert_eq!(state.max_charge_kw, Some(0.0));
        let strategy = f.controller.last_strategy().unwrap();
        assert!(strategy.reason.contains("SAFETY"));
        // validation never ran; no full decision recorded
        assert!(f.controller.last_decision().is_none());
    }

    #[tokio::test]
    async fn test_missing_input_uses_fallback() {
        let mut raw = full_raw();
        raw.soc = None;
        let f = fixture(raw);
        f.controller.run_tick().await;
        let strategy = f.controller.last_strategy().unwrap();
        assert!(strategy.reason.starts_with("FALLBACK"));
        assert_eq!(strategy.mode, Mode::Idle);
        // the missing input itself lands in the log as a typed entry
        assert!(f
            .controller
            .log_entries()
            .iter()
            .any(|e| e.category == Category::Error && e.message.contains("missing input")));
    }

    #[tokio::test]
    async fn test_price_outage_logs_price_category() {
        let controller = DispatchController::new(
            Config::default(),
            Arc::new(StaticSensorBus::new(full_raw())),
            Arc::new(StaticPriceProvider::default()),
            Arc::new(DefaultProfileSource),
            Arc::new(InMemoryTargetSocStore::default()),
            Arc::new(SimulatedActuator::default()),
        );
        controller.run_tick().await;
        let entries = controller.log_entries();
        assert!(entries
            .iter()
            .any(|e| e.category == Category::Price
                && e.message.contains("price data unavailable")));
        // the tick still produced a strategy
        assert!(controller.last_strategy().is_some());
    }

    #[tokio::test]
    async fn test_stored_target_overrides_bus() {
        let f = fixture(full_raw());
        f.target_store.write(40).await.unwrap();
        f.controller.run_tick().await;
        // soc 50 >= stored target 40
        assert!(f.controller.last_decision().unwrap().target_achieved);
    }

    #[tokio::test]
    async fn test_planner_persists_target() {
        let f = fixture(full_raw());
        f.controller.run_planner().await;
        let plan = f.controller.last_plan().unwrap();
        assert_eq!(
            f.target_store.read().await.unwrap(),
            Some(plan.target_soc)
        );
        assert_eq!(plan.target_soc % 5, 0);
    }

    #[tokio::test]
    async fn test_failed_actuation_is_logged_not_fatal() {
        let cfg = Config::default();
        let actuator = Arc::new(SimulatedActuator::failing_register("working_mode"));
        let controller = DispatchController::new(
            cfg,
            Arc::new(StaticSensorBus::new(full_raw())),
            Arc::new(StaticPriceProvider::default()),
            Arc::new(DefaultProfileSource),
            Arc::new(InMemoryTargetSocStore::default()),
            actuator,
        );
        controller.run_tick().await;
        let entries = controller.log_entries();
        assert!(entries
            .iter()
            .any(|e| e.message.contains("actuation failure")));
        // the decision itself still recorded
        assert!(controller.last_strategy().is_some());
    }

    #[tokio::test]
    async fn test_status_line_reflects_optimizer() {
        let f = fixture(full_raw());
        assert_eq!(f.controller.status_line(), "no decision yet");
        f.controller.run_tick().await;
        assert!(!f.controller.status_line().is_empty());
    }

    #[test]
    fn test_planner_due_once_per_day() {
        let f = fixture(full_raw());
        let run_hour = f.controller.cfg.planner.run_hour;
        let at = Local::now()
            .date_naive()
            .and_hms_opt(run_hour, 5, 0)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap();
        assert!(f.controller.planner_due(at));
        assert!(!f.controller.planner_due(at));
    }

    #[test]
    fn test_working_mode_enum_is_wire_stable() {
        assert_eq!(WorkingMode::SelfConsumption.to_string(), "self_consumption");
    }
}
