use anyhow::bail;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ModeActuator, WorkingMode};
use crate::domain::TouSchedule;

/// Last register values written, for assertions and the status API.
#[derive(Debug, Default, Clone)]
pub struct InverterState {
    pub working_mode: Option<WorkingMode>,
    pub grid_charge: Option<bool>,
    pub charge_soc_limit: Option<u8>,
    pub discharge_soc_limit: Option<u8>,
    pub max_charge_kw: Option<f64>,
    pub max_discharge_kw: Option<f64>,
    pub tou_encoded: Option<String>,
}

/// In-memory inverter; the default actuator for the simulator build and
/// the test suite. Optionally fails a single named register.
#[derive(Debug, Default)]
pub struct SimulatedActuator {
    state: RwLock<InverterState>,
    failing: Option<&'static str>,
}

impl SimulatedActuator {
    pub fn failing_register(name: &'static str) -> Self {
        Self {
            state: RwLock::new(InverterState::default()),
            failing: Some(name),
        }
    }

    pub fn state(&self) -> InverterState {
        self.state.read().clone()
    }

    fn check(&self, register: &str) -> anyhow::Result<()> {
        if self.failing == Some(register) {
            bail!("simulated write failure");
        }
        Ok(())
    }
}

#[async_trait]
impl ModeActuator for SimulatedActuator {
    async fn set_working_mode(&self, mode: WorkingMode) -> anyhow::Result<()> {
        self.check("working_mode")?;
        self.state.write().working_mode = Some(mode);
        Ok(())
    }

    async fn set_grid_charge(&self, enabled: bool) -> anyhow::Result<()> {
        self.check("grid_charge")?;
        self.state.write().grid_charge = Some(enabled);
        Ok(())
    }

    async fn set_charge_soc_limit(&self, percent: u8) -> anyhow::Result<()> {
        self.check("charge_soc_limit")?;
        self.state.write().charge_soc_limit = Some(percent);
        Ok(())
    }

    async fn set_discharge_soc_limit(&self, percent: u8) -> anyhow::Result<()> {
        self.check("discharge_soc_limit")?;
        self.state.write().discharge_soc_limit = Some(percent);
        Ok(())
    }

    async fn set_power_caps(&self, charge_kw: f64, discharge_kw: f64) -> anyhow::Result<()> {
        self.check("power_caps")?;
        let mut state = self.state.write();
        state.max_charge_kw = Some(charge_kw);
        state.max_discharge_kw = Some(discharge_kw);
        Ok(())
    }

    async fn set_tou_schedule(&self, schedule: &TouSchedule) -> anyhow::Result<()> {
        self.check("tou_schedule")?;
        self.state.write().tou_encoded = Some(schedule.encode());
        Ok(())
    }
}
