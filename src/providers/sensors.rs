use anyhow::Result;
use async_trait::async_trait;

#[cfg(feature = "sim")]
use chrono::{Datelike, Local, Timelike};

#[cfg(feature = "sim")]
use crate::domain::calendar;
#[cfg(feature = "sim")]
use crate::domain::types::HeatingMode;
use crate::domain::types::RawSnapshot;

/// Best-effort access to the live sensor values the engine consumes.
///
/// Implementations never block on retries: a reading that is not
/// available right now comes back as `None` in the snapshot and the
/// validation pass decides whether the tick can proceed.
#[async_trait]
pub trait SensorBus: Send + Sync {
    async fn read_snapshot(&self) -> Result<RawSnapshot>;
}

/// Fixed snapshot bus for tests and replay
#[derive(Debug, Clone, Default)]
pub struct StaticSensorBus {
    pub snapshot: RawSnapshot,
}

impl StaticSensorBus {
    pub fn new(snapshot: RawSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl SensorBus for StaticSensorBus {
    async fn read_snapshot(&self) -> Result<RawSnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Simulated installation used when no real automation platform is
/// wired up: plausible PV bell curve, household load with morning and
/// evening bumps, mild weather.
#[cfg(feature = "sim")]
#[derive(Debug, Clone)]
pub struct SimulatedSensorBus {
    pub soc: f64,
    pub target_soc: u8,
}

#[cfg(feature = "sim")]
impl Default for SimulatedSensorBus {
    fn default() -> Self {
        Self {
            soc: 55.0,
            target_soc: 70,
        }
    }
}

#[cfg(feature = "sim")]
#[async_trait]
impl SensorBus for SimulatedSensorBus {
    async fn read_snapshot(&self) -> Result<RawSnapshot> {
        let now = Local::now();
        let hour = now.hour();
        let date = now.date_naive();
        let month = date.month();

        // Midday-peaked production, zero outside daylight
        let pv = if (6..18).contains(&hour) {
            let x = (f64::from(hour) - 12.0) / 3.0;
            4.5 * (-0.5 * x * x).exp()
        } else {
            0.0
        };
        let load = 0.8
            + if (6..9).contains(&hour) { 1.0 } else { 0.0 }
            + if (17..22).contains(&hour) { 1.6 } else { 0.0 };

        let temp = match month {
            12 | 1 | 2 => -2.0,
            3 | 11 => 6.0,
            4 | 10 => 12.0,
            _ => 19.0,
        };

        Ok(RawSnapshot {
            hour: Some(hour),
            month: Some(month),
            weekday: Some(now.weekday()),
            is_workday: Some(!calendar::is_weekend_or_holiday(date)),
            soc: Some(self.soc),
            battery_temp_c: Some(25.0),
            pv_power_kw: Some(pv),
            home_load_kw: Some(load),
            price_now: Some(0.45),
            forecast_today_kwh: Some(18.0),
            forecast_tomorrow_kwh: Some(15.0),
            temp_outdoor_c: Some(temp),
            heating_mode: Some(if temp < 12.0 {
                HeatingMode::HeatingSeason
            } else {
                HeatingMode::NoHeating
            }),
            pc_active: Some(temp < 12.0),
            cwu_window: Some((13..15).contains(&hour)),
            target_soc: Some(self.target_soc),
        })
    }
}
