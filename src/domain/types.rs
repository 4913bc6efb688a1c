use chrono::{DateTime, FixedOffset, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the home heating (heat pump) demand shapes battery policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HeatingMode {
    HeatingSeason,
    NoHeating,
}

/// Snapshot-level errors raised at the validation boundary
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("missing critical sensor reading: {0}")]
    MissingField(&'static str),
    #[error("state of charge out of bounds: {0}%")]
    SocOutOfBounds(f64),
}

/// Battery operating mode selected by the decision cascade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    ChargeFromGrid,
    ChargeFromPv,
    DischargeToHome,
    DischargeToGrid,
    GridToHome,
    Idle,
}

/// Decision priority attached to a strategy; drives the log level and
/// how aggressively the actuator schedules the charge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

/// One dispatch decision: mode plus the knobs the actuator needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Strategy {
    pub mode: Mode,
    /// Charge target (for grid charging) or discharge floor (for selling)
    pub target_soc: Option<u8>,
    pub priority: Priority,
    /// Human-readable audit trail; also drives decision-log categorization
    pub reason: String,
    /// Overrides the time-window charge schedule with a 24x7 window
    pub urgent: bool,
    /// Cheapest daylight hours computed for this tick, when available
    pub cheapest_hours: Option<Vec<u32>>,
}

impl Strategy {
    pub fn new(mode: Mode, priority: Priority, reason: impl Into<String>) -> Self {
        Self {
            mode,
            target_soc: None,
            priority,
            reason: reason.into(),
            urgent: false,
            cheapest_hours: None,
        }
    }

    pub fn with_target(mut self, target_soc: u8) -> Self {
        self.target_soc = Some(target_soc);
        self
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }
}

/// Validated per-tick sensor readings; immutable once constructed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub hour: u32,
    pub month: u32,
    pub weekday: Weekday,
    pub is_workday: bool,
    pub soc: f64,
    pub battery_temp_c: f64,
    pub pv_power_kw: f64,
    pub home_load_kw: f64,
    /// Market settlement price, currency/kWh; can be negative
    pub price_now: f64,
    pub forecast_today_kwh: f64,
    pub forecast_tomorrow_kwh: f64,
    pub temp_outdoor_c: f64,
    pub heating_mode: HeatingMode,
    pub pc_active: bool,
    pub cwu_window: bool,
    pub target_soc: u8,
}

/// Raw, possibly incomplete readings straight off the sensor bus.
///
/// Every field is optional: the bus is best-effort and any entity can be
/// unavailable at tick time. [`RawSnapshot::validate`] classifies the
/// snapshot once, instead of scattering per-field checks across rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub hour: Option<u32>,
    pub month: Option<u32>,
    pub weekday: Option<Weekday>,
    pub is_workday: Option<bool>,
    pub soc: Option<f64>,
    pub battery_temp_c: Option<f64>,
    pub pv_power_kw: Option<f64>,
    pub home_load_kw: Option<f64>,
    pub price_now: Option<f64>,
    pub forecast_today_kwh: Option<f64>,
    pub forecast_tomorrow_kwh: Option<f64>,
    pub temp_outdoor_c: Option<f64>,
    pub heating_mode: Option<HeatingMode>,
    pub pc_active: Option<bool>,
    pub cwu_window: Option<bool>,
    pub target_soc: Option<u8>,
}

impl RawSnapshot {
    /// Validate critical fields and fill documented defaults for the rest.
    ///
    /// Critical fields mirror the original controller: clock, SOC, PV
    /// power, home load and outdoor temperature. A missing critical field
    /// routes the tick to the degraded fallback policy.
    pub fn validate(&self) -> Result<SensorSnapshot, SnapshotError> {
        let hour = self.hour.ok_or(SnapshotError::MissingField("hour"))?;
        let soc = self.soc.ok_or(SnapshotError::MissingField("soc"))?;
        let pv_power_kw = self
            .pv_power_kw
            .ok_or(SnapshotError::MissingField("pv_power_kw"))?;
        let home_load_kw = self
            .home_load_kw
            .ok_or(SnapshotError::MissingField("home_load_kw"))?;
        let temp_outdoor_c = self
            .temp_outdoor_c
            .ok_or(SnapshotError::MissingField("temp_outdoor_c"))?;

        if !(0.0..=100.0).contains(&soc) {
            return Err(SnapshotError::SocOutOfBounds(soc));
        }

        Ok(SensorSnapshot {
            hour,
            month: self.month.unwrap_or(1),
            weekday: self.weekday.unwrap_or(Weekday::Mon),
            is_workday: self.is_workday.unwrap_or(true),
            soc,
            battery_temp_c: self.battery_temp_c.unwrap_or(25.0),
            pv_power_kw,
            home_load_kw,
            price_now: self.price_now.unwrap_or(0.45),
            forecast_today_kwh: self.forecast_today_kwh.unwrap_or(0.0),
            forecast_tomorrow_kwh: self.forecast_tomorrow_kwh.unwrap_or(0.0),
            temp_outdoor_c,
            heating_mode: self.heating_mode.unwrap_or(HeatingMode::NoHeating),
            pc_active: self.pc_active.unwrap_or(false),
            cwu_window: self.cwu_window.unwrap_or(false),
            target_soc: self.target_soc.unwrap_or(70),
        })
    }
}

/// Instantaneous production/load balance; exactly one side is nonzero
/// unless production equals load
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PowerBalance {
    pub surplus_kw: f64,
    pub deficit_kw: f64,
    pub pv_kw: f64,
    pub load_kw: f64,
}

impl PowerBalance {
    /// Negative production readings are clamped to zero before use.
    pub fn from_power(pv_kw: f64, load_kw: f64) -> Self {
        let pv = pv_kw.max(0.0);
        let load = load_kw.max(0.0);
        Self {
            surplus_kw: (pv - load).max(0.0),
            deficit_kw: (load - pv).max(0.0),
            pv_kw: pv,
            load_kw: load,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.surplus_kw == 0.0 && self.deficit_kw == 0.0
    }
}

/// One hourly sell-price sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceSlot {
    pub hour: u32,
    pub price: f64,
}

/// Hourly price series for a single day, hour-averaged at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCurve {
    pub day: NaiveDate,
    pub slots: Vec<PriceSlot>,
}

impl PriceCurve {
    /// Build a curve from raw (hour, price) samples. Sub-hourly feeds
    /// emit several samples per hour; they are averaged here so ranking
    /// always operates on one slot per hour, in hour order.
    pub fn from_samples(day: NaiveDate, samples: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut sums = [0.0f64; 24];
        let mut counts = [0u32; 24];
        for (hour, price) in samples {
            if hour < 24 {
                sums[hour as usize] += price;
                counts[hour as usize] += 1;
            }
        }
        let slots = (0..24u32)
            .filter(|&h| counts[h as usize] > 0)
            .map(|h| PriceSlot {
                hour: h,
                price: sums[h as usize] / f64::from(counts[h as usize]),
            })
            .collect();
        Self { day, slots }
    }

    pub fn price_at(&self, hour: u32) -> Option<f64> {
        self.slots.iter().find(|s| s.hour == hour).map(|s| s.price)
    }

    /// Slots restricted to `[from, until)`.
    pub fn between(&self, from: u32, until: u32) -> Vec<PriceSlot> {
        self.slots
            .iter()
            .filter(|s| s.hour >= from && s.hour < until)
            .copied()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Output of the daily target planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPlan {
    pub id: uuid::Uuid,
    pub created_at: DateTime<FixedOffset>,
    pub target_soc: u8,
    pub l1_kwh: f64,
    pub l2_kwh: f64,
    pub total_kwh: f64,
    pub forecast_tomorrow_kwh: f64,
    pub temp_outdoor_c: f64,
    pub reason: String,
}
