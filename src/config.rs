use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub battery: BatteryConfig,
    pub safety: SafetyConfig,
    pub engine: EngineConfig,
    pub forecast_tiers: ForecastTiers,
    pub cheapest_hours: CheapestHoursConfig,
    pub arbitrage: ArbitrageConfig,
    pub planner: PlannerConfig,
    pub prices: PricesConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8087,
            request_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Dispatch tick period; the production installation runs hourly
    pub tick_seconds: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { tick_seconds: 3600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub capacity_kwh: f64,
    /// Hardware SOC floor enforced by the inverter (Luna: 20%)
    pub hardware_min_soc: u8,
    /// Hardware SOC ceiling enforced by the inverter (Luna: 80%)
    pub hardware_max_soc: u8,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 15.0,
            hardware_min_soc: 20,
            hardware_max_soc: 80,
            max_charge_kw: 5.0,
            max_discharge_kw: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Minimum safe battery temperature for grid charging (°C)
    pub min_battery_temp_c: f64,
    /// Maximum safe battery temperature for grid charging (°C)
    pub max_battery_temp_c: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_battery_temp_c: 0.0,
            max_battery_temp_c: 45.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Below this SOC the battery charges 24x7 regardless of tariff
    pub critical_soc: f64,
    /// Below this SOC charging waits only for the next cheap window
    pub low_soc: f64,
    /// At or above this SOC the cascade protects the battery
    pub high_soc: f64,
    /// Policy ceiling for normal grid charging, kept below the hardware max
    pub max_policy_soc: u8,
    /// Discharge floor for household self-consumption
    pub discharge_floor_soc: f64,
    /// Emergency charge target used by the critical-SOC rule
    pub emergency_target_soc: u8,
    /// Surplus below this power is treated as noise, not exportable PV
    pub meaningful_surplus_kw: f64,
    /// Ultra-low settlement price: storing always beats selling
    pub ultra_low_price: f64,
    /// Static store-vs-sell threshold when no price curve is available
    pub fallback_store_price: f64,
    /// SOC above which the static fallback stops storing surplus
    pub store_soc_ceiling: f64,
    /// Whether reaching the daily target ends the tick early.
    /// The fall-through behavior (default) still lets discharge and
    /// weekend rules run after grid charging is switched off.
    pub target_achieved_short_circuits: bool,
    /// Degraded policy: charge up to this SOC when inputs are missing
    pub fallback_low_soc: f64,
    pub fallback_charge_target: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            critical_soc: 5.0,
            low_soc: 20.0,
            high_soc: 80.0,
            max_policy_soc: 75,
            discharge_floor_soc: 20.0,
            emergency_target_soc: 35,
            meaningful_surplus_kw: 0.5,
            ultra_low_price: 0.15,
            fallback_store_price: 0.35,
            store_soc_ceiling: 65.0,
            target_achieved_short_circuits: false,
            fallback_low_soc: 30.0,
            fallback_charge_target: 50,
        }
    }
}

/// Next-day PV forecast tiers (kWh) shared by the cascade and planner
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastTiers {
    pub excellent: f64,
    pub very_good: f64,
    pub good: f64,
    pub medium: f64,
    pub poor: f64,
    pub very_bad: f64,
}

impl Default for ForecastTiers {
    fn default() -> Self {
        Self {
            excellent: 30.0,
            very_good: 25.0,
            good: 20.0,
            medium: 15.0,
            poor: 12.0,
            very_bad: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheapestHoursConfig {
    /// Energy below this is "already charged"; ranking is skipped
    pub min_energy_to_store_kwh: f64,
    /// Daylight window length used when the tick lands after sunset
    pub fallback_window_hours: u32,
    /// Per-month sunrise hour (index 0 = January)
    pub sunrise_by_month: [u32; 12],
    /// Per-month sunset hour (index 0 = January)
    pub sunset_by_month: [u32; 12],
}

impl Default for CheapestHoursConfig {
    fn default() -> Self {
        Self {
            min_energy_to_store_kwh: 0.5,
            fallback_window_hours: 12,
            sunrise_by_month: [7, 7, 6, 6, 5, 4, 4, 5, 6, 6, 7, 7],
            sunset_by_month: [16, 17, 18, 19, 20, 21, 21, 20, 19, 18, 16, 16],
        }
    }
}

impl CheapestHoursConfig {
    pub fn sunrise(&self, month: u32) -> u32 {
        self.sunrise_by_month[month.clamp(1, 12) as usize - 1]
    }

    pub fn sunset(&self, month: u32) -> u32 {
        self.sunset_by_month[month.clamp(1, 12) as usize - 1]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    pub evening_start_hour: u32,
    pub evening_end_hour: u32,
    /// Below this price the evening sale is never worth it
    pub min_price: f64,
    pub heating_min_price: f64,
    pub offseason_min_price: f64,
    pub heating_min_forecast_kwh: f64,
    pub offseason_min_forecast_kwh: f64,
    pub offseason_min_soc: f64,
    /// SOC floors guaranteeing overnight heating supply, by outdoor temp
    pub frost_floor_soc: u8,
    pub cold_floor_soc: u8,
    pub mild_floor_soc: u8,
    pub summer_floor_soc: u8,
    pub offseason_floor_soc: u8,
    /// Required headroom above the floor before selling is approved
    pub reserve_margin_soc: f64,
    /// Gross markup applied to settlement revenue estimates
    pub vat_markup: f64,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            evening_start_hour: 19,
            evening_end_hour: 21,
            min_price: 0.50,
            heating_min_price: 0.65,
            offseason_min_price: 0.55,
            heating_min_forecast_kwh: 25.0,
            offseason_min_forecast_kwh: 20.0,
            offseason_min_soc: 55.0,
            frost_floor_soc: 50,
            cold_floor_soc: 45,
            mild_floor_soc: 40,
            summer_floor_soc: 30,
            offseason_floor_soc: 35,
            reserve_margin_soc: 20.0,
            vat_markup: 1.23,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Local hour at which the daily plan is computed
    pub run_hour: u32,
    /// SOC percentage points added on top of the predicted need
    pub safety_margin_soc: f64,
    /// Share of tomorrow's PV assumed to land inside expensive hours
    pub pv_l1_fraction: f64,
    /// Optional JSON file with trained hourly consumption profiles
    pub profile_path: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            run_hour: 4,
            safety_margin_soc: 10.0,
            pv_l1_fraction: 0.6,
            profile_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricesConfig {
    pub base_url: String,
    pub http_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8088".into(),
            http_timeout_seconds: 10,
            cache_ttl_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Where the nightly target SOC scalar is persisted
    pub target_soc_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            target_soc_path: "data/target_soc.json".into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("HBD__").split("__"));
        Ok(figment.extract()?)
    }
}
