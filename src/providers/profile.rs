use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// 24-hour consumption profile, kWh per hour, with an optional weekend
/// variant. Produced by the external ML predictor; the planner only
/// projects it onto the tariff calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyProfile {
    pub weekday: [f64; 24],
    pub weekend: Option<[f64; 24]>,
}

impl HourlyProfile {
    pub fn load_for(&self, hour: u32, is_weekend: bool) -> f64 {
        let idx = (hour % 24) as usize;
        match (&self.weekend, is_weekend) {
            (Some(weekend), true) => weekend[idx],
            _ => self.weekday[idx],
        }
    }
}

/// Fallback profile baked in from the last trained model, used whenever
/// no profile file is configured or readable.
pub fn default_profile() -> HourlyProfile {
    HourlyProfile {
        weekday: [
            1.18, 1.05, 0.85, 1.01, 1.07, 1.03, 1.39, 1.11, 0.93, 0.81, 0.61, 0.70, 0.94, 1.50,
            1.49, 1.10, 1.18, 1.35, 1.10, 1.24, 1.48, 1.44, 1.58, 1.70,
        ],
        weekend: None,
    }
}

#[async_trait]
pub trait ConsumptionProfileSource: Send + Sync {
    async fn load(&self) -> Result<HourlyProfile>;
}

/// Built-in profile source
pub struct DefaultProfileSource;

#[async_trait]
impl ConsumptionProfileSource for DefaultProfileSource {
    async fn load(&self) -> Result<HourlyProfile> {
        Ok(default_profile())
    }
}

/// Reads the predictor's JSON export:
/// `{"by_hour": {"0": 1.18, ...}, "by_hour_weekend": {...}}`.
pub struct JsonFileProfileSource {
    path: PathBuf,
}

impl JsonFileProfileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    by_hour: HashMap<String, f64>,
    #[serde(default)]
    by_hour_weekend: Option<HashMap<String, f64>>,
}

fn to_hour_array(map: &HashMap<String, f64>) -> [f64; 24] {
    let mut out = [1.5f64; 24]; // missing hours fall back to 1.5 kWh
    for (key, value) in map {
        if let Ok(hour) = key.parse::<usize>() {
            if hour < 24 {
                out[hour] = *value;
            }
        }
    }
    out
}

#[async_trait]
impl ConsumptionProfileSource for JsonFileProfileSource {
    async fn load(&self) -> Result<HourlyProfile> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading consumption profile {}", self.path.display()))?;
        let raw: RawProfile =
            serde_json::from_str(&body).context("consumption profile JSON parse failed")?;
        Ok(HourlyProfile {
            weekday: to_hour_array(&raw.by_hour),
            weekend: raw.by_hour_weekend.as_ref().map(to_hour_array),
        })
    }
}
