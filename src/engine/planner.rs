use chrono::{DateTime, Duration, Local, Timelike};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::types::HeatingMode;
use crate::domain::{calendar, DailyPlan, Tariff};
use crate::providers::profile::HourlyProfile;

/// Inputs the planner samples once, at its early-morning run.
#[derive(Debug, Clone)]
pub struct PlannerInputs {
    pub current_soc: f64,
    pub forecast_tomorrow_kwh: f64,
    pub temp_outdoor_c: f64,
    pub heating_mode: HeatingMode,
}

/// Project the hourly consumption profile onto the next 24 hours of the
/// tariff calendar and derive tonight's charge target: enough battery to
/// cover the expensive hours that tomorrow's PV will not.
pub fn compute_plan(
    cfg: &Config,
    profile: &HourlyProfile,
    start: DateTime<Local>,
    inputs: &PlannerInputs,
) -> DailyPlan {
    let mut l1_kwh = 0.0;
    let mut l2_kwh = 0.0;
    for offset in 0..24 {
        let t = start + Duration::hours(offset);
        let date = t.date_naive();
        let hour = t.hour();
        let weekend = calendar::is_weekend_or_holiday(date);
        let load = profile.load_for(hour, weekend);
        match Tariff::resolve(hour, !weekend) {
            Tariff::L1 => l1_kwh += load,
            Tariff::L2 => l2_kwh += load,
        }
    }
    let total_kwh = l1_kwh + l2_kwh;

    // PV expected to land inside the expensive hours offsets the need
    let pv_l1_kwh = inputs.forecast_tomorrow_kwh * cfg.planner.pv_l1_fraction;
    let net_l1_kwh = (l1_kwh - pv_l1_kwh).max(0.0);
    let soc_needed = net_l1_kwh / cfg.battery.capacity_kwh * 100.0;

    let mut target = inputs.current_soc + soc_needed + cfg.planner.safety_margin_soc;

    let tiers = &cfg.forecast_tiers;
    let forecast = inputs.forecast_tomorrow_kwh;
    if forecast >= tiers.very_good {
        target = target.min(35.0);
    } else if forecast >= tiers.good {
        target = target.min(45.0);
    } else if forecast >= tiers.medium {
        target = target.min(55.0);
    } else if forecast >= 10.0 {
        target = target.min(65.0);
    } else if forecast < tiers.very_bad {
        target = target.max(75.0);
    }

    if inputs.heating_mode == HeatingMode::HeatingSeason {
        let temp = inputs.temp_outdoor_c;
        if temp < -10.0 {
            target = target.max(80.0);
        } else if temp < -5.0 {
            target = target.max(75.0);
        } else if temp < 0.0 {
            target = target.max(70.0);
        } else if temp < 5.0 {
            target = target.max(65.0);
        }
    }

    let min = f64::from(cfg.battery.hardware_min_soc);
    let max = f64::from(cfg.battery.hardware_max_soc);
    target = target.clamp(min, max);
    target = (target / 5.0).round() * 5.0;
    target = target.clamp(min, max);
    let target_soc = target as u8;

    DailyPlan {
        id: Uuid::new_v4(),
        created_at: start.fixed_offset(),
        target_soc,
        l1_kwh,
        l2_kwh,
        total_kwh,
        forecast_tomorrow_kwh: inputs.forecast_tomorrow_kwh,
        temp_outdoor_c: inputs.temp_outdoor_c,
        reason: format!(
            "L1 need {net_l1_kwh:.1} kWh after PV offset {pv_l1_kwh:.1} kWh, \
             forecast {forecast:.0} kWh, outdoor {:.0}C",
            inputs.temp_outdoor_c
        ),
    }
}

/// Title and body for the morning push notification.
pub fn notification_text(plan: &DailyPlan) -> (String, String) {
    (
        format!("Battery target for tonight: {}%", plan.target_soc),
        format!(
            "Expensive hours: {:.1} kWh, cheap hours: {:.1} kWh (total {:.1} kWh). \
             PV forecast {:.1} kWh, outdoor {:.1}C. {}",
            plan.l1_kwh,
            plan.l2_kwh,
            plan.total_kwh,
            plan.forecast_tomorrow_kwh,
            plan.temp_outdoor_c,
            plan.reason
        ),
    )
}
