use crate::config::Config;
use crate::domain::types::HeatingMode;
use crate::domain::SensorSnapshot;

/// An approved evening sale: discharge to the grid down to `floor_soc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageSale {
    pub floor_soc: u8,
    pub est_revenue: f64,
    pub reason: String,
}

pub fn in_evening_window(cfg: &Config, hour: u32) -> bool {
    (cfg.arbitrage.evening_start_hour..=cfg.arbitrage.evening_end_hour).contains(&hour)
}

/// Judge the evening peak-price sale. Conservative on purpose: the sale
/// only goes through when tomorrow's PV can refill what is sold and the
/// floor still covers the overnight heating demand.
pub fn evaluate(cfg: &Config, snap: &SensorSnapshot) -> Option<ArbitrageSale> {
    let a = &cfg.arbitrage;
    if !in_evening_window(cfg, snap.hour) {
        return None;
    }
    if snap.price_now < a.min_price {
        return None;
    }

    let heating = snap.heating_mode == HeatingMode::HeatingSeason;
    let floor_soc = if heating {
        if snap.temp_outdoor_c < -5.0 {
            a.frost_floor_soc
        } else if snap.temp_outdoor_c < 5.0 {
            a.cold_floor_soc
        } else {
            a.mild_floor_soc
        }
    } else if (5..=8).contains(&snap.month) {
        a.summer_floor_soc
    } else {
        a.offseason_floor_soc
    };

    let approved = if heating {
        snap.soc >= f64::from(floor_soc) + a.reserve_margin_soc
            && snap.forecast_tomorrow_kwh >= a.heating_min_forecast_kwh
            && snap.price_now >= a.heating_min_price
    } else {
        snap.soc >= a.offseason_min_soc
            && snap.forecast_tomorrow_kwh >= a.offseason_min_forecast_kwh
            && snap.price_now >= a.offseason_min_price
    };
    if !approved {
        return None;
    }

    let sellable_kwh = (snap.soc - f64::from(floor_soc)) / 100.0 * cfg.battery.capacity_kwh;
    let est_revenue = sellable_kwh * snap.price_now * a.vat_markup;
    Some(ArbitrageSale {
        floor_soc,
        est_revenue,
        reason: format!(
            "evening peak {:.3}/kWh - selling {sellable_kwh:.1} kWh down to {floor_soc}% \
             (~{est_revenue:.2} gross)",
            snap.price_now
        ),
    })
}
