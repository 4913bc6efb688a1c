use super::{CheapHourVerdict, RuleCtx};
use crate::domain::{Mode, Priority, Strategy};

const WINTER_MONTHS: [u32; 4] = [11, 12, 1, 2];

/// PV production exceeds the household load: decide whether the extra
/// energy goes into the battery or out to the grid. Checks are ordered
/// from "never sell" conditions down to the default sale.
pub fn handle(ctx: &RuleCtx) -> Strategy {
    let snap = ctx.snap;
    let e = &ctx.cfg.engine;

    if snap.price_now < e.ultra_low_price && snap.soc < f64::from(e.max_policy_soc) {
        return Strategy::new(
            Mode::ChargeFromPv,
            Priority::Critical,
            format!(
                "price {:.3}/kWh near zero - storing instead of giving energy away",
                snap.price_now
            ),
        );
    }

    if snap.forecast_tomorrow_kwh < ctx.cfg.forecast_tiers.poor && snap.soc < 70.0 {
        return Strategy::new(
            Mode::ChargeFromPv,
            Priority::High,
            format!(
                "cloudy tomorrow ({:.0} kWh) - storing today's surplus",
                snap.forecast_tomorrow_kwh
            ),
        );
    }

    if WINTER_MONTHS.contains(&snap.month) && snap.soc < 70.0 {
        return Strategy::new(
            Mode::ChargeFromPv,
            Priority::High,
            "winter production - every stored kWh matters",
        );
    }

    match ctx.cheap_hours.verdict {
        CheapHourVerdict::Store => {
            let mut strategy = Strategy::new(
                Mode::ChargeFromPv,
                Priority::High,
                ctx.cheap_hours.reason.clone(),
            );
            strategy.cheapest_hours = Some(ctx.cheap_hours.cheapest_hours.clone());
            strategy
        }
        CheapHourVerdict::Indeterminate
            if snap.price_now < e.fallback_store_price && snap.soc < e.store_soc_ceiling =>
        {
            Strategy::new(
                Mode::ChargeFromPv,
                Priority::Normal,
                format!(
                    "no price curve - static threshold: {:.3} below {:.2}, storing",
                    snap.price_now, e.fallback_store_price
                ),
            )
        }
        _ => sell(ctx),
    }
}

fn sell(ctx: &RuleCtx) -> Strategy {
    let gross = ctx.snap.price_now * ctx.cfg.arbitrage.vat_markup;
    Strategy::new(
        Mode::DischargeToGrid,
        Priority::Normal,
        format!(
            "selling surplus at {:.3}/kWh ({gross:.3} gross) - {}",
            ctx.snap.price_now, ctx.cheap_hours.reason
        ),
    )
}
