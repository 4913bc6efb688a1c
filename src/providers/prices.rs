use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Local, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;

use crate::domain::PriceCurve;

/// Which day's settlement curve is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDay {
    Today,
    Tomorrow,
}

impl PriceDay {
    pub fn date(self) -> NaiveDate {
        let today = Local::now().date_naive();
        match self {
            PriceDay::Today => today,
            PriceDay::Tomorrow => today + ChronoDuration::days(1),
        }
    }
}

/// Hourly sell-price source. Absence of data is an `Err`; the optimizer
/// maps it to an indeterminate verdict rather than a sell decision.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn curve_for(&self, day: PriceDay) -> Result<PriceCurve>;
}

/// HTTP provider for the market price feed, with an in-memory TTL cache.
///
/// The feed returns a flat list of `{start, price}` entries that may be
/// sub-hourly; entries are filtered to the requested date and averaged
/// per hour by `PriceCurve::from_samples`.
#[derive(Clone)]
pub struct HttpPriceProvider {
    base_url: String,
    client: reqwest::Client,
    cache: Arc<RwLock<Option<(DateTime<FixedOffset>, Vec<RawPriceEntry>)>>>,
    ttl: Duration,
}

impl HttpPriceProvider {
    pub fn new(base_url: String, timeout: Duration, ttl: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("home-battery-dispatch/0.3"),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url,
            client,
            cache: Arc::new(RwLock::new(None)),
            ttl,
        })
    }

    async fn fetch_entries(&self) -> Result<Vec<RawPriceEntry>> {
        {
            let c = self.cache.read().await;
            if let Some((ts, entries)) = &*c {
                if (Local::now().fixed_offset() - *ts).num_seconds() < self.ttl.as_secs() as i64 {
                    return Ok(entries.clone());
                }
            }
        }

        let url = format!("{}/api/v1/prices", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("price GET failed")?;
        let status = resp.status();
        let body = resp.text().await.context("price read failed")?;
        if !status.is_success() {
            anyhow::bail!("price API error: HTTP {status}: {body}");
        }

        let entries: Vec<RawPriceEntry> =
            serde_json::from_str(&body).context("price JSON parse failed")?;

        let mut c = self.cache.write().await;
        *c = Some((Local::now().fixed_offset(), entries.clone()));
        Ok(entries)
    }
}

#[async_trait]
impl PriceProvider for HttpPriceProvider {
    async fn curve_for(&self, day: PriceDay) -> Result<PriceCurve> {
        let date = day.date();
        let entries = self.fetch_entries().await?;
        let samples = entries
            .iter()
            .filter_map(|e| {
                let (d, h) = e.date_and_hour()?;
                let p = e.price?;
                Some((d, h, p))
            })
            .filter(|&(d, _, _)| d == date)
            .map(|(_, h, p)| (h, p));
        let curve = PriceCurve::from_samples(date, samples);
        if curve.is_empty() {
            anyhow::bail!("no price samples for {date}");
        }
        Ok(curve)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPriceEntry {
    pub start: String,
    pub price: Option<f64>,
}

impl RawPriceEntry {
    /// Parse `2025-11-16T14:00:00` (any offset suffix tolerated) into
    /// the local date and hour. Malformed entries are skipped upstream.
    fn date_and_hour(&self) -> Option<(NaiveDate, u32)> {
        let (date_part, time_part) = self.start.split_once('T')?;
        let date = date_part.parse::<NaiveDate>().ok()?;
        let hour: u32 = time_part.get(0..2)?.parse().ok()?;
        (hour < 24).then_some((date, hour))
    }
}

/// Fixed curve provider used by the simulator and tests
#[derive(Debug, Clone, Default)]
pub struct StaticPriceProvider {
    pub today: Option<PriceCurve>,
    pub tomorrow: Option<PriceCurve>,
}

impl StaticPriceProvider {
    pub fn with_today(curve: PriceCurve) -> Self {
        Self {
            today: Some(curve),
            tomorrow: None,
        }
    }
}

#[async_trait]
impl PriceProvider for StaticPriceProvider {
    async fn curve_for(&self, day: PriceDay) -> Result<PriceCurve> {
        let curve = match day {
            PriceDay::Today => self.today.clone(),
            PriceDay::Tomorrow => self.tomorrow.clone(),
        };
        curve.ok_or_else(|| anyhow::anyhow!("no static curve configured for {day:?}"))
    }
}

/// A synthetic daily curve for the simulator: cheap midday valley,
/// expensive evening peak.
pub fn synthetic_curve(date: NaiveDate) -> PriceCurve {
    let samples = (0..24u32).map(|h| {
        let base = 0.45;
        let midday_dip = if (10..15).contains(&h) { -0.20 } else { 0.0 };
        let evening_peak = if (18..22).contains(&h) { 0.18 } else { 0.0 };
        (h, base + midday_dip + evening_peak)
    });
    PriceCurve::from_samples(date, samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_parsing() {
        let e = RawPriceEntry {
            start: "2025-11-16T14:00:00".into(),
            price: Some(0.31),
        };
        assert_eq!(
            e.date_and_hour(),
            Some((NaiveDate::from_ymd_opt(2025, 11, 16).unwrap(), 14))
        );
    }

    #[test]
    fn test_malformed_entry_is_none() {
        let e = RawPriceEntry {
            start: "garbage".into(),
            price: Some(0.31),
        };
        assert!(e.date_and_hour().is_none());
    }

    #[tokio::test]
    async fn test_static_provider_missing_day_errors() {
        let provider = StaticPriceProvider::default();
        assert!(provider.curve_for(PriceDay::Today).await.is_err());
    }

    #[tokio::test]
    async fn test_static_provider_returns_configured_curve() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let provider = StaticPriceProvider::with_today(synthetic_curve(date));
        let curve = provider.curve_for(PriceDay::Today).await.unwrap();
        assert_eq!(curve.slots.len(), 24);
    }

    #[test]
    fn test_synthetic_curve_has_midday_valley() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let curve = synthetic_curve(date);
        assert!(curve.price_at(12).unwrap() < curve.price_at(19).unwrap());
    }
}
