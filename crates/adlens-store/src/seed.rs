use chrono::{Duration, NaiveDate};
use rusqlite::params;
use tracing::info;

use crate::database::Database;
use crate::error::StoreError;

const DEMO_DAYS: i64 = 14;

struct DemoCampaign {
    id: i64,
    name: &'static str,
    objective: &'static str,
    platform: &'static str,
    ad_type: &'static str,
    base_impressions: i64,
    click_rate_per_mille: i64,
    cost_per_click_cents: i64,
}

const DEMO_CAMPAIGNS: &[DemoCampaign] = &[
    DemoCampaign {
        id: 1,
        name: "Spring Sale",
        objective: "Performance",
        platform: "Google Ads",
        ad_type: "Search",
        base_impressions: 12_000,
        click_rate_per_mille: 42,
        cost_per_click_cents: 55,
    },
    DemoCampaign {
        id: 2,
        name: "Brand Awareness Q2",
        objective: "Awareness",
        platform: "Facebook Ads",
        ad_type: "Video",
        base_impressions: 40_000,
        click_rate_per_mille: 9,
        cost_per_click_cents: 31,
    },
    DemoCampaign {
        id: 3,
        name: "Retargeting Always-On",
        objective: "Performance",
        platform: "Facebook Ads",
        ad_type: "Carousel",
        base_impressions: 6_500,
        click_rate_per_mille: 27,
        cost_per_click_cents: 48,
    },
    DemoCampaign {
        id: 4,
        name: "TikTok Launch",
        objective: "Awareness",
        platform: "TikTok Ads",
        ad_type: "Video",
        base_impressions: 25_000,
        click_rate_per_mille: 14,
        cost_per_click_cents: 22,
    },
];

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default()
}

/// Populate the documented tables with a deterministic demo dataset.
/// Does nothing when campaigns already exist. Returns inserted performance rows.
pub fn seed_demo(db: &Database) -> Result<usize, StoreError> {
    db.with_conn(|conn| {
        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM campaigns", [], |row| row.get(0))?;
        if existing > 0 {
            info!(campaigns = existing, "demo data already present, skipping seed");
            return Ok(0);
        }

        let tx = conn.unchecked_transaction()?;
        let start = start_date();
        let end = start + Duration::days(DEMO_DAYS - 1);
        let mut inserted = 0;

        for c in DEMO_CAMPAIGNS {
            tx.execute(
                "INSERT INTO campaigns (campaign_id, campaign_name, objective, platform, ad_type, start_date, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    c.id,
                    c.name,
                    c.objective,
                    c.platform,
                    c.ad_type,
                    start.to_string(),
                    end.to_string()
                ],
            )?;

            for day in 0..DEMO_DAYS {
                let date = start + Duration::days(day);
                let impressions = c.base_impressions + (day * 137 + c.id * 53) % 900;
                // One dark day per campaign: impressions served, nothing clicked.
                let clicks = if (day + c.id) % 11 == 0 {
                    0
                } else {
                    impressions * c.click_rate_per_mille / 1000 + (day * 7 + c.id) % 13
                };
                let conversions = (clicks / 20 + (day + c.id) % 3) as f64;
                let spend = (clicks * c.cost_per_click_cents + (day * 31) % 97) as f64 / 100.0;
                let reach = impressions * 7 / 10;

                tx.execute(
                    "INSERT INTO daily_performance (date, campaign_id, impressions, clicks, conversions, spend, reach)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![date.to_string(), c.id, impressions, clicks, conversions, spend, reach],
                )?;
                inserted += 1;
            }
        }

        tx.commit()?;
        info!(rows = inserted, "demo data seeded");
        Ok(inserted)
    })
}
