// tests/budget_gate.rs
//
// Budget gate: threshold at 80% of the daily budget, soft cap, per-day rollover.

use std::sync::Arc;

use aum_scraper::config::pipeline::BudgetConfig;
use aum_scraper::{BudgetGate, MemoryStore};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).expect("valid date")
}

/// $1.00 budget at $0.01 / 1k tokens → gate closes at $0.80 = 80k tokens.
fn gate() -> BudgetGate {
    let cfg = BudgetConfig {
        daily_budget_usd: 1.0,
        unit_price_per_1k_tokens: 0.01,
        threshold_ratio: 0.8,
    };
    BudgetGate::new(Arc::new(MemoryStore::new()), &cfg)
}

#[tokio::test]
async fn no_record_means_allowed() {
    let g = gate();
    assert!(g.allow_on(day(1)).await.unwrap());
}

#[tokio::test]
async fn below_threshold_is_allowed_past_threshold_is_blocked() {
    let g = gate();
    g.record_usage_on(day(2), 79_000).await.unwrap();
    assert!(g.allow_on(day(2)).await.unwrap(), "$0.79 < $0.80");

    g.record_usage_on(day(2), 2_000).await.unwrap();
    assert!(!g.allow_on(day(2)).await.unwrap(), "$0.81 >= $0.80");
}

#[tokio::test]
async fn once_closed_stays_closed_for_the_day_and_reopens_next_day() {
    let g = gate();
    g.record_usage_on(day(3), 85_000).await.unwrap();
    for _ in 0..5 {
        assert!(!g.allow_on(day(3)).await.unwrap());
    }
    assert!(g.allow_on(day(4)).await.unwrap(), "new day starts with no record");
}

#[tokio::test]
async fn soft_cap_lets_spend_exceed_budget_by_one_call() {
    let g = gate();
    g.record_usage_on(day(5), 79_999).await.unwrap();
    assert!(g.allow_on(day(5)).await.unwrap());

    // The allowed call happens to be huge; it is still accounted in full.
    let rec = g.record_usage_on(day(5), 50_000).await.unwrap();
    assert!(rec.cost_usd > 1.0, "spend is allowed past the budget: {}", rec.cost_usd);
    assert!(!g.allow_on(day(5)).await.unwrap());
}

#[tokio::test]
async fn today_usage_defaults_to_zero_record() {
    let g = gate();
    let rec = g.today_usage().await.unwrap();
    assert_eq!(rec.total_tokens, 0);
    assert_eq!(rec.requests_count, 0);
    assert_eq!(rec.cost_usd, 0.0);
}
