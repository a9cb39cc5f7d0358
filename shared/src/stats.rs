use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Month-over-month change of one dashboard metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub percent: f64,
    pub up: bool,
}

impl Trend {
    pub fn between(current: f64, previous: f64) -> Self {
        if previous == 0.0 {
            return Trend {
                percent: if current > 0.0 { 100.0 } else { 0.0 },
                up: current > 0.0,
            };
        }
        let change = (current - previous) / previous * 100.0;
        Trend {
            percent: change.abs(),
            up: change >= 0.0,
        }
    }

    pub fn between_amounts(current: &BigDecimal, previous: &BigDecimal) -> Self {
        Trend::between(current.to_f64().unwrap_or(0.0), previous.to_f64().unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindows {
    pub last_month_start: DateTime<Utc>,
    pub this_month_start: DateTime<Utc>,
    pub next_month_start: DateTime<Utc>,
}

/// Calendar month boundaries (UTC) around `now`.
pub fn month_windows(now: DateTime<Utc>) -> MonthWindows {
    let start_of = |year: i32, month: u32| {
        let (year, month) = match month {
            0 => (year - 1, 12),
            13 => (year + 1, 1),
            m => (year, m),
        };
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .unwrap_or(now)
    };

    MonthWindows {
        last_month_start: start_of(now.year(), now.month() - 1),
        this_month_start: start_of(now.year(), now.month()),
        next_month_start: start_of(now.year(), now.month() + 1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Order,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub action: String,
    pub subject_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    pub fn order_completed(order_id: &str, at: DateTime<Utc>) -> Self {
        Activity {
            kind: ActivityKind::Order,
            action: "Order completed".to_string(),
            subject_id: order_id.to_string(),
            timestamp: at,
        }
    }

    pub fn image_generated(image_id: &str, at: DateTime<Utc>) -> Self {
        Activity {
            kind: ActivityKind::Image,
            action: "Image generated".to_string(),
            subject_id: image_id.to_string(),
            timestamp: at,
        }
    }
}

/// Newest first, capped at `limit`.
pub fn merge_recent(mut activities: Vec<Activity>, limit: usize) -> Vec<Activity> {
    activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    activities.truncate(limit);
    activities
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_images: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_earnings: BigDecimal,
    pub recent_activity: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardTrends {
    pub total_users: Trend,
    pub total_images: Trend,
    pub total_orders: Trend,
    pub total_products: Trend,
    pub total_earnings: Trend,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn trend_from_zero_baseline() {
        assert_eq!(Trend::between(5.0, 0.0), Trend { percent: 100.0, up: true });
        assert_eq!(Trend::between(0.0, 0.0), Trend { percent: 0.0, up: false });
    }

    #[test]
    fn trend_reports_magnitude_and_direction() {
        assert_eq!(Trend::between(15.0, 10.0), Trend { percent: 50.0, up: true });
        assert_eq!(Trend::between(5.0, 10.0), Trend { percent: 50.0, up: false });
        assert_eq!(Trend::between(10.0, 10.0), Trend { percent: 0.0, up: true });
    }

    #[test]
    fn trend_between_amounts() {
        let current = BigDecimal::from_str("300.00").unwrap();
        let previous = BigDecimal::from_str("200.00").unwrap();
        assert_eq!(Trend::between_amounts(&current, &previous), Trend { percent: 50.0, up: true });
    }

    #[test]
    fn month_windows_wrap_year_boundaries() {
        let january = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let windows = month_windows(january);
        assert_eq!(windows.last_month_start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(windows.this_month_start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        let december = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(
            month_windows(december).next_month_start,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn merge_recent_orders_newest_first() {
        let t = |d| Utc.with_ymd_and_hms(2024, 6, d, 0, 0, 0).unwrap();
        let merged = merge_recent(
            vec![
                Activity::order_completed("o1", t(1)),
                Activity::image_generated("i1", t(3)),
                Activity::order_completed("o2", t(2)),
            ],
            2,
        );
        let ids: Vec<&str> = merged.iter().map(|a| a.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "o2"]);
    }
}
