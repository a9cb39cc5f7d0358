//! Search, filter and sort over derived queue items.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::queue::{Priority, QueueItem, QueueStatus, UnrecognizedValue};

/// Either pass everything through or keep exact matches of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<T> {
    All,
    Only(T),
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Filter::All
    }
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(wanted) => wanted == value,
        }
    }
}

impl<T: FromStr<Err = UnrecognizedValue>> FromStr for Filter<T> {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Ok(Filter::All)
        } else {
            s.parse().map(Filter::Only)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    Status,
    Priority,
    OrderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl FromStr for SortField {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created_at" | "createdat" => Ok(SortField::CreatedAt),
            "status" => Ok(SortField::Status),
            "priority" => Ok(SortField::Priority),
            "order_id" | "orderid" => Ok(SortField::OrderId),
            _ => Err(UnrecognizedValue(s.to_string())),
        }
    }
}

impl FromStr for SortDirection {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(UnrecognizedValue(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortState {
    /// Selecting the active field flips its direction; a new field starts descending.
    pub fn toggle(self, field: SortField) -> Self {
        if self.field == field {
            SortState {
                field,
                direction: self.direction.toggled(),
            }
        } else {
            SortState {
                field,
                direction: SortDirection::Desc,
            }
        }
    }

    fn compare(&self, a: &QueueItem, b: &QueueItem) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => created_millis(a).cmp(&created_millis(b)),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::Priority => a.priority.as_str().cmp(b.priority.as_str()),
            SortField::OrderId => a.order_id.cmp(&b.order_id),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

// Missing timestamps compare as the epoch.
fn created_millis(item: &QueueItem) -> i64 {
    item.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueQuery {
    pub search: Option<String>,
    pub status: Filter<QueueStatus>,
    pub priority: Filter<Priority>,
    pub sort: SortState,
}

impl QueueQuery {
    pub fn matches(&self, item: &QueueItem) -> bool {
        self.matches_search(item) && self.status.matches(&item.status) && self.priority.matches(&item.priority)
    }

    fn matches_search(&self, item: &QueueItem) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => item.order_id.to_lowercase().contains(&term.to_lowercase()),
        }
    }

    /// Filter then stable-sort.
    pub fn apply(&self, items: Vec<QueueItem>) -> Vec<QueueItem> {
        let mut selected: Vec<QueueItem> = items.into_iter().filter(|item| self.matches(item)).collect();
        selected.sort_by(|a, b| self.sort.compare(a, b));
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(order_id: &str, status: QueueStatus, priority: Priority, created_secs: Option<i64>) -> QueueItem {
        QueueItem {
            id: format!("req-{}", order_id),
            order_id: order_id.to_string(),
            status,
            priority,
            created_at: created_secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            processed_at: None,
            processed: status != QueueStatus::Queued,
            processing_data: None,
        }
    }

    fn sample() -> Vec<QueueItem> {
        vec![
            item("A1", QueueStatus::Failed, Priority::High, Some(300)),
            item("A12", QueueStatus::Completed, Priority::Low, Some(100)),
            item("B2", QueueStatus::Queued, Priority::Medium, None),
            item("b21", QueueStatus::Failed, Priority::High, Some(200)),
        ]
    }

    fn ids(items: &[QueueItem]) -> Vec<&str> {
        items.iter().map(|i| i.order_id.as_str()).collect()
    }

    #[test]
    fn search_is_case_insensitive_substring_on_order_id() {
        let query = QueueQuery {
            search: Some("a1".to_string()),
            sort: SortState {
                field: SortField::OrderId,
                direction: SortDirection::Asc,
            },
            ..Default::default()
        };

        assert_eq!(ids(&query.apply(sample())), vec!["A1", "A12"]);
    }

    #[test]
    fn blank_search_passes_everything() {
        let query = QueueQuery {
            search: Some("  ".to_string()),
            ..Default::default()
        };

        assert_eq!(query.apply(sample()).len(), 4);
    }

    #[test]
    fn filters_intersect_regardless_of_order() {
        let status = Filter::Only(QueueStatus::Failed);
        let priority = Filter::Only(Priority::High);
        let search = "b";

        let status_first: Vec<QueueItem> = sample()
            .into_iter()
            .filter(|i| status.matches(&i.status))
            .filter(|i| priority.matches(&i.priority))
            .filter(|i| i.order_id.to_lowercase().contains(search))
            .collect();
        let search_first: Vec<QueueItem> = sample()
            .into_iter()
            .filter(|i| i.order_id.to_lowercase().contains(search))
            .filter(|i| priority.matches(&i.priority))
            .filter(|i| status.matches(&i.status))
            .collect();
        let combined = QueueQuery {
            search: Some(search.to_string()),
            status,
            priority,
            sort: SortState::default(),
        }
        .apply(sample());

        assert_eq!(ids(&status_first), vec!["b21"]);
        assert_eq!(ids(&status_first), ids(&search_first));
        assert_eq!(ids(&combined), ids(&search_first));
    }

    #[test]
    fn missing_created_at_sorts_last_descending_and_first_ascending() {
        let desc = QueueQuery::default().apply(sample());
        assert_eq!(ids(&desc), vec!["A1", "b21", "A12", "B2"]);

        let asc = QueueQuery {
            sort: SortState {
                field: SortField::CreatedAt,
                direction: SortDirection::Asc,
            },
            ..Default::default()
        }
        .apply(sample());
        assert_eq!(ids(&asc), vec!["B2", "A12", "b21", "A1"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let query = QueueQuery {
            sort: SortState {
                field: SortField::Priority,
                direction: SortDirection::Asc,
            },
            ..Default::default()
        };

        let sorted = query.apply(sample());
        assert_eq!(ids(&sorted), vec!["A1", "b21", "A12", "B2"]);
    }

    #[test]
    fn toggling_flips_active_field_and_resets_new_field() {
        let state = SortState::default();
        let flipped = state.toggle(SortField::CreatedAt);
        assert_eq!(flipped.direction, SortDirection::Asc);

        let switched = flipped.toggle(SortField::Status);
        assert_eq!(switched.field, SortField::Status);
        assert_eq!(switched.direction, SortDirection::Desc);
    }

    #[test]
    fn filter_parses_all_and_values() {
        assert_eq!("all".parse::<Filter<QueueStatus>>(), Ok(Filter::All));
        assert_eq!("".parse::<Filter<Priority>>(), Ok(Filter::All));
        assert_eq!("processing".parse::<Filter<QueueStatus>>(), Ok(Filter::Only(QueueStatus::Processing)));
        assert!("urgent".parse::<Filter<Priority>>().is_err());
    }
}
