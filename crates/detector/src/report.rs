use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::Package;

/// One risk category with its matching packages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleCategory {
    pub count: usize,
    pub description: String,
    pub packages: Vec<Package>,
}

impl StaleCategory {
    pub fn new(description: impl Into<String>, packages: Vec<Package>) -> Self {
        Self {
            count: packages.len(),
            description: description.into(),
            packages,
        }
    }
}

/// Combined result of one detector run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleReport {
    pub not_in_transit: StaleCategory,
    pub same_day_returned: StaleCategory,
    pub total: usize,
    pub threshold_days: u32,
    pub generated_at: DateTime<Utc>,
}

impl StaleReport {
    pub fn new(
        not_in_transit: StaleCategory,
        same_day_returned: StaleCategory,
        threshold_days: u32,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let total = not_in_transit.count + same_day_returned.count;
        Self {
            not_in_transit,
            same_day_returned,
            total,
            threshold_days,
            generated_at,
        }
    }
}
