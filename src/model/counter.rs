use std::collections::BTreeMap;

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::define_query;

/// One row of the `clicks` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct CountryCounter {
    pub country_code: String,
    pub country_name: String,
    pub click_count: u64,
}

/// Sum of every counter. Absent when the table is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ClickTotal {
    #[serde(default)]
    pub total: u64,
}

// The record id is the country code, so the insert conflicts on it and bumps the existing row instead.
define_query! {
    CountryCounter > increment(code: String, name: String) > Option<CountryCounter>
        where "INSERT INTO clicks { id: $code, country_code: $code, country_name: $name, click_count: 1 } ON DUPLICATE KEY UPDATE click_count += 1"
}

define_query! {
    CountryCounter > all() > Vec<CountryCounter>
        where "SELECT country_code, country_name, click_count FROM clicks ORDER BY country_code"
}

define_query! {
    ClickTotal > sum() > Option<ClickTotal>
        where "SELECT math::sum(click_count) AS total FROM clicks GROUP ALL"
}

/// Display name and click count of a single country.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct CountryClicks {
    pub name: String,
    pub count: u64,
}

/// Per-country breakdown keyed by country code. Codes that are absent have zero clicks.
pub type CountryMap = BTreeMap<String, CountryClicks>;

impl From<CountryCounter> for (String, CountryClicks) {
    fn from(counter: CountryCounter) -> Self {
        let clicks = CountryClicks::new(counter.country_name, counter.click_count);
        (counter.country_code, clicks)
    }
}
