use chrono::{DateTime, Utc};

use crate::errors::{PermsError, PermsResult};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses a comma separated list of IDs such as "1, 2,3".
pub fn parse_id_list(raw: &str) -> PermsResult<Vec<u32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| PermsError::bad_request(format!("invalid id: {s}")))
        })
        .collect()
}
