use std::sync::Arc;

use chrono::Datelike;
use dashmap::DashMap;
use tracing::debug;

use crate::clock::Clock;
use crate::store::Store;
use crate::workflows::WorkflowError;

const MAX_SEQUENCE: u32 = 9999;

/// Issues `YYYY-DEPT-NNNN` student numbers.
///
/// Each (year, department) pair owns a counter. The first call for a pair
/// seeds the counter from the greatest number already on file; after that the
/// counter is bumped under its map shard lock, so concurrent callers always
/// receive distinct numbers.
pub struct StudentIdentifierGenerator {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    counters: DashMap<(i32, String), u32>,
}

impl StudentIdentifierGenerator {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            counters: DashMap::new(),
        }
    }

    pub fn generate(&self, department_code: &str) -> Result<String, WorkflowError> {
        let department = department_code.trim().to_ascii_uppercase();
        if department.is_empty() {
            return Err(WorkflowError::bad_request("department code is required"));
        }
        let year = self.clock.now().year();
        let prefix = format!("{year:04}-{department}-");

        let mut counter = self
            .counters
            .entry((year, department))
            .or_insert_with(|| self.last_issued(&prefix));
        if *counter >= MAX_SEQUENCE {
            return Err(WorkflowError::conflict(format!(
                "identifier space exhausted for {prefix}NNNN"
            )));
        }
        *counter += 1;

        let identifier = format!("{prefix}{:04}", *counter);
        debug!(%identifier, "student identifier issued");
        Ok(identifier)
    }

    /// Sequence of the lexicographically greatest identifier with `prefix`, or
    /// zero when none exists.
    fn last_issued(&self, prefix: &str) -> u32 {
        self.store
            .profiles
            .filter(|profile| profile.student_number.starts_with(prefix))
            .into_iter()
            .map(|profile| profile.student_number)
            .max()
            .and_then(|number| parse_sequence(&number, prefix))
            .unwrap_or(0)
    }
}

fn parse_sequence(identifier: &str, prefix: &str) -> Option<u32> {
    identifier.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::parse_sequence;

    #[test]
    fn sequence_is_the_numeric_suffix() {
        assert_eq!(parse_sequence("2025-CS-0042", "2025-CS-"), Some(42));
        assert_eq!(parse_sequence("2025-CS-00x2", "2025-CS-"), None);
        assert_eq!(parse_sequence("2024-CS-0042", "2025-CS-"), None);
    }
}
