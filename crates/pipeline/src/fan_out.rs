//! Per-item outcomes for fan-out stages
//!
//! Expand and Research+Evaluate run one unit of work per item. Each unit
//! yields an [`ItemOutcome`]; the stage folds them into successes and
//! failures so one bad item never affects its siblings.

use serde::{Deserialize, Serialize};

/// Why one item produced no contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// The statement or category that failed
    pub item: String,
    pub error: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, error: impl ToString) -> Self {
        Self {
            item: item.into(),
            error: error.to_string(),
        }
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.item, self.error)
    }
}

/// Result of one item's unit of work
pub type ItemOutcome<T> = Result<T, ItemFailure>;

/// Outcomes separated by kind, each in input order
#[derive(Debug, Clone, PartialEq)]
pub struct Partitioned<T> {
    pub successes: Vec<T>,
    pub failures: Vec<ItemFailure>,
}

impl<T> Default for Partitioned<T> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Partitioned<T> {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl<T> Partitioned<Vec<T>> {
    /// Concatenate the successful contributions
    pub fn flatten(self) -> (Vec<T>, Vec<ItemFailure>) {
        let items = self.successes.into_iter().flatten().collect();
        (items, self.failures)
    }
}

/// Fold outcomes into successes and failures
pub fn partition_outcomes<T, I>(outcomes: I) -> Partitioned<T>
where
    I: IntoIterator<Item = ItemOutcome<T>>,
{
    outcomes
        .into_iter()
        .fold(Partitioned::default(), |mut acc, outcome| {
            match outcome {
                Ok(value) => acc.successes.push(value),
                Err(failure) => acc.failures.push(failure),
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keeps_order() {
        let outcomes: Vec<ItemOutcome<u32>> = vec![
            Ok(1),
            Err(ItemFailure::new("b", "boom")),
            Ok(3),
        ];
        let parts = partition_outcomes(outcomes);

        assert_eq!(parts.successes, vec![1, 3]);
        assert_eq!(parts.failures, vec![ItemFailure::new("b", "boom")]);
        assert!(parts.has_failures());
    }

    #[test]
    fn test_flatten_drops_failed_contributions() {
        let outcomes: Vec<ItemOutcome<Vec<&str>>> = vec![
            Ok(vec!["x1", "x2"]),
            Err(ItemFailure::new("y", "permanent")),
            Ok(vec!["z1"]),
        ];
        let (items, failures) = partition_outcomes(outcomes).flatten();

        assert_eq!(items, vec!["x1", "x2", "z1"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].to_string(), "y: permanent");
    }

    #[test]
    fn test_empty_input() {
        let parts = partition_outcomes(Vec::<ItemOutcome<()>>::new());
        assert!(parts.successes.is_empty());
        assert!(!parts.has_failures());
    }
}
