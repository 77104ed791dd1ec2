//! Current-value store for vehicle signals.
//!
//! The store holds the last known value of every pre-seeded path and decides
//! whether an incoming update is a real change. Paths are never created by
//! updates: an update for a path that was not seeded is ignored.

use std::collections::BTreeMap;

use crate::error::VisError;
use crate::model::{DataPoint, Update, Value};
use crate::path::PathPattern;

/// Outcome of applying a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeResult {
    /// The stored value changed and subscribers must be notified.
    pub changed: bool,
    /// The path exists in the store.
    pub known: bool,
}

impl ChangeResult {
    const UNKNOWN: ChangeResult = ChangeResult {
        changed: false,
        known: false,
    };
}

/// In-memory store of the current value per path.
///
/// Entries are kept ordered by path so query results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    points: BTreeMap<String, DataPoint>,
}

impl ValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given points.
    pub fn with_points(points: impl IntoIterator<Item = DataPoint>) -> Self {
        let mut store = Self::new();
        store.seed(points);
        store
    }

    /// Bulk-initialize entries. A later point with the same path replaces an
    /// earlier one.
    pub fn seed(&mut self, points: impl IntoIterator<Item = DataPoint>) {
        for point in points {
            self.points.insert(point.path.clone(), point);
        }
    }

    /// Apply one update.
    ///
    /// Array values always count as a change: element-wise equality is left
    /// to consumers. Scalars change when value or variant differ.
    pub fn apply(&mut self, update: &Update) -> ChangeResult {
        let Some(point) = self.points.get_mut(&update.path) else {
            return ChangeResult::UNKNOWN;
        };

        point.initialized = true;

        let changed = match &update.value {
            Value::Array(_) => true,
            Value::Scalar(_) => point.value != update.value,
        };

        if changed {
            point.value = update.value.clone();
        }

        ChangeResult {
            changed,
            known: true,
        }
    }

    /// Get all values whose path matches the pattern.
    pub fn get(&self, pattern: &PathPattern) -> Result<BTreeMap<String, Value>, VisError> {
        let found: BTreeMap<String, Value> = self
            .points
            .values()
            .filter(|p| pattern.matches(&p.path))
            .map(|p| (p.path.clone(), p.value.clone()))
            .collect();

        if found.is_empty() {
            return Err(VisError::NotFound(format!(
                "no path matches '{}'",
                pattern.as_str()
            )));
        }
        Ok(found)
    }

    /// Compile a pattern string and query it.
    pub fn get_by_path(&self, pattern: &str) -> Result<BTreeMap<String, Value>, VisError> {
        let pattern = PathPattern::new(pattern)?;
        self.get(&pattern)
    }

    /// Look up one entry by exact path.
    pub fn entry(&self, path: &str) -> Option<&DataPoint> {
        self.points.get(path)
    }

    /// Iterate over all stored paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    /// Number of stored paths.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RPM: &str = "Signal.Drivetrain.InternalCombustionEngine.RPM";
    const POWER: &str = "Signal.Drivetrain.InternalCombustionEngine.Power";
    const USERS: &str = "Attribute.Vehicle.UserIdentification.Users";

    fn test_store() -> ValueStore {
        ValueStore::with_points(vec![
            DataPoint::new(USERS, vec!["User1"]).with_initialized(true),
            DataPoint::new(RPM, 2372).with_initialized(true),
            DataPoint::new(POWER, 60),
        ])
    }

    #[test]
    fn test_apply_changed_scalar() {
        let mut store = test_store();

        let result = store.apply(&Update::new(RPM, 3000));
        assert_eq!(
            result,
            ChangeResult {
                changed: true,
                known: true
            }
        );
        assert_eq!(store.entry(RPM).unwrap().value, Value::from(3000));
    }

    #[test]
    fn test_apply_same_scalar_twice() {
        let mut store = test_store();

        assert!(store.apply(&Update::new(RPM, 3000)).changed);
        let second = store.apply(&Update::new(RPM, 3000));
        assert!(!second.changed);
        assert!(second.known);
    }

    #[test]
    fn test_variant_change_is_a_change() {
        let mut store = test_store();

        // 2372 (int) -> 2372.0 (float) differs by variant
        assert!(store.apply(&Update::new(RPM, 2372.0)).changed);
        assert_eq!(store.entry(RPM).unwrap().value, Value::from(2372.0));
    }

    #[test]
    fn test_array_always_changed() {
        let mut store = test_store();

        let result = store.apply(&Update::new(USERS, vec!["User1"]));
        assert!(result.changed);
        let result = store.apply(&Update::new(USERS, vec!["User1"]));
        assert!(result.changed);
    }

    #[test]
    fn test_apply_marks_initialized() {
        let mut store = test_store();
        assert!(!store.entry(POWER).unwrap().initialized);

        // Unchanged value still counts as an observation
        let result = store.apply(&Update::new(POWER, 60));
        assert!(!result.changed);
        assert!(store.entry(POWER).unwrap().initialized);
    }

    #[test]
    fn test_apply_unknown_path() {
        let mut store = test_store();

        let result = store.apply(&Update::new("Nonexistent.Path", 5));
        assert_eq!(result, ChangeResult::default());
        assert!(store.entry("Nonexistent.Path").is_none());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_get_wildcard() {
        let store = test_store();

        let values = store.get_by_path("Signal.Drivetrain.*").unwrap();
        let expected: BTreeMap<String, Value> = [
            (POWER.to_string(), Value::from(60)),
            (RPM.to_string(), Value::from(2372)),
        ]
        .into_iter()
        .collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_get_exact() {
        let store = test_store();

        let values = store.get_by_path(RPM).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[RPM], Value::from(2372));
    }

    #[test]
    fn test_get_includes_uninitialized() {
        let store = test_store();
        let values = store.get_by_path(POWER).unwrap();
        assert_eq!(values[POWER], Value::from(60));
    }

    #[test]
    fn test_get_not_found() {
        let store = test_store();

        assert!(matches!(
            store.get_by_path("Nonexistent.*"),
            Err(VisError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_invalid_pattern() {
        let store = test_store();

        assert!(matches!(
            store.get_by_path("Signal..RPM"),
            Err(VisError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_seed_duplicate_path_replaces() {
        let store = ValueStore::with_points(vec![DataPoint::new(RPM, 1), DataPoint::new(RPM, 2)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.entry(RPM).unwrap().value, Value::from(2));
        assert_eq!(store.paths().collect::<Vec<_>>(), vec![RPM]);
    }
}
