//! Advisory consistency checks over the knowledge base.
//!
//! Nothing here blocks execution: the session logs a warning for every
//! non-empty set before each `achieve` call.

use std::collections::BTreeSet;

use crate::core::registry::Registry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Root causes with a fix that no symptom maps to.
    pub unused_fixes: BTreeSet<String>,
    /// Root causes some symptom maps to that have no fix.
    pub unhandled_causes: BTreeSet<String>,
    /// Symptoms named by an error context but never mapped to a root cause.
    pub unknown_symptoms: BTreeSet<String>,
    /// Symptoms mapped to a root cause that no error context names.
    pub unused_symptoms: BTreeSet<String>,
    /// Symptoms named by an error context that have no pattern.
    pub unpatterned_symptoms: BTreeSet<String>,
    /// Patterns registered for symptoms no error context names.
    pub unreferenced_patterns: BTreeSet<String>,
}

impl ConsistencyReport {
    pub fn from_registry(registry: &Registry) -> Self {
        let fixes: BTreeSet<&str> = registry.fix_names().collect();
        let causes: BTreeSet<&str> = registry.symptom_edges().map(|(_, cause)| cause).collect();
        let declared: BTreeSet<&str> = registry.symptom_edges().map(|(symptom, _)| symptom).collect();
        let referenced: BTreeSet<&str> = registry
            .error_contexts()
            .flat_map(|ctx| ctx.symptoms())
            .collect();
        let patterned: BTreeSet<&str> = registry.pattern_names().collect();

        Self {
            unused_fixes: owned_difference(&fixes, &causes),
            unhandled_causes: owned_difference(&causes, &fixes),
            unknown_symptoms: owned_difference(&referenced, &declared),
            unused_symptoms: owned_difference(&declared, &referenced),
            unpatterned_symptoms: owned_difference(&referenced, &patterned),
            unreferenced_patterns: owned_difference(&patterned, &referenced),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.unused_fixes.is_empty()
            && self.unhandled_causes.is_empty()
            && self.unknown_symptoms.is_empty()
            && self.unused_symptoms.is_empty()
            && self.unpatterned_symptoms.is_empty()
            && self.unreferenced_patterns.is_empty()
    }
}

fn owned_difference(left: &BTreeSet<&str>, right: &BTreeSet<&str>) -> BTreeSet<String> {
    left.difference(right).map(|s| (*s).to_string()).collect()
}
