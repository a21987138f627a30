//! Mutation operators: named, ordered groups of mutators.

use std::fmt;

use crate::error::ConfigError;
use crate::mutators::catalog;
use crate::mutators::Mutator;

pub struct MutationOperator {
    name: String,
    description: String,
    /// One mutant for the joint application of every mutator, instead of one
    /// mutant per accepted match.
    composite: bool,
    mutators: Vec<Box<dyn Mutator>>,
}

impl MutationOperator {
    pub fn new(name: impl Into<String>, description: impl Into<String>, composite: bool) -> Self {
        MutationOperator {
            name: name.into(),
            description: description.into(),
            composite,
            mutators: Vec::new(),
        }
    }

    /// Appends a mutator; mutators run in insertion order and see the edits
    /// of the ones before them.
    pub fn add_mutator(&mut self, mutator: impl Mutator + 'static) -> &mut Self {
        self.mutators.push(Box::new(mutator));
        self
    }

    pub fn with_mutator(mut self, mutator: impl Mutator + 'static) -> Self {
        self.add_mutator(mutator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    pub fn mutators(&self) -> &[Box<dyn Mutator>] {
        &self.mutators
    }
}

impl fmt::Debug for MutationOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.mutators.iter().map(|m| m.name()).collect();
        f.debug_struct("MutationOperator")
            .field("name", &self.name)
            .field("composite", &self.composite)
            .field("mutators", &names)
            .finish()
    }
}

/// Operators addressable by name from the CLI and config file.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    operators: Vec<MutationOperator>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            MutationOperator::new("InAx1-Operator", "Approximate adder cell operator InAx1", false)
                .with_mutator(catalog::inax1()),
        );
        registry.register(
            MutationOperator::new("TruncAdder-Operator", "Truncation based inexact adder", false)
                .with_mutator(catalog::trunc_adder()),
        );
        registry.register(
            MutationOperator::new("TruncateInt-Operator", "Integer operand truncation", false)
                .with_mutator(catalog::truncate_int()),
        );
        registry.register(
            MutationOperator::new(
                "LoopBreaker-Operator",
                "Breaks a nested loop by a global parameter and approximates its sums",
                true,
            )
            .with_mutator(catalog::loop_breaker())
            .with_mutator(catalog::inax1()),
        );
        registry.register(
            MutationOperator::new(
                "AxDCT-Operator",
                "Approximate DCT: triangular loop nest with truncating adders",
                true,
            )
            .with_mutator(catalog::axdct_loop())
            .with_mutator(catalog::axdct_adder()),
        );
        registry
    }

    /// Adds an operator, replacing any operator of the same name.
    pub fn register(&mut self, operator: MutationOperator) {
        self.operators.retain(|o| o.name != operator.name);
        self.operators.push(operator);
    }

    pub fn get(&self, name: &str) -> Option<&MutationOperator> {
        self.operators.iter().find(|o| o.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MutationOperator> {
        self.operators.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.operators.iter().map(|o| o.name.as_str()).collect()
    }

    /// Looks up operators by name, all of them when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&MutationOperator>, ConfigError> {
        if names.is_empty() {
            return Ok(self.operators.iter().collect());
        }
        names
            .iter()
            .map(|n| self.get(n).ok_or_else(|| ConfigError::UnknownOperator(n.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_operators_keep_mutator_order() {
        let registry = OperatorRegistry::builtin();
        assert_eq!(
            registry.names(),
            [
                "InAx1-Operator",
                "TruncAdder-Operator",
                "TruncateInt-Operator",
                "LoopBreaker-Operator",
                "AxDCT-Operator"
            ]
        );
        let lb = registry.get("LoopBreaker-Operator").unwrap();
        assert!(lb.is_composite());
        let names: Vec<_> = lb.mutators().iter().map(|m| m.name()).collect();
        assert_eq!(names, ["loop_breaker", "inax1"]);
        assert!(!registry.get("InAx1-Operator").unwrap().is_composite());
    }

    #[test]
    fn unknown_names_are_rejected() {
        let registry = OperatorRegistry::builtin();
        let err = registry.select(&["Nope".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperator(n) if n == "Nope"));
        assert_eq!(registry.select(&[]).unwrap().len(), 5);
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = OperatorRegistry::new();
        registry.register(MutationOperator::new("X", "first", false));
        registry.register(MutationOperator::new("X", "second", true));
        assert_eq!(registry.names(), ["X"]);
        assert_eq!(registry.get("X").unwrap().description(), "second");
    }
}
