use std::fmt;

use metrica_common::{Formula, FormulaStep, Variable, VariableId};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ReplicationError;
use crate::normalize::goal_key;
use crate::options::{CycleCheck, ReplicationOptions};

/// Why a source formula cannot be copied onto a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Incompatibility {
    /// The source formula names the target directly.
    CircularReference,
    /// The target is reachable from the variable with code `via`.
    TransitiveCycle { via: String },
    /// The target has no goal whose normalized label equals `key`.
    MissingGoal { key: String },
    /// The target has no period starting in the referenced year.
    MissingQuadrennium { label: String },
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircularReference => {
                f.write_str("circular reference: the source formula uses this variable")
            }
            Self::TransitiveCycle { via } => write!(
                f,
                "circular reference: the source formula reaches this variable through {via}"
            ),
            Self::MissingGoal { key } => write!(f, "missing compatible goal: {key}"),
            Self::MissingQuadrennium { label } => {
                write!(f, "missing compatible quadrennium: {label}")
            }
        }
    }
}

/// Outcome of checking one target. An invalid target never carries a mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Compatibility {
    /// The source formula retargeted at the target's goals and periods.
    Valid(Formula),
    Invalid(Incompatibility),
}

impl Compatibility {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Human-readable reason, present only when invalid.
    pub fn reason(&self) -> Option<String> {
        self.incompatibility().map(ToString::to_string)
    }

    pub fn incompatibility(&self) -> Option<&Incompatibility> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(why) => Some(why),
        }
    }

    pub fn mapped(&self) -> Option<&Formula> {
        match self {
            Self::Valid(formula) => Some(formula),
            Self::Invalid(_) => None,
        }
    }

    pub fn into_mapped(self) -> Option<Formula> {
        match self {
            Self::Valid(formula) => Some(formula),
            Self::Invalid(_) => None,
        }
    }
}

/// Per-candidate results of a validation pass, in candidate order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationMap {
    entries: Vec<(VariableId, Compatibility)>,
    index: FxHashMap<VariableId, usize>,
}

impl ValidationMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Record a result; a repeated id replaces the earlier entry in place.
    fn insert(&mut self, id: VariableId, result: Compatibility) {
        match self.index.get(&id) {
            Some(&pos) => self.entries[pos].1 = result,
            None => {
                self.index.insert(id, self.entries.len());
                self.entries.push((id, result));
            }
        }
    }

    pub fn get(&self, id: VariableId) -> Option<&Compatibility> {
        self.index.get(&id).map(|&pos| &self.entries[pos].1)
    }

    pub fn is_valid(&self, id: VariableId) -> bool {
        self.get(id).is_some_and(Compatibility::is_valid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Compatibility)> + '_ {
        self.entries.iter().map(|(id, result)| (*id, result))
    }

    pub fn valid_ids(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.iter()
            .filter(|(_, result)| result.is_valid())
            .map(|(id, _)| id)
    }

    pub fn valid_count(&self) -> usize {
        self.valid_ids().count()
    }
}

/// Checks targets against one source formula.
///
/// The catalog is a read-only snapshot; it is only consulted by
/// [`CycleCheck::Transitive`].
pub struct CompatibilityChecker<'a> {
    source: &'a Variable,
    formula: &'a Formula,
    options: ReplicationOptions,
    catalog: Option<FxHashMap<VariableId, &'a Variable>>,
}

impl<'a> CompatibilityChecker<'a> {
    pub fn new(
        source: &'a Variable,
        catalog: &'a [Variable],
        options: ReplicationOptions,
    ) -> Result<Self, ReplicationError> {
        let formula = source
            .defined_formula()
            .ok_or(ReplicationError::MissingFormula {
                source_id: source.id,
            })?;

        let catalog = match options.cycle_check {
            CycleCheck::Direct => None,
            CycleCheck::Transitive => {
                let mut by_id: FxHashMap<VariableId, &'a Variable> = catalog
                    .iter()
                    .map(|var| (var.id, var))
                    .collect();
                by_id.insert(source.id, source);
                Some(by_id)
            }
        };

        Ok(Self {
            source,
            formula,
            options,
            catalog,
        })
    }

    pub fn source(&self) -> &'a Variable {
        self.source
    }

    pub fn options(&self) -> ReplicationOptions {
        self.options
    }

    /// Check one target, refusing the source itself as a target.
    pub fn check(&self, target: &Variable) -> Result<Compatibility, ReplicationError> {
        if target.id == self.source.id {
            return Err(ReplicationError::SelfTarget { id: target.id });
        }
        Ok(self.evaluate(target))
    }

    /// Check every candidate, in order. A candidate carrying the source's
    /// id is a circular reference, since a variable trivially uses itself.
    pub fn validate<'v>(&self, candidates: impl IntoIterator<Item = &'v Variable>) -> ValidationMap {
        let candidates = candidates.into_iter();
        let mut results = ValidationMap::with_capacity(candidates.size_hint().0);

        for candidate in candidates {
            let result = if candidate.id == self.source.id {
                Compatibility::Invalid(Incompatibility::CircularReference)
            } else {
                self.evaluate(candidate)
            };

            #[cfg(feature = "tracing")]
            if let Compatibility::Invalid(why) = &result {
                tracing::debug!(candidate = %candidate.id, reason = %why, "replication target rejected");
            }

            results.insert(candidate.id, result);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            candidates = results.len(),
            valid = results.valid_count(),
            "validation pass complete"
        );

        results
    }

    /// Walk the source formula once, stopping at the first incompatible step.
    fn evaluate(&self, target: &Variable) -> Compatibility {
        let mut mapped = Vec::with_capacity(self.formula.len());

        for step in self.formula {
            match step {
                FormulaStep::Variable(var) if var.id == target.id => {
                    return Compatibility::Invalid(Incompatibility::CircularReference);
                }
                FormulaStep::Variable(var) => {
                    if self.reaches(var.id, target.id) {
                        return Compatibility::Invalid(Incompatibility::TransitiveCycle {
                            via: var.code.clone(),
                        });
                    }
                    mapped.push(step.clone());
                }
                FormulaStep::GoalVariable { goal } => {
                    let key = goal_key(goal);
                    match target.goals.iter().find(|candidate| goal_key(candidate) == key) {
                        Some(matched) => mapped.push(FormulaStep::GoalVariable {
                            goal: matched.clone(),
                        }),
                        None => {
                            return Compatibility::Invalid(Incompatibility::MissingGoal {
                                key: key.into_owned(),
                            });
                        }
                    }
                }
                FormulaStep::QuadrenniumVariable { period } => {
                    match target.period_by_start_year(period.start_year) {
                        Some(matched) => mapped.push(FormulaStep::QuadrenniumVariable {
                            period: matched.clone(),
                        }),
                        None => {
                            let label = match period.label.as_deref() {
                                Some(label) if !label.is_empty() => label.to_string(),
                                _ => period.start_year.to_string(),
                            };
                            return Compatibility::Invalid(
                                Incompatibility::MissingQuadrennium { label },
                            );
                        }
                    }
                }
                FormulaStep::Number { .. }
                | FormulaStep::Operator { .. }
                | FormulaStep::Function { .. }
                | FormulaStep::OpenParen
                | FormulaStep::CloseParen
                | FormulaStep::Separator
                | FormulaStep::PeriodAdvance { .. } => mapped.push(step.clone()),
            }
        }

        Compatibility::Valid(Formula::new(mapped))
    }

    /// Whether `to` is reachable from `start` through catalog formulas.
    /// Always false unless transitive checking is on.
    fn reaches(&self, start: VariableId, to: VariableId) -> bool {
        let Some(catalog) = &self.catalog else {
            return false;
        };

        let mut visited = FxHashSet::default();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            let Some(formula) = catalog.get(&id).and_then(|var| var.formula.as_ref()) else {
                continue;
            };
            stack.extend(
                formula
                    .referenced_variables()
                    .into_iter()
                    .filter(|next| !visited.contains(next)),
            );
        }
        false
    }
}

/// Decide whether `source`'s formula can be copied onto `target`.
///
/// Errors only on misuse: a source without a formula, or `target` being the
/// source itself.
pub fn check_compatibility(
    source: &Variable,
    target: &Variable,
    options: ReplicationOptions,
) -> Result<Compatibility, ReplicationError> {
    CompatibilityChecker::new(source, std::slice::from_ref(target), options)?.check(target)
}

/// Check every candidate against `source`.
///
/// A candidate carrying the source's own id is reported as a circular
/// reference rather than rejected as misuse.
pub fn validate_all(
    source: &Variable,
    candidates: &[Variable],
    options: ReplicationOptions,
) -> Result<ValidationMap, ReplicationError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!(
        "validate_all",
        source = %source.id,
        candidates = candidates.len()
    )
    .entered();

    let checker = CompatibilityChecker::new(source, candidates, options)?;
    Ok(checker.validate(candidates))
}
