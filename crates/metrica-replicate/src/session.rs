use std::collections::{BTreeMap, BTreeSet};

use metrica_common::{Formula, Variable, VariableId};

use crate::compat::{CompatibilityChecker, ValidationMap};
use crate::options::ReplicationOptions;

/// What a commit hands to persistence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplicationBatch {
    /// Every id that was selected, including ones dropped as invalid.
    pub target_ids: Vec<VariableId>,
    /// Retargeted formulas for the selected ids that are valid.
    pub mapped_formulas: BTreeMap<VariableId, Formula>,
}

impl ReplicationBatch {
    pub fn is_empty(&self) -> bool {
        self.mapped_formulas.is_empty()
    }

    /// Write each mapped formula onto its variable. Returns how many variables changed.
    pub fn apply_to(&self, variables: &mut [Variable]) -> usize {
        apply_formulas(&self.mapped_formulas, variables)
    }
}

/// Write mapped formulas onto the matching variables. Returns how many changed.
///
/// Sinks only see the formula map, so this is the shared path for persisting
/// into an in-memory catalog.
pub fn apply_formulas(
    mapped_formulas: &BTreeMap<VariableId, Formula>,
    variables: &mut [Variable],
) -> usize {
    let mut applied = 0;
    for var in variables.iter_mut() {
        if let Some(formula) = mapped_formulas.get(&var.id) {
            var.formula = Some(formula.clone());
            applied += 1;
        }
    }
    applied
}

/// Persistence callback receiving a committed batch.
pub trait ReplicationSink {
    type Error;

    fn persist(
        &mut self,
        target_ids: &[VariableId],
        mapped_formulas: &BTreeMap<VariableId, Formula>,
    ) -> Result<(), Self::Error>;
}

impl<F, E> ReplicationSink for F
where
    F: FnMut(&[VariableId], &BTreeMap<VariableId, Formula>) -> Result<(), E>,
{
    type Error = E;

    fn persist(
        &mut self,
        target_ids: &[VariableId],
        mapped_formulas: &BTreeMap<VariableId, Formula>,
    ) -> Result<(), E> {
        self(target_ids, mapped_formulas)
    }
}

/// Build the batch for `selected`. Ids without a valid result are kept in
/// `target_ids` but get no mapping; stale selections are not an error.
pub fn commit_replication<I>(selected: I, results: &ValidationMap) -> ReplicationBatch
where
    I: IntoIterator<Item = VariableId>,
{
    let mut batch = ReplicationBatch::default();
    for id in selected {
        batch.target_ids.push(id);
        match results.get(id).and_then(|result| result.mapped()) {
            Some(formula) => {
                batch.mapped_formulas.insert(id, formula.clone());
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(candidate = %id, "skipping selected target without a valid mapping");
            }
        }
    }
    batch
}

/// Selection-then-commit workflow for replicating one variable's formula.
///
/// Validation results are recomputed from the supplied catalog on every
/// open, reopen and refresh; nothing carries over from a previous catalog.
#[derive(Debug, Clone)]
pub struct ReplicationSession {
    source: Variable,
    options: ReplicationOptions,
    applicable: bool,
    results: ValidationMap,
    selection: BTreeSet<VariableId>,
}

impl ReplicationSession {
    /// Start a session for `source`. Every catalog entry other than the
    /// source is a candidate. A source without a formula offers none.
    pub fn open(source: &Variable, catalog: &[Variable], options: ReplicationOptions) -> Self {
        let mut session = Self {
            source: source.clone(),
            options,
            applicable: false,
            results: ValidationMap::new(),
            selection: BTreeSet::new(),
        };
        session.revalidate(catalog);
        session
    }

    /// Present a (possibly different) source. Clears the selection.
    pub fn reopen(&mut self, source: &Variable, catalog: &[Variable]) {
        self.source = source.clone();
        self.selection.clear();
        self.revalidate(catalog);
    }

    /// Recompute results after the catalog changed, keeping the selection.
    pub fn refresh(&mut self, catalog: &[Variable]) {
        if let Some(updated) = catalog.iter().find(|var| var.id == self.source.id) {
            self.source = updated.clone();
        }
        self.revalidate(catalog);
    }

    fn revalidate(&mut self, catalog: &[Variable]) {
        let source_id = self.source.id;
        match CompatibilityChecker::new(&self.source, catalog, self.options) {
            Ok(checker) => {
                self.results = checker.validate(catalog.iter().filter(|var| var.id != source_id));
                self.applicable = true;
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(source = %source_id, "source has no formula; no replication targets offered");
                self.results = ValidationMap::new();
                self.applicable = false;
            }
        }
    }

    pub fn source(&self) -> &Variable {
        &self.source
    }

    pub fn options(&self) -> ReplicationOptions {
        self.options
    }

    /// False when the source has no formula to copy.
    pub fn is_applicable(&self) -> bool {
        self.applicable
    }

    pub fn results(&self) -> &ValidationMap {
        &self.results
    }

    pub fn valid_count(&self) -> usize {
        self.results.valid_count()
    }

    pub fn selection(&self) -> &BTreeSet<VariableId> {
        &self.selection
    }

    pub fn is_selected(&self, id: VariableId) -> bool {
        self.selection.contains(&id)
    }

    /// Flip one id in or out of the selection. Returns whether it is now selected.
    ///
    /// Validity is not checked here; commit drops invalid ids.
    pub fn toggle(&mut self, id: VariableId) -> bool {
        if self.selection.remove(&id) {
            false
        } else {
            self.selection.insert(id);
            true
        }
    }

    /// Add `id` to the selection. Returns false if it was already selected.
    pub fn select(&mut self, id: VariableId) -> bool {
        self.selection.insert(id)
    }

    /// Whether the "select all" control should read as checked.
    pub fn all_valid_selected(&self) -> bool {
        self.selection.len() == self.valid_count()
    }

    /// Clear the selection when its size equals the valid count, otherwise
    /// replace it with exactly the valid candidates.
    pub fn select_all_valid(&mut self) {
        if self.all_valid_selected() {
            self.selection.clear();
        } else {
            self.selection = self.results.valid_ids().collect();
        }
    }

    /// Build the batch for the current selection and clear the selection.
    pub fn commit(&mut self) -> ReplicationBatch {
        let batch = self.build_batch();
        self.selection.clear();
        batch
    }

    /// Hand the batch to `sink`. The selection is cleared only if the sink succeeds.
    pub fn commit_into<S>(&mut self, sink: &mut S) -> Result<ReplicationBatch, S::Error>
    where
        S: ReplicationSink + ?Sized,
    {
        let batch = self.build_batch();
        sink.persist(&batch.target_ids, &batch.mapped_formulas)?;
        self.selection.clear();
        Ok(batch)
    }

    fn build_batch(&self) -> ReplicationBatch {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "commit",
            source = %self.source.id,
            selected = self.selection.len()
        )
        .entered();

        commit_replication(self.selection.iter().copied(), &self.results)
    }
}
