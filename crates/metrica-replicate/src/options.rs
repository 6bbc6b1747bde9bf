/// How far circular-reference detection looks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum CycleCheck {
    /// Reject a target only when the source formula names it directly.
    #[default]
    Direct,
    /// Also reject a target reachable through the formulas of variables the
    /// source formula names.
    Transitive,
}

/// Knobs for a replication pass. `Default` is the dashboard's behavior.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ReplicationOptions {
    pub cycle_check: CycleCheck,
}

impl ReplicationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cycle_check(mut self, cycle_check: CycleCheck) -> Self {
        self.cycle_check = cycle_check;
        self
    }

    pub fn transitive() -> Self {
        Self::new().with_cycle_check(CycleCheck::Transitive)
    }
}
