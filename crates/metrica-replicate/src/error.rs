use metrica_common::VariableId;

/// Caller misuse of the replication API.
///
/// An incompatible target is not an error; it is reported through
/// [`crate::Compatibility::Invalid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicationError {
    #[error("variable {source_id} has no formula to replicate")]
    MissingFormula { source_id: VariableId },
    #[error("variable {id} cannot be a replication target of itself")]
    SelfTarget { id: VariableId },
}
