//! Formula replication for indicator variables.
//!
//! Given a variable whose formula references goals, quadrennium periods and
//! other variables, this crate decides which other variables can receive a
//! copy of that formula and produces the copy retargeted at the receiving
//! variable's own goals and periods.
//!
//! The pipeline is strictly one-way:
//! [`normalize_label`] feeds [`check_compatibility`], which [`validate_all`]
//! runs per candidate, and a [`ReplicationSession`] drives selection and the
//! final hand-off to a [`ReplicationSink`].

mod compat;
mod error;
mod normalize;
mod options;
mod session;

pub use compat::{
    Compatibility, CompatibilityChecker, Incompatibility, ValidationMap, check_compatibility,
    validate_all,
};
pub use error::ReplicationError;
pub use normalize::{LABEL_DELIMITER, goal_key, normalize_label};
pub use options::{CycleCheck, ReplicationOptions};
pub use session::{
    ReplicationBatch, ReplicationSession, ReplicationSink, apply_formulas,
    commit_replication,
};
