//! Formula representation as a flat sequence of typed steps.
//!
//! The formula editor produces these sequences already balanced and
//! syntactically legal; nothing in this module re-checks that. Consumers
//! pattern-match on [`FormulaStep`] instead of parsing text.
//!
//! Only three kinds point at catalog records:
//!
//! - **`Variable`**            : another indicator variable, by identity
//! - **`GoalVariable`**        : a full annual [`Goal`] record
//! - **`QuadrenniumVariable`** : a full [`QuadrenniumPeriod`] record
//!
//! Every other kind is inert payload as far as replication is concerned.

use std::fmt;

use crate::id::VariableId;
use crate::record::{Goal, QuadrenniumPeriod};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity of a referenced variable as captured when the step was authored.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableRef {
    pub id: VariableId,
    pub name: String,
    pub code: String,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    #[cfg_attr(feature = "serde", serde(rename = "+"))]
    Add,
    #[cfg_attr(feature = "serde", serde(rename = "-"))]
    Sub,
    #[cfg_attr(feature = "serde", serde(rename = "*"))]
    Mul,
    #[cfg_attr(feature = "serde", serde(rename = "/"))]
    Div,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One element of a formula.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaStep {
    /// Current value of another variable.
    Variable(VariableRef),
    /// An annual goal. Carries the whole record because matching needs the label
    /// and display needs the value.
    GoalVariable { goal: Goal },
    /// A multi-year target period.
    QuadrenniumVariable { period: QuadrenniumPeriod },
    Number { value: f64 },
    Operator { op: Operator },
    /// Aggregate function call; opens an argument list closed by `CloseParen`.
    Function { name: String },
    OpenParen,
    CloseParen,
    /// Argument separator inside a function call.
    Separator,
    /// Reference shifted forward by `periods` reporting periods.
    PeriodAdvance { periods: u32 },
}

impl FormulaStep {
    pub fn variable(var: VariableRef) -> Self {
        Self::Variable(var)
    }

    pub fn goal(goal: Goal) -> Self {
        Self::GoalVariable { goal }
    }

    pub fn quadrennium(period: QuadrenniumPeriod) -> Self {
        Self::QuadrenniumVariable { period }
    }

    pub fn number(value: f64) -> Self {
        Self::Number { value }
    }

    pub fn op(op: Operator) -> Self {
        Self::Operator { op }
    }

    pub fn function<S: Into<String>>(name: S) -> Self {
        Self::Function { name: name.into() }
    }

    /// True for the three kinds that point at catalog records.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Self::Variable(_) | Self::GoalVariable { .. } | Self::QuadrenniumVariable { .. }
        )
    }
}

impl fmt::Display for FormulaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(var) => write!(f, "[{}]", var.code),
            Self::GoalVariable { goal } => match goal.label.as_deref() {
                Some(label) if !label.is_empty() => write!(f, "{{{label}}}"),
                _ => write!(f, "{{{}}}", goal.value),
            },
            Self::QuadrenniumVariable { period } => match period.label.as_deref() {
                Some(label) if !label.is_empty() => write!(f, "<{label}>"),
                _ => write!(f, "<{}-{}>", period.start_year, period.end_year),
            },
            Self::Number { value } => write!(f, "{value}"),
            Self::Operator { op } => write!(f, "{op}"),
            Self::Function { name } => write!(f, "{name}("),
            Self::OpenParen => f.write_str("("),
            Self::CloseParen => f.write_str(")"),
            Self::Separator => f.write_str(","),
            Self::PeriodAdvance { periods } => write!(f, "@+{periods}"),
        }
    }
}

/// Ordered step sequence attached to a variable.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Formula(Vec<FormulaStep>);

impl Formula {
    pub fn new(steps: Vec<FormulaStep>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[FormulaStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FormulaStep> {
        self.0.iter()
    }

    pub fn into_steps(self) -> Vec<FormulaStep> {
        self.0
    }

    /// Ids of `variable` steps, deduplicated, in order of first appearance.
    pub fn referenced_variables(&self) -> Vec<VariableId> {
        let mut out: Vec<VariableId> = Vec::new();
        for step in &self.0 {
            if let FormulaStep::Variable(var) = step {
                if !out.contains(&var.id) {
                    out.push(var.id);
                }
            }
        }
        out
    }

    pub fn references_variable(&self, id: VariableId) -> bool {
        self.0
            .iter()
            .any(|step| matches!(step, FormulaStep::Variable(var) if var.id == id))
    }
}

impl From<Vec<FormulaStep>> for Formula {
    fn from(steps: Vec<FormulaStep>) -> Self {
        Self(steps)
    }
}

impl FromIterator<FormulaStep> for Formula {
    fn from_iter<I: IntoIterator<Item = FormulaStep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Formula {
    type Item = &'a FormulaStep;
    type IntoIter = std::slice::Iter<'a, FormulaStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, step) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
