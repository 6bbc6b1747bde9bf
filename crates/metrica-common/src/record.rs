use crate::id::{GoalId, PeriodId, VariableId};
use crate::step::{Formula, VariableRef};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Annual target attached to a variable.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub id: GoalId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub label: Option<String>,
    pub value: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub year: Option<i32>,
}

impl Goal {
    pub fn new(id: u64, value: f64) -> Self {
        Self {
            id: id.into(),
            label: None,
            value,
            year: None,
        }
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Multi-year target spanning `start_year..=end_year`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrenniumPeriod {
    pub id: PeriodId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub label: Option<String>,
    pub start_year: i32,
    pub end_year: i32,
    pub value: f64,
}

impl QuadrenniumPeriod {
    pub fn new(id: u64, start_year: i32, end_year: i32, value: f64) -> Self {
        Self {
            id: id.into(),
            label: None,
            start_year,
            end_year,
            value,
        }
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// An indicator variable: the unit a formula is attached to.
///
/// Formulas are authored per variable, so nothing here prevents a stored
/// formula from referencing its own variable. Replication refuses to
/// create such a formula.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub code: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub formula: Option<Formula>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub goals: Vec<Goal>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub quadrenniums: Vec<QuadrenniumPeriod>,
}

impl Variable {
    pub fn new(id: u64, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
            formula: None,
            goals: Vec::new(),
            quadrenniums: Vec::new(),
        }
    }

    pub fn with_formula(mut self, formula: impl Into<Formula>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn with_quadrennium(mut self, period: QuadrenniumPeriod) -> Self {
        self.quadrenniums.push(period);
        self
    }

    /// The formula, treating an empty step list the same as no formula.
    pub fn defined_formula(&self) -> Option<&Formula> {
        self.formula.as_ref().filter(|f| !f.is_empty())
    }

    /// Identity payload carried by `variable` steps that point here.
    pub fn as_ref_step(&self) -> VariableRef {
        VariableRef {
            id: self.id,
            name: self.name.clone(),
            code: self.code.clone(),
        }
    }

    pub fn goal_by_id(&self, id: GoalId) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    /// First period starting in `start_year`. End year and label play no part.
    pub fn period_by_start_year(&self, start_year: i32) -> Option<&QuadrenniumPeriod> {
        self.quadrenniums.iter().find(|p| p.start_year == start_year)
    }
}
