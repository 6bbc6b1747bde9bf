//! Label identity used to recognise "the same goal" across variables.
//!
//! Goal labels are authored with a trailing value annotation
//! (`"Meta 2025: 100"`). Two variables share a goal when their labels agree
//! once that annotation is stripped.

use std::borrow::Cow;

use metrica_common::Goal;

/// Separates a label from its trailing value annotation.
pub const LABEL_DELIMITER: char = ':';

/// Comparable identity for a goal or period label.
///
/// - absent or empty label: `fallback`, unchanged
/// - last `:` at a position past the start: the text before it, trimmed
/// - otherwise: the label exactly as given, whitespace included
pub fn normalize_label<'a>(label: Option<&'a str>, fallback: &'a str) -> &'a str {
    let Some(label) = label.filter(|l| !l.is_empty()) else {
        return fallback;
    };
    match label.rfind(LABEL_DELIMITER) {
        Some(pos) if pos > 0 => label[..pos].trim(),
        // Untrimmed on purpose: labels without an annotation are compared verbatim.
        _ => label,
    }
}

/// Matching key of a goal: its normalized label, or its target value when unlabeled.
///
/// Source and candidate goals must both go through here. `-0.0` keys as `"0"`.
pub fn goal_key(goal: &Goal) -> Cow<'_, str> {
    match goal.label.as_deref() {
        Some(label) if !label.is_empty() => Cow::Borrowed(normalize_label(Some(label), "")),
        _ => {
            let value = if goal.value == 0.0 { 0.0 } else { goal.value };
            Cow::Owned(value.to_string())
        }
    }
}
