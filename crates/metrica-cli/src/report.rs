use std::io::{self, Write};

use anyhow::Result;
use clap::ValueEnum;
use metrica_common::Variable;
use metrica_replicate::ReplicationSession;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct CandidateReport<'a> {
    id: u64,
    code: &'a str,
    name: &'a str,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formula: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    source: u64,
    applicable: bool,
    valid: usize,
    candidates: Vec<CandidateReport<'a>>,
}

fn build<'a>(session: &ReplicationSession, catalog: &'a [Variable]) -> CheckReport<'a> {
    let candidates = session
        .results()
        .iter()
        .filter_map(|(id, result)| {
            let var = catalog.iter().find(|var| var.id == id)?;
            Some(CandidateReport {
                id: id.get(),
                code: &var.code,
                name: &var.name,
                valid: result.is_valid(),
                reason: result.reason(),
                formula: result.mapped().map(ToString::to_string),
            })
        })
        .collect();

    CheckReport {
        source: session.source().id.get(),
        applicable: session.is_applicable(),
        valid: session.valid_count(),
        candidates,
    }
}

pub fn write_check<W: Write>(
    out: &mut W,
    session: &ReplicationSession,
    catalog: &[Variable],
    format: OutputFormat,
) -> Result<()> {
    let report = build(session, catalog);
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        OutputFormat::Text => write_text(out, session.source(), &report)?,
    }
    Ok(())
}

fn write_text<W: Write>(out: &mut W, source: &Variable, report: &CheckReport<'_>) -> io::Result<()> {
    let Some(formula) = source.defined_formula().filter(|_| report.applicable) else {
        return writeln!(
            out,
            "{} ({}) has no formula; nothing to replicate",
            source.code, source.name
        );
    };

    writeln!(out, "source {} ({}): {formula}", source.code, source.name)?;
    for candidate in &report.candidates {
        match (&candidate.formula, &candidate.reason) {
            (Some(mapped), _) => writeln!(
                out,
                "  ok    {:>4}  {:<8} {}",
                candidate.id, candidate.code, mapped
            )?,
            (None, reason) => writeln!(
                out,
                "  skip  {:>4}  {:<8} {}",
                candidate.id,
                candidate.code,
                reason.as_deref().unwrap_or_default()
            )?,
        }
    }
    writeln!(
        out,
        "{} of {} candidates compatible",
        report.valid,
        report.candidates.len()
    )
}
