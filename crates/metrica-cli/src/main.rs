use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use metrica_common::{Formula, VariableId};
use metrica_replicate::{CycleCheck, ReplicationOptions, ReplicationSession, apply_formulas};
use tracing_subscriber::EnvFilter;

mod catalog;
mod report;

use catalog::CatalogDocument;
use report::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "metrica-replicate",
    about = "Check and apply indicator formula replication across a variable catalog"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report, for every other variable, whether the source formula can be copied onto it.
    Check(CheckArgs),
    /// Copy the source formula onto selected variables and write the catalog back.
    Replicate(ReplicateArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Catalog file (.json, .yaml or .yml).
    #[arg(long)]
    catalog: PathBuf,

    /// Id of the variable whose formula is replicated.
    #[arg(long)]
    source: u64,

    /// Also reject targets reachable through the formulas of referenced variables.
    #[arg(long)]
    transitive: bool,
}

impl SourceArgs {
    fn options(&self) -> ReplicationOptions {
        let cycle_check = if self.transitive {
            CycleCheck::Transitive
        } else {
            CycleCheck::Direct
        };
        ReplicationOptions::new().with_cycle_check(cycle_check)
    }
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ReplicateArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Target variable id. May be repeated.
    #[arg(long = "target", required_unless_present = "all_valid")]
    targets: Vec<u64>,

    /// Select every compatible variable.
    #[arg(long, conflicts_with = "targets")]
    all_valid: bool,

    /// Where to write the updated catalog. Defaults to rewriting --catalog.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_session(args: &SourceArgs) -> Result<(CatalogDocument, ReplicationSession)> {
    let doc = CatalogDocument::load(&args.catalog)?;
    let source = doc.variable(VariableId(args.source))?;
    let session = ReplicationSession::open(source, &doc.variables, args.options());
    tracing::info!(
        source = %source.code,
        candidates = session.results().len(),
        valid = session.valid_count(),
        "catalog validated"
    );
    Ok((doc, session))
}

fn run_check(args: CheckArgs) -> Result<()> {
    let (doc, session) = open_session(&args.source)?;
    let stdout = io::stdout();
    report::write_check(&mut stdout.lock(), &session, &doc.variables, args.format)
}

fn run_replicate(args: ReplicateArgs) -> Result<()> {
    let (mut doc, mut session) = open_session(&args.source)?;
    if !session.is_applicable() {
        bail!(
            "variable {} has no formula to replicate",
            session.source().code
        );
    }

    if args.all_valid {
        session.select_all_valid();
    } else {
        for id in &args.targets {
            let id = VariableId(*id);
            if id == session.source().id {
                bail!("variable {id} cannot be a replication target of itself");
            }
            session.select(id);
        }
    }

    let out = args.out.unwrap_or_else(|| args.source.catalog.clone());
    let mut write_catalog =
        |_: &[VariableId], formulas: &BTreeMap<VariableId, Formula>| -> Result<()> {
            let applied = apply_formulas(formulas, &mut doc.variables);
            tracing::info!(applied, out = %out.display(), "writing catalog");
            doc.save(&out)
        };
    let batch = session
        .commit_into(&mut write_catalog)
        .context("failed to persist replicated formulas")?;

    for id in &batch.target_ids {
        if !batch.mapped_formulas.contains_key(id) {
            tracing::warn!(target_id = %id, "selected variable is not compatible; skipped");
        }
    }
    println!(
        "replicated formula onto {} of {} selected variables",
        batch.mapped_formulas.len(),
        batch.target_ids.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check(args) => run_check(args),
        Command::Replicate(args) => run_replicate(args),
    }
}
