//! Scope template reconciler.
//!
//! Reconciles scope templates held in a store snapshot (`.scope/store.json`)
//! and writes the resulting cluster roles back to the snapshot. Each
//! invocation is one pass; re-run it after any failure.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use scope_operator::core::fingerprint::fingerprint;
use scope_operator::core::types::ObjectKey;
use scope_operator::exit_codes;
use scope_operator::io::config::{DEFAULT_CONFIG_PATH, OperatorConfig, load_config, write_config};
use scope_operator::io::file_store::{load_store, write_snapshot, write_store};
use scope_operator::io::memory_store::StoreSnapshot;
use scope_operator::io::store::ObjectStore;
use scope_operator::logging;
use scope_operator::reconcile::{ReconcileOutcome, ReconcileSummary, reconcile, reconcile_all};

#[derive(Parser)]
#[command(
    name = "scope-operator",
    version,
    about = "Reconcile scope templates into cluster roles"
)]
struct Cli {
    /// Path to the operator config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the config file and an empty store snapshot if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Run one reconciliation pass for `<namespace>/<name>`.
    Reconcile {
        #[arg(value_parser = parse_key)]
        template: ObjectKey,
    },
    /// Reconcile every template in the store.
    ReconcileAll,
    /// Print the current fingerprint of `<namespace>/<name>`.
    Fingerprint {
        #[arg(value_parser = parse_key)]
        template: ObjectKey,
    },
}

fn parse_key(raw: &str) -> Result<ObjectKey, String> {
    raw.parse()
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let cfg = load_config(&cli.config)?;
    logging::init(&cfg.log.filter);
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, &cfg, force),
        Command::Reconcile { template } => cmd_reconcile(&cfg, &template),
        Command::ReconcileAll => cmd_reconcile_all(&cfg),
        Command::Fingerprint { template } => cmd_fingerprint(&cfg, &template),
    }
}

fn cmd_init(config_path: &Path, cfg: &OperatorConfig, force: bool) -> Result<i32> {
    if force || !config_path.exists() {
        write_config(config_path, cfg).context("write config")?;
    }
    if force || !cfg.store.path.exists() {
        write_snapshot(&cfg.store.path, &StoreSnapshot::default()).context("write store")?;
    }
    Ok(exit_codes::OK)
}

fn cmd_reconcile(cfg: &OperatorConfig, key: &ObjectKey) -> Result<i32> {
    let store = load_store(&cfg.store.path)?;
    let result = reconcile(&store, key);
    // Partial progress is persisted even when the pass fails.
    write_store(&cfg.store.path, &store)?;
    Ok(report(key, &result))
}

fn cmd_reconcile_all(cfg: &OperatorConfig) -> Result<i32> {
    let store = load_store(&cfg.store.path)?;
    let results = reconcile_all(&store).context("list scope templates")?;
    write_store(&cfg.store.path, &store)?;

    let mut code = exit_codes::OK;
    for (key, result) in &results {
        if report(key, result) != exit_codes::OK {
            code = exit_codes::RECONCILE_FAILED;
        }
    }
    Ok(code)
}

fn cmd_fingerprint(cfg: &OperatorConfig, key: &ObjectKey) -> Result<i32> {
    let store = load_store(&cfg.store.path)?;
    let template = store
        .get_template(key)
        .map_err(|err| anyhow!("get ScopeTemplate {key}: {err}"))?;
    println!("{}", fingerprint(&template.spec));
    Ok(exit_codes::OK)
}

fn report<E: std::fmt::Display>(key: &ObjectKey, result: &Result<ReconcileOutcome, E>) -> i32 {
    match result {
        Ok(ReconcileOutcome::TemplateGone) => {
            println!("reconcile: template={key} gone");
            exit_codes::OK
        }
        Ok(ReconcileOutcome::Reconciled(summary)) => {
            println!("{}", render_summary(key, summary));
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("reconcile: template={key} error: {err}");
            exit_codes::RECONCILE_FAILED
        }
    }
}

fn render_summary(key: &ObjectKey, summary: &ReconcileSummary) -> String {
    format!(
        "reconcile: template={} fingerprint={} referenced={} created={} updated={} unchanged={} deleted={}",
        key,
        summary.fingerprint,
        summary.referenced,
        summary.created.len(),
        summary.updated.len(),
        summary.unchanged.len(),
        summary.deleted.len()
    )
}
