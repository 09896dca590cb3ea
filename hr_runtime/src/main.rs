//! hr_journal: offline inspection of an HR core journal.
//!
//! ```bash
//! hr_journal --config hr_core.toml verify
//! hr_journal snapshot state.json
//! hr_journal check-snapshot state.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use hr_runtime::logging::init_tracing;
use hr_runtime::snapshot_codec::{export_snapshot_to_file, import_snapshot_from_file};
use hr_runtime::{CoreConfig, HrCore, RuntimeError};

#[derive(Parser)]
#[command(name = "hr_journal")]
#[command(about = "Replay, verify and snapshot an HR core journal", long_about = None)]
struct Cli {
    /// Config file (defaults to hr_core.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the journal and check every hierarchy lock
    Verify,

    /// Replay the journal and write a hashed snapshot
    Snapshot {
        /// Output file; the hash goes to <out>.sha256
        out: PathBuf,
    },

    /// Verify a snapshot file against its hash and invariants
    CheckSnapshot {
        file: PathBuf,
    },
}

fn open_core(config_file: Option<PathBuf>) -> Result<HrCore, RuntimeError> {
    let config = CoreConfig::load(config_file.as_deref())?;
    init_tracing(&config.log_filter);
    HrCore::open(config)
}

fn verify(core: &HrCore) -> Result<(), RuntimeError> {
    let stats = core.replay_stats();
    println!(
        "replayed {} frames (last sequence {}): {} tenants, {} commits, {} units, {} events, {} cancellations",
        stats.frames,
        stats.last_sequence,
        stats.tenants,
        stats.commits,
        stats.units,
        stats.events,
        stats.cancellations
    );

    for config in core.export_snapshot().hierarchies {
        if config.locked {
            let fingerprint = core.verify_hierarchy_lock(&config.tenant_id)?;
            println!("  {} locked v{} {}", config.tenant_id, config.version, fingerprint);
        } else {
            println!("  {} unlocked v{}", config.tenant_id, config.version);
        }
    }
    Ok(())
}

fn run(config_file: Option<PathBuf>, command: Commands) -> Result<(), RuntimeError> {
    match command {
        Commands::Verify => {
            let core = open_core(config_file)?;
            verify(&core)
        }
        Commands::Snapshot { out } => {
            let core = open_core(config_file)?;
            let hash = export_snapshot_to_file(&core.export_snapshot(), &out)?;
            println!("{} {}", hash, out.display());
            Ok(())
        }
        Commands::CheckSnapshot { file } => {
            init_tracing("info");
            let snapshot = import_snapshot_from_file(&file)?;
            println!(
                "ok: {} hierarchies, {} units, {} chains at sequence {}",
                snapshot.hierarchies.len(),
                snapshot.units.len(),
                snapshot.chains.len(),
                snapshot.journal_sequence
            );
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.config, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = err.kind(), error = %err, "hr_journal failed");
            eprintln!("hr_journal: {}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_takes_output_path() {
        let cli = Cli::try_parse_from(["hr_journal", "--config", "core.toml", "snapshot", "out.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("core.toml")));
        match cli.command {
            Commands::Snapshot { out } => assert_eq!(out, PathBuf::from("out.json")),
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_check_snapshot_is_kebab_case() {
        let cli = Cli::try_parse_from(["hr_journal", "check-snapshot", "s.json"]).unwrap();
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Commands::CheckSnapshot { .. }));
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["hr_journal"]).is_err());
        assert!(Cli::try_parse_from(["hr_journal", "snapshot"]).is_err());
    }
}
