//! Blockdef - building-block definition planning CLI
//!
//! The `blockdef` command exposes the versioning engine offline.
//!
//! ## Commands
//!
//! - `fingerprint`: Compute the content hash of a version payload
//! - `plan`: Predict the version history after applying a desired spec
//! - `reconcile`: Rebuild a history from backend version records
//! - `simulate`: Run a sequence of desired specs against an in-memory backend

use anyhow::{bail, Context, Result};
use blockdef_client::fakes::MemoryVersionClient;
use blockdef_client::VersionDto;
use blockdef_core::domain::payload::hashable_payload;
use blockdef_core::{
    reconcile, ConfigValue, DefinitionApplier, DefinitionState, DesiredDefinition, Diagnostics,
    Fingerprinter, Knowable, LogFormat, PlanPredictor, PredictedState, PredictorConfig,
    VersionRecord,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "blockdef")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Building-block definition versioning engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format on stderr (text or json)
    #[arg(long, global = true, env = "BLOCKDEF_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Engine configuration file (TOML); defaults come from the environment
    #[arg(long, global = true, env = "BLOCKDEF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the content hash of a version payload (JSON)
    Fingerprint {
        /// Payload file
        payload: PathBuf,

        /// Also print the canonical JSON the hash is computed over
        #[arg(long)]
        canonical: bool,
    },

    /// Predict the version history after applying a desired spec
    Plan {
        /// Prior definition state (JSON); omit to plan a creation
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Desired version spec (JSON, unknown values as {"$unknown": true})
        #[arg(short, long)]
        desired: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Rebuild a version history from backend version records (JSON list)
    Reconcile {
        /// Version records as returned by the backend
        records: PathBuf,

        /// Desired draft flag, used to detect releases awaiting approval
        #[arg(long)]
        draft: Option<bool>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Apply desired specs in order against an in-memory backend
    Simulate {
        /// Desired version specs (JSON); the first one creates the definition
        #[arg(required = true)]
        desired: Vec<PathBuf>,

        /// Releases wait for approval; approve them before the next step
        #[arg(long)]
        require_approval: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    blockdef_core::init_tracing(cli.log_format, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fingerprint { payload, canonical } => cmd_fingerprint(&config, &payload, canonical),
        Commands::Plan {
            state,
            desired,
            format,
        } => cmd_plan(&config, state.as_deref(), &desired, format),
        Commands::Reconcile {
            records,
            draft,
            format,
        } => cmd_reconcile(&config, &records, draft, format),
        Commands::Simulate {
            desired,
            require_approval,
            format,
        } => cmd_simulate(&config, &desired, require_approval, format).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<PredictorConfig> {
    let Some(path) = path else {
        return Ok(PredictorConfig::from_env());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Invalid config in {:?}", path))
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn read_desired(path: &Path) -> Result<DesiredDefinition> {
    let value: Value = read_json_file(path)?;
    Ok(DesiredDefinition::new(ConfigValue::from_json(&value)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── fingerprint ─────────────────────────────────────────────────────────

fn cmd_fingerprint(config: &PredictorConfig, path: &Path, canonical: bool) -> Result<()> {
    let payload: Value = read_json_file(path)?;
    let hashable = hashable_payload(&payload, config);
    let fingerprinter = Fingerprinter::new(config.fingerprint.clone());

    let hash = fingerprinter
        .fingerprint_value(&hashable)
        .with_context(|| format!("Cannot fingerprint {:?}", path))?;
    if canonical {
        println!("{}", fingerprinter.canonical_json(&hashable)?);
    }
    println!("{hash}");
    Ok(())
}

// ── plan ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PlanReport<'a> {
    state: Option<&'a PredictedState>,
    diagnostics: &'a Diagnostics,
}

fn cmd_plan(
    config: &PredictorConfig,
    state: Option<&Path>,
    desired: &Path,
    format: OutputFormat,
) -> Result<()> {
    let desired = read_desired(desired)?;
    let predictor = PlanPredictor::new(config.clone());
    let prediction = match state {
        Some(path) => {
            let prior: DefinitionState = read_json_file(path)?;
            predictor.predict(&prior, &desired)
        }
        None => predictor.predict_create(&desired),
    };

    match format {
        OutputFormat::Json => print_json(&PlanReport {
            state: prediction.state.as_ref(),
            diagnostics: &prediction.diagnostics,
        })?,
        OutputFormat::Text => {
            if let Some(state) = &prediction.state {
                print!("{}", render_prediction(state));
            }
            print!("{}", render_diagnostics(&prediction.diagnostics));
        }
    }

    if prediction.diagnostics.has_errors() {
        bail!("plan failed with {} error(s)", prediction.diagnostics.errors().count());
    }
    Ok(())
}

fn render_knowable<T: std::fmt::Display>(value: &Knowable<T>) -> String {
    match value {
        Knowable::Known(v) => v.to_string(),
        Knowable::Unknown => "(known after apply)".to_string(),
    }
}

fn render_prediction(state: &PredictedState) -> String {
    let mut out = String::new();
    let transition = state
        .transition
        .map(|t| t.to_string())
        .unwrap_or_else(|| "(known after apply)".to_string());
    out.push_str(&format!("Transition: {transition}\n"));
    out.push_str("Versions:\n");
    for version in &state.versions {
        out.push_str(&format!(
            "  #{:<4} {:<20} {}\n",
            render_knowable(&version.number),
            render_knowable(&version.state),
            render_knowable(&version.content_hash),
        ));
    }
    let release = match &state.version_latest_release {
        Knowable::Known(Some(v)) => format!("#{} {}", v.number, v.content_hash.short()),
        Knowable::Known(None) => "none".to_string(),
        Knowable::Unknown => "(known after apply)".to_string(),
    };
    out.push_str(&format!("Latest release: {release}\n"));
    out
}

fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let level = if d.is_error() { "error" } else { "warning" };
            format!("{level}: {}\n  {}\n", d.summary, d.detail)
        })
        .collect()
}

// ── reconcile ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReconcileReport<'a> {
    versions: &'a [VersionRecord],
    version_latest_release: Option<&'a VersionRecord>,
    diagnostics: &'a Diagnostics,
}

fn cmd_reconcile(
    config: &PredictorConfig,
    path: &Path,
    draft: Option<bool>,
    format: OutputFormat,
) -> Result<()> {
    let records: Vec<VersionDto> = read_json_file(path)?;
    let Some(definition_id) = records.first().map(|r| r.definition) else {
        bail!("no version records in {:?}", path);
    };
    let desired_draft = draft.map(Knowable::Known).unwrap_or(Knowable::Unknown);
    let reconciled = reconcile(definition_id, records, desired_draft, None, config)
        .with_context(|| format!("Cannot reconcile definition {definition_id}"))?;

    match format {
        OutputFormat::Json => print_json(&ReconcileReport {
            versions: reconciled.history.versions(),
            version_latest_release: reconciled.version_latest_release.as_ref(),
            diagnostics: &reconciled.diagnostics,
        }),
        OutputFormat::Text => {
            for v in reconciled.history.versions() {
                println!("#{:<4} {:<10} {} {}", v.number, v.state, v.content_hash, v.uuid);
            }
            match &reconciled.version_latest_release {
                Some(v) => println!("Latest release: #{}", v.number),
                None => println!("Latest release: none"),
            }
            print!("{}", render_diagnostics(&reconciled.diagnostics));
            Ok(())
        }
    }
}

// ── simulate ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SimulationStep {
    step: usize,
    desired: PathBuf,
    state: DefinitionState,
    diagnostics: Diagnostics,
}

async fn cmd_simulate(
    config: &PredictorConfig,
    desired: &[PathBuf],
    require_approval: bool,
    format: OutputFormat,
) -> Result<()> {
    let steps = run_simulation(config, desired, require_approval).await?;
    match format {
        OutputFormat::Json => print_json(&steps),
        OutputFormat::Text => {
            for step in &steps {
                println!("Step {} ({:?})", step.step, step.desired);
                for v in step.state.versions.versions() {
                    println!("  #{:<4} {:<10} {}", v.number, v.state, v.content_hash.short());
                }
                print!("{}", render_diagnostics(&step.diagnostics));
            }
            Ok(())
        }
    }
}

async fn run_simulation(
    config: &PredictorConfig,
    desired: &[PathBuf],
    require_approval: bool,
) -> Result<Vec<SimulationStep>> {
    let Some((first, rest)) = desired.split_first() else {
        bail!("at least one desired spec is required");
    };

    let client = if require_approval {
        MemoryVersionClient::new().with_required_approval()
    } else {
        MemoryVersionClient::new()
    };
    let workspace = "simulation";
    let definition_id: Uuid = client.create_definition(workspace);
    let applier = DefinitionApplier::new(client, config.clone());
    let predictor = PlanPredictor::new(config.clone());
    info!(definition_id = %definition_id, steps = desired.len(), "simulation started");

    let created = applier
        .create(definition_id, workspace, &read_desired(first)?)
        .await
        .with_context(|| format!("Step 1 ({:?}) failed", first))?;
    let mut steps = vec![SimulationStep {
        step: 1,
        desired: first.clone(),
        state: created.state,
        diagnostics: created.diagnostics,
    }];

    for (i, path) in rest.iter().enumerate() {
        let step = i + 2;
        let mut prior = steps[steps.len() - 1].state.clone();
        if require_approval {
            prior = approve_pending(&applier, prior).await?;
        }

        let desired = read_desired(path)?;
        let prediction = predictor.predict(&prior, &desired);
        let Some(planned) = prediction.state else {
            bail!(
                "Step {step} ({:?}) plan failed:\n{}",
                path,
                render_diagnostics(&prediction.diagnostics)
            );
        };
        let mut applied = applier
            .apply(&prior, &planned, &desired)
            .await
            .with_context(|| format!("Step {step} ({:?}) failed", path))?;
        let mut diagnostics = prediction.diagnostics;
        diagnostics.extend(applied.diagnostics);
        applied.diagnostics = diagnostics;

        steps.push(SimulationStep {
            step,
            desired: path.clone(),
            state: applied.state,
            diagnostics: applied.diagnostics,
        });
    }
    Ok(steps)
}

/// Approve a version waiting in review and re-read the history.
async fn approve_pending(
    applier: &DefinitionApplier<MemoryVersionClient>,
    prior: DefinitionState,
) -> Result<DefinitionState> {
    let latest = prior.version_latest();
    if latest.state.is_released() || latest.state == blockdef_client::VersionState::Draft {
        return Ok(prior);
    }
    applier
        .client()
        .approve(latest.uuid)
        .with_context(|| format!("Cannot approve version {}", latest.number))?;
    Ok(applier.refresh(&prior).await?.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockdef_client::VersionState;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::try_parse_from(["blockdef", "fingerprint", "p.json", "--log-format", "json"])
            .expect("parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["blockdef", "--log-format", "xml", "fingerprint", "p.json"])
            .is_err());
    }

    #[test]
    fn test_load_config_from_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(
            &dir,
            "blockdef.toml",
            r#"
            draft_key = "is_draft"

            [fingerprint]
            denied_keys = ["password"]
            "#,
        );
        let config = load_config(Some(path.as_path())).expect("config");
        assert_eq!(config.draft_key, "is_draft");
        assert!(config.fingerprint.is_denied("password"));
        assert!(!config.fingerprint.is_denied("plaintext"));
        assert_eq!(config.secret_ref_key, "secret_ref");
    }

    #[test]
    fn test_load_config_reports_bad_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(&dir, "blockdef.toml", "draft_key = [");
        let err = load_config(Some(path.as_path())).expect_err("invalid toml");
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_fingerprint_command_accepts_backend_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(
            &dir,
            "payload.json",
            r#"{"number": 3, "state": "released", "inputs": [{"name": "a"}]}"#,
        );
        assert!(cmd_fingerprint(&PredictorConfig::default(), &path, true).is_ok());
    }

    #[test]
    fn test_plan_fails_on_immutable_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let released = r#"{"draft": false, "inputs": [{"name": "a"}]}"#;
        let changed = r#"{"draft": false, "inputs": [{"name": "b"}]}"#;
        let first = write(&dir, "v1.json", released);

        let config = PredictorConfig::default();
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let steps = rt
            .block_on(run_simulation(&config, &[first], false))
            .expect("simulation");
        let state_path = write(
            &dir,
            "state.json",
            &serde_json::to_string(&steps[0].state).expect("serialize state"),
        );
        let desired_path = write(&dir, "desired.json", changed);

        let err = cmd_plan(&config, Some(state_path.as_path()), &desired_path, OutputFormat::Json)
            .expect_err("immutable");
        assert!(err.to_string().contains("plan failed"));
    }

    #[tokio::test]
    async fn test_simulate_release_and_new_draft() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = vec![
            write(&dir, "1.json", r#"{"inputs": [{"name": "a"}]}"#),
            write(&dir, "2.json", r#"{"draft": false, "inputs": [{"name": "a"}]}"#),
            write(&dir, "3.json", r#"{"draft": true, "inputs": [{"name": "b"}]}"#),
        ];

        let steps = run_simulation(&PredictorConfig::default(), &paths, true)
            .await
            .expect("simulation");

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].state.version_latest().state, VersionState::InReview);
        let last: Vec<_> = steps[2]
            .state
            .versions
            .versions()
            .iter()
            .map(|v| (v.number, v.state))
            .collect();
        assert_eq!(
            last,
            vec![(1, VersionState::Released), (2, VersionState::Draft)]
        );
    }

    #[tokio::test]
    async fn test_reconcile_command_reads_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = MemoryVersionClient::new();
        let definition_id = client.create_definition("ws");
        let records = blockdef_client::VersionClient::list_versions(&client, definition_id)
            .await
            .expect("list");
        let path = write(
            &dir,
            "records.json",
            &serde_json::to_string(&records).expect("serialize records"),
        );
        assert!(cmd_reconcile(&PredictorConfig::default(), &path, Some(true), OutputFormat::Text).is_ok());

        let empty = write(&dir, "empty.json", "[]");
        assert!(cmd_reconcile(&PredictorConfig::default(), &empty, None, OutputFormat::Text).is_err());
    }
}
