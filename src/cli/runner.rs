//! CLI runner - executes commands

use crate::auth::Credential;
use crate::cli::commands::{Cli, Commands, OutputFormat, StateAction};
use crate::engine::Extractor;
use crate::error::{Error, Result, ResultExt};
use crate::loader::{load_pipeline, CredentialSource, PipelineConfig};
use crate::report::RunReport;
use crate::sink::{DuckDbSink, MemorySink, TableSink};
use crate::state::StateManager;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                endpoints,
                credential_env,
                credential_file,
                concurrency,
                timeout,
                dry_run,
            } => {
                let overrides = RunOverrides {
                    credential: match (credential_env, credential_file) {
                        (Some(var), _) => Some(CredentialSource::Env(var.clone())),
                        (None, Some(path)) => Some(CredentialSource::File(path.clone())),
                        (None, None) => None,
                    },
                    concurrency: *concurrency,
                    timeout_secs: *timeout,
                    dry_run: *dry_run,
                };
                self.extract(endpoints, overrides).await
            }
            Commands::Validate => self.validate(),
            Commands::Endpoints => self.list_endpoints(),
            Commands::State { action } => match action {
                StateAction::Show { endpoint } => self.show_state(endpoint.as_deref()).await,
                StateAction::Reset { endpoint, all } => {
                    self.reset_state(endpoint.as_deref(), *all).await
                }
            },
        }
    }

    /// Load pipeline definition
    fn load_pipeline(&self) -> Result<PipelineConfig> {
        load_pipeline(&self.cli.pipeline)
    }

    /// Open the state store
    fn load_state(&self) -> Result<StateManager> {
        if self.cli.no_state {
            Ok(StateManager::in_memory())
        } else {
            StateManager::from_file(&self.cli.state).with_context(|| {
                format!("Cannot load state from {}", self.cli.state.display())
            })
        }
    }

    /// Extract endpoints and print the report
    async fn extract(&self, names: &[String], overrides: RunOverrides) -> Result<()> {
        let mut pipeline = self.load_pipeline()?;
        if let Some(concurrency) = overrides.concurrency {
            pipeline.run.max_concurrency = concurrency.max(1);
        }
        if let Some(secs) = overrides.timeout_secs {
            pipeline.run.timeout_secs = Some(secs);
        }
        let endpoints = pipeline.select(names)?;

        let credential = if pipeline.auth.requires_credential() {
            let source = overrides
                .credential
                .unwrap_or_else(|| pipeline.credential.clone());
            let credential = source.resolve()?;
            info!(source = %source, "credential resolved");
            Some(credential)
        } else {
            None
        };

        let sink: Arc<dyn TableSink> = if overrides.dry_run {
            info!("dry run, loading into memory");
            Arc::new(MemorySink::new())
        } else {
            let sink = DuckDbSink::open(&self.cli.database).with_context(|| {
                format!("Cannot open database {}", self.cli.database.display())
            })?;
            info!(database = %sink.location(), "destination opened");
            Arc::new(sink)
        };

        let extractor = self.extractor(&pipeline, credential, sink)?;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, aborting running endpoints");
                trigger.cancel();
            }
        });

        let report = extractor.run(&pipeline.name, &endpoints, &cancel).await;
        self.print_report(&report)?;

        if report.has_failures() {
            return Err(Error::Other(format!(
                "{} of {} endpoints failed",
                report.failed(),
                report.endpoints.len()
            )));
        }
        Ok(())
    }

    fn extractor(
        &self,
        pipeline: &PipelineConfig,
        credential: Option<Credential>,
        sink: Arc<dyn TableSink>,
    ) -> Result<Extractor> {
        Extractor::for_pipeline(pipeline, credential, self.load_state()?, sink)
    }

    fn print_report(&self, report: &RunReport) -> Result<()> {
        match self.cli.format {
            OutputFormat::Json => println!("{}", report.to_json()?),
            OutputFormat::Table => println!("{}", report.render_table()),
        }
        Ok(())
    }

    /// Validate pipeline definition
    fn validate(&self) -> Result<()> {
        let pipeline = self.load_pipeline()?;
        let incremental = pipeline
            .endpoints
            .iter()
            .filter(|e| e.is_incremental())
            .count();

        match self.cli.format {
            OutputFormat::Json => self.print_json(&json!({
                "valid": true,
                "name": pipeline.name,
                "base_url": pipeline.base_url,
                "endpoints": pipeline.endpoints.len(),
                "incremental": incremental,
            })),
            OutputFormat::Table => {
                println!(
                    "Pipeline '{}' is valid: {} endpoints ({incremental} incremental)",
                    pipeline.name,
                    pipeline.endpoints.len()
                );
                Ok(())
            }
        }
    }

    /// List endpoints of the pipeline
    fn list_endpoints(&self) -> Result<()> {
        let pipeline = self.load_pipeline()?;

        let rows: Vec<_> = pipeline
            .endpoints
            .iter()
            .map(|endpoint| {
                let rule = pipeline.rule_for(endpoint);
                json!({
                    "name": endpoint.name,
                    "path": endpoint.path,
                    "kind": endpoint.kind.label(),
                    "write_disposition": endpoint.write_disposition.to_string(),
                    "primary_key": endpoint.primary_key,
                    "cursor_path": rule.as_ref().map(|r| r.cursor_path.clone()),
                    "start_param": rule.as_ref().map(|r| r.start_param.clone()),
                })
            })
            .collect();

        match self.cli.format {
            OutputFormat::Json => self.print_json(&json!(rows)),
            OutputFormat::Table => {
                let width = pipeline
                    .endpoints
                    .iter()
                    .map(|e| e.name.len())
                    .max()
                    .unwrap_or(0);
                for row in &rows {
                    let mut line = format!(
                        "{:<width$}  {:<14}  {:<20}",
                        row["name"].as_str().unwrap_or_default(),
                        row["path"].as_str().unwrap_or_default(),
                        row["kind"].as_str().unwrap_or_default(),
                    );
                    if let (Some(cursor), Some(param)) =
                        (row["cursor_path"].as_str(), row["start_param"].as_str())
                    {
                        line.push_str(&format!("  {cursor} -> {param}"));
                    }
                    println!("{}", line.trim_end());
                }
                Ok(())
            }
        }
    }

    /// Show saved state
    async fn show_state(&self, endpoint: Option<&str>) -> Result<()> {
        let state = self.load_state()?.snapshot().await;

        let entries: Vec<_> = match endpoint {
            Some(name) => {
                let entry = state
                    .get_endpoint(name)
                    .ok_or_else(|| Error::state(format!("No saved state for endpoint '{name}'")))?;
                vec![(name.to_string(), entry.clone())]
            }
            None => state.endpoints.into_iter().collect(),
        };

        match self.cli.format {
            OutputFormat::Json => {
                let map: serde_json::Map<_, _> = entries
                    .into_iter()
                    .map(|(name, entry)| -> Result<(String, serde_json::Value)> {
                        Ok((name, serde_json::to_value(entry)?))
                    })
                    .collect::<Result<_>>()?;
                self.print_json(&serde_json::Value::Object(map))
            }
            OutputFormat::Table => {
                if entries.is_empty() {
                    println!("No saved state in {}", self.state_location());
                }
                for (name, entry) in entries {
                    println!(
                        "{name}: watermark={} last_success={} rows={}",
                        entry.watermark.as_deref().unwrap_or("-"),
                        entry
                            .last_success_at
                            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
                        entry.rows_loaded
                    );
                }
                Ok(())
            }
        }
    }

    /// Reset saved state for one or all endpoints
    async fn reset_state(&self, endpoint: Option<&str>, all: bool) -> Result<()> {
        let state = self.load_state()?;

        if all {
            state.clear().await?;
            println!("Cleared all state in {}", self.state_location());
            return Ok(());
        }

        let name = endpoint.ok_or_else(|| Error::config("Endpoint name or --all is required"))?;
        if state.clear_endpoint(name).await? {
            println!("Cleared state for '{name}'");
        } else {
            println!("No saved state for '{name}'");
        }
        Ok(())
    }

    fn state_location(&self) -> String {
        if self.cli.no_state {
            "memory".to_string()
        } else {
            self.cli.state.display().to_string()
        }
    }

    fn print_json(&self, value: &serde_json::Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Command-line overrides for a run
#[derive(Debug, Default)]
struct RunOverrides {
    credential: Option<CredentialSource>,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
    dry_run: bool,
}
