//! Execution engine module
//!
//! Runs endpoints against the API and loads them into a sink.
//!
//! # Overview
//!
//! - `Extractor` - owns the HTTP client, state and sink for a run
//! - `ExtractConfig` - concurrency and run timeout
//! - `RunPhase` - per-endpoint lifecycle
//!
//! Endpoints run concurrently, pages within an endpoint strictly in order.
//! Each page is written as soon as it arrives. The watermark is committed
//! only after the last page has been written; a failed, cancelled or
//! timed-out endpoint leaves the stored watermark untouched.

mod types;

pub use types::{EndpointRun, EndpointStats, ExtractConfig, RunPhase};

use crate::auth::{Authenticator, Credential};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::incremental::WatermarkTracker;
use crate::loader::{Endpoint, PipelineConfig};
use crate::pagination::{self, PageRequest, PageStream};
use crate::report::{EndpointReport, RunReport};
use crate::sink::TableSink;
use crate::state::StateManager;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extraction engine
pub struct Extractor {
    /// HTTP client shared by all endpoints
    client: Arc<HttpClient>,
    /// Watermark state
    state: StateManager,
    /// Destination
    sink: Arc<dyn TableSink>,
    /// Start parameter for incremental endpoints without their own
    default_start_param: String,
    /// Run configuration
    config: ExtractConfig,
}

impl Extractor {
    /// Create a new extractor
    pub fn new(client: HttpClient, state: StateManager, sink: Arc<dyn TableSink>) -> Self {
        Self {
            client: Arc::new(client),
            state,
            sink,
            default_start_param: "since".to_string(),
            config: ExtractConfig::default(),
        }
    }

    /// Build an extractor for a pipeline.
    ///
    /// The credential is resolved by the caller and handed in here; the
    /// engine never reads secrets on its own.
    pub fn for_pipeline(
        pipeline: &PipelineConfig,
        credential: Option<Credential>,
        state: StateManager,
        sink: Arc<dyn TableSink>,
    ) -> Result<Self> {
        let authenticator = Authenticator::new(pipeline.auth.clone(), credential)?;
        let client = HttpClient::with_auth(
            pipeline.http.client_config(&pipeline.base_url),
            authenticator,
        )?;

        let mut config = ExtractConfig::new().with_max_concurrency(pipeline.run.max_concurrency);
        if let Some(secs) = pipeline.run.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(Self::new(client, state, sink)
            .with_default_start_param(&pipeline.default_start_param)
            .with_config(config))
    }

    /// Set run configuration
    #[must_use]
    pub fn with_config(mut self, config: ExtractConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default start parameter
    #[must_use]
    pub fn with_default_start_param(mut self, param: impl Into<String>) -> Self {
        self.default_start_param = param.into();
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the run configuration
    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Run endpoints concurrently and report on each.
    ///
    /// One endpoint failing never stops the others. Reports come back in
    /// the order the endpoints were given.
    pub async fn run(
        &self,
        pipeline: &str,
        endpoints: &[Endpoint],
        cancel: &CancellationToken,
    ) -> RunReport {
        let started_at = chrono::Utc::now();
        let deadline = self.config.timeout.map(|t| Instant::now() + t);

        info!(
            pipeline,
            endpoints = endpoints.len(),
            max_concurrency = self.config.max_concurrency,
            "starting run"
        );

        let mut reports: Vec<(usize, EndpointReport)> = futures::stream::iter(endpoints.iter().enumerate())
            .map(|(index, endpoint)| async move {
                (index, self.run_until(endpoint, cancel, deadline).await)
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;
        reports.sort_by_key(|(index, _)| *index);

        let report = RunReport {
            pipeline: pipeline.to_string(),
            started_at,
            finished_at: chrono::Utc::now(),
            endpoints: reports.into_iter().map(|(_, r)| r).collect(),
        };

        info!(
            pipeline,
            completed = report.completed(),
            failed = report.failed(),
            rows = report.total_rows(),
            "run finished"
        );
        report
    }

    /// Run a single endpoint under the configured timeout
    pub async fn run_endpoint(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> EndpointReport {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        self.run_until(endpoint, cancel, deadline).await
    }

    async fn run_until(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> EndpointReport {
        let started = Instant::now();
        let mut run = EndpointRun::new(&endpoint.name);

        let result = {
            let work = self.extract(endpoint, &mut run);
            tokio::select! {
                result = work => result,
                () = cancel.cancelled() => Err(Error::Cancelled),
                () = sleep_until(deadline) => Err(Error::Timeout {
                    timeout_secs: self.config.timeout.map_or(0, |t| t.as_secs()),
                }),
            }
        };

        match result {
            Ok(()) => {
                info!(
                    endpoint = %endpoint.name,
                    rows = run.stats.rows_loaded,
                    pages = run.stats.pages,
                    dropped_stale = run.stats.dropped_stale,
                    watermark = ?run.watermark_after,
                    "endpoint completed"
                );
                run.into_report(None, started.elapsed())
            }
            Err(error) => {
                run.phase.fail();
                warn!(
                    endpoint = %endpoint.name,
                    kind = %error.kind(),
                    pages = run.stats.pages,
                    error = %error,
                    "endpoint failed, watermark left unchanged"
                );
                run.into_report(Some(&error), started.elapsed())
            }
        }
    }

    /// Fetch, filter and load every page of one endpoint, then commit.
    async fn extract(&self, endpoint: &Endpoint, run: &mut EndpointRun) -> Result<()> {
        let saved = self.state.watermark(&endpoint.name).await;
        run.watermark_before.clone_from(&saved);

        let rule = endpoint.kind.rule(&self.default_start_param);
        let mut tracker = rule
            .as_ref()
            .map(|rule| WatermarkTracker::new(rule, rule.starting_value(saved.as_deref())));

        let mut request = PageRequest::new(&endpoint.path);
        request.params.extend(endpoint.params.clone());
        if let (Some(rule), Some(tracker)) = (&rule, &tracker) {
            request = request.param(&rule.start_param, tracker.start());
        }

        let mut pages = PageStream::new(
            Arc::clone(&self.client),
            request,
            endpoint.selector.clone(),
            pagination::from_config(&endpoint.pagination),
        );

        self.sink
            .prepare(&endpoint.name, endpoint.write_disposition)
            .await?;

        run.phase.fetch(None);
        while let Some(page) = pages.next_page().await? {
            run.stats.pages += 1;
            run.stats.records_seen += page.records.len() as u64;

            let records = match tracker.as_mut() {
                Some(tracker) => {
                    let mut kept = Vec::with_capacity(page.records.len());
                    for record in page.records {
                        if tracker.observe(&record)?.is_loaded() {
                            kept.push(record);
                        }
                    }
                    kept
                }
                None => page.records,
            };

            let written = self
                .sink
                .upsert(
                    &endpoint.name,
                    &endpoint.primary_key,
                    endpoint.write_disposition,
                    &records,
                )
                .await?;
            run.stats.rows_loaded += written;
            if let Some(tracker) = &tracker {
                let stats = tracker.stats();
                run.stats.dropped_stale = stats.dropped_stale;
                run.stats.non_comparable = stats.non_comparable;
            }

            debug!(
                endpoint = %endpoint.name,
                page = page.number,
                written,
                next_token = ?page.next_token,
                "page loaded"
            );

            if page.next_token.is_some() {
                run.phase.fetch(page.next_token);
            }
        }

        run.watermark_after = match &tracker {
            Some(tracker) => Some(
                self.state
                    .commit_watermark(&endpoint.name, &tracker.finish(), run.stats.rows_loaded)
                    .await?,
            ),
            None => {
                self.state
                    .record_success(&endpoint.name, run.stats.rows_loaded)
                    .await?;
                None
            }
        };

        run.phase.complete();
        Ok(())
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("client", &self.client)
            .field("state", &self.state)
            .field("default_start_param", &self.default_start_param)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
