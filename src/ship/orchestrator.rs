use crate::config::{Clock, Config};
use crate::service::LogService;
use crate::ship::batch::{plan_batches, BatchLimits, OversizedEvent};
use crate::ship::identity::StreamIdentity;
use crate::ship::marker::mark_shipped;
use crate::ship::provisioner::{ProvisionError, StreamProvisioner};
use crate::ship::retry::RetryPolicy;
use crate::ship::submitter::{BatchSubmitter, SubmitError};
use crate::source::{discover_files, extract_events, DiscoveryError, ExtractError};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("file discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("'{}' cannot be batched: {source}", file.display())]
    EventTooLarge {
        file: PathBuf,
        #[source]
        source: OversizedEvent,
    },

    #[error("submitting '{}' failed: {source}", file.display())]
    Submit {
        file: PathBuf,
        #[source]
        source: SubmitError,
    },

    #[error("failed to mark '{}' as shipped: {source}", file.display())]
    Marker {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a run currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    StreamReady,
    Submitting { file: PathBuf, index: usize },
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::NotStarted => write!(f, "not started"),
            RunPhase::StreamReady => write!(f, "stream ready"),
            RunPhase::Submitting { file, index } => {
                write!(f, "submitting file {} ({})", index + 1, file.display())
            }
            RunPhase::Done => write!(f, "done"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Settings for one shipping pass.
#[derive(Debug, Clone)]
pub struct ShipOptions {
    pub group_name: String,
    pub stream_prefix: String,
    pub input_path: PathBuf,
    pub file_extension: String,
    pub clock: Clock,
    pub mark_shipped: bool,
    /// Extract and plan batches without calling the service.
    pub dry_run: bool,
    pub limits: BatchLimits,
}

impl From<&Config> for ShipOptions {
    fn from(config: &Config) -> Self {
        Self {
            group_name: config.group_name.clone(),
            stream_prefix: config.stream_prefix.clone(),
            input_path: config.input_path.clone(),
            file_extension: config.file_extension.clone(),
            clock: config.clock,
            mark_shipped: config.mark_shipped,
            dry_run: false,
            limits: BatchLimits::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stream: StreamIdentity,
    pub files_shipped: usize,
    pub files_skipped: usize,
    pub events_shipped: usize,
    pub batches: usize,
    pub dry_run: bool,
}

impl RunSummary {
    fn new(stream: StreamIdentity, dry_run: bool) -> Self {
        Self {
            stream,
            files_shipped: 0,
            files_skipped: 0,
            events_shipped: 0,
            batches: 0,
            dry_run,
        }
    }
}

/// Drives one shipping pass: provision, discover, then extract and submit
/// each file in order while carrying the sequence token across files.
pub struct ShippingOrchestrator {
    provisioner: StreamProvisioner,
    submitter: BatchSubmitter,
    options: ShipOptions,
    phase: RunPhase,
}

impl ShippingOrchestrator {
    pub fn new(service: Arc<dyn LogService>, options: ShipOptions) -> Self {
        Self {
            provisioner: StreamProvisioner::new(service.clone()),
            submitter: BatchSubmitter::new(service),
            options,
            phase: RunPhase::NotStarted,
        }
    }

    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.submitter = self.submitter.with_retry_policy(policy);
        self
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    pub fn options(&self) -> &ShipOptions {
        &self.options
    }

    /// Run one pass with the stream dated now.
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        self.run_at(Utc::now()).await
    }

    /// Run one pass with the stream dated at `now`.
    ///
    /// Any failure ends the run in [`RunPhase::Failed`]. Files submitted
    /// before the failure stay submitted.
    pub async fn run_at(&mut self, now: DateTime<Utc>) -> Result<RunSummary, RunError> {
        self.phase = RunPhase::NotStarted;

        match self.execute(now).await {
            Ok(summary) => {
                self.phase = RunPhase::Done;
                info!(
                    stream = %summary.stream,
                    files = summary.files_shipped,
                    skipped = summary.files_skipped,
                    events = summary.events_shipped,
                    batches = summary.batches,
                    dry_run = summary.dry_run,
                    "Shipping run complete"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(phase = %self.phase, error = %e, "Shipping run failed");
                self.phase = RunPhase::Failed;
                Err(e)
            }
        }
    }

    async fn execute(&mut self, now: DateTime<Utc>) -> Result<RunSummary, RunError> {
        let opts = self.options.clone();
        let identity = StreamIdentity::at(&opts.group_name, &opts.stream_prefix, opts.clock, now);
        info!(stream = %identity, input = %opts.input_path.display(), dry_run = opts.dry_run, "Starting shipping run");

        let mut summary = RunSummary::new(identity.clone(), opts.dry_run);

        if !opts.dry_run {
            self.provisioner.ensure_stream(&identity).await?;
        }
        self.phase = RunPhase::StreamReady;

        if !opts.input_path.is_dir() {
            warn!(path = %opts.input_path.display(), "Input path is not a directory");
        }

        let files = discover_files(&opts.input_path, &opts.file_extension)?;
        if files.is_empty() {
            info!(path = %opts.input_path.display(), extension = %opts.file_extension, "No input files found");
            return Ok(summary);
        }
        info!(files = files.len(), "Discovered input files");

        let mut token = None;
        for (index, file) in files.iter().enumerate() {
            self.phase = RunPhase::Submitting {
                file: file.clone(),
                index,
            };

            token = self.ship_file(&identity, file, token, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn ship_file(
        &self,
        identity: &StreamIdentity,
        file: &Path,
        mut token: Option<String>,
        summary: &mut RunSummary,
    ) -> Result<Option<String>, RunError> {
        let events = extract_events(file, self.options.clock)?;
        if events.is_empty() {
            warn!(file = %file.display(), "No events in file, skipping");
            summary.files_skipped += 1;
            return Ok(token);
        }

        let batches =
            plan_batches(&events, &self.options.limits).map_err(|source| RunError::EventTooLarge {
                file: file.to_path_buf(),
                source,
            })?;

        if self.options.dry_run {
            debug!(file = %file.display(), batches = batches.len(), "Dry run, not submitting");
        } else {
            for batch in &batches {
                token = self
                    .submitter
                    .submit(identity, batch, token)
                    .await
                    .map_err(|source| RunError::Submit {
                        file: file.to_path_buf(),
                        source,
                    })?;
            }

            if self.options.mark_shipped {
                mark_shipped(file).map_err(|source| RunError::Marker {
                    file: file.to_path_buf(),
                    source,
                })?;
            }
        }

        summary.files_shipped += 1;
        summary.events_shipped += events.len();
        summary.batches += batches.len();

        info!(
            file = %file.display(),
            events = events.len(),
            batches = batches.len(),
            "Shipped file"
        );

        Ok(token)
    }
}
