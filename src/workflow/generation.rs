// Generation workflow - submit → poll → resolve → materialize → commit
use super::state::WorkflowStatus;
use crate::client::{GenerationClient, JobHandle};
use crate::error::{GenerationError, StartRejected};
use crate::media::MediaFetcher;
use crate::types::{Credential, GenerationRecord, LocalReference};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay between two polls of a running job
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub poll_interval: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// One user-initiated generation attempt.
///
/// An instance accepts a single `start`. A failed or cancelled attempt is
/// never resumed; retrying means building a new workflow.
pub struct GenerationWorkflow {
    client: Arc<dyn GenerationClient>,
    fetcher: Arc<dyn MediaFetcher>,
    credential: Option<Credential>,
    config: WorkflowConfig,
    status: watch::Sender<WorkflowStatus>,
    history: Mutex<Vec<WorkflowStatus>>,
    started: AtomicBool,
    cancel: CancellationToken,
}

/// Handle to a workflow running on its own task
pub struct GenerationTask {
    /// Live status updates
    pub status: watch::Receiver<WorkflowStatus>,
    /// Resolves with the record once, only if the workflow commits
    pub committed: oneshot::Receiver<GenerationRecord>,
    /// Final status of the workflow
    pub handle: JoinHandle<WorkflowStatus>,
    cancel: CancellationToken,
}

impl GenerationTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// A validated, accepted start request
struct Accepted {
    prompt: String,
    notes: String,
}

impl GenerationWorkflow {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        fetcher: Arc<dyn MediaFetcher>,
        credential: Option<Credential>,
        config: WorkflowConfig,
    ) -> Self {
        let (status, _) = watch::channel(WorkflowStatus::Idle);
        Self {
            client,
            fetcher,
            credential,
            config,
            status,
            history: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one shared with a UI panel
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowStatus> {
        self.status.subscribe()
    }

    /// Statuses entered since `Idle`, in order. Repeated progress updates of
    /// the same state (one per poll) are folded into the latest one.
    pub fn history(&self) -> Vec<WorkflowStatus> {
        let history = self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        history.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the whole workflow on the current task.
    ///
    /// Rejections leave the workflow `Idle` (empty prompt) or untouched
    /// (already started). Otherwise the final status is returned and, on
    /// success, the record is sent through `commit`.
    pub async fn start(
        &self,
        prompt: &str,
        notes: Option<&str>,
        commit: oneshot::Sender<GenerationRecord>,
    ) -> Result<WorkflowStatus, StartRejected> {
        let accepted = self.accept(prompt, notes)?;
        Ok(self.drive(accepted, commit).await)
    }

    /// Validate the request and run the workflow on a spawned task
    pub fn spawn(
        self: Arc<Self>,
        prompt: &str,
        notes: Option<&str>,
    ) -> Result<GenerationTask, StartRejected> {
        let accepted = self.accept(prompt, notes)?;
        let (commit_tx, commit_rx) = oneshot::channel();
        let status = self.subscribe();
        let cancel = self.cancellation_token();

        let handle = tokio::spawn(async move { self.drive(accepted, commit_tx).await });

        Ok(GenerationTask {
            status,
            committed: commit_rx,
            handle,
            cancel,
        })
    }

    fn accept(&self, prompt: &str, notes: Option<&str>) -> Result<Accepted, StartRejected> {
        // A workflow that has left Idle rejects every start, whatever the prompt.
        if self.started.load(Ordering::SeqCst) {
            warn!("Rejected start: workflow is already {}", self.status().label());
            return Err(StartRejected::AlreadyStarted);
        }

        let prompt = prompt.trim();
        if prompt.is_empty() {
            debug!("Rejected start with empty prompt");
            return Err(StartRejected::EmptyPrompt);
        }

        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Rejected start: workflow is already {}", self.status().label());
            return Err(StartRejected::AlreadyStarted);
        }

        Ok(Accepted {
            prompt: prompt.to_string(),
            notes: notes.unwrap_or_default().to_string(),
        })
    }

    async fn drive(&self, accepted: Accepted, commit: oneshot::Sender<GenerationRecord>) -> WorkflowStatus {
        let final_status = match self.execute(&accepted).await {
            Ok(Some(record)) => {
                let record_id = record.id.clone();
                info!(record_id = %record_id, "✅ Generation committed");
                if commit.send(record).is_err() {
                    warn!(record_id = %record_id, "Commit receiver dropped, record was not delivered");
                }
                WorkflowStatus::Committed { record_id }
            }
            Ok(None) => {
                info!("🛑 Generation cancelled");
                WorkflowStatus::Cancelled
            }
            Err(e) => {
                error!(kind = e.kind(), "❌ Generation failed: {}", e);
                WorkflowStatus::Failed { message: e.to_string() }
            }
        };

        self.transition(final_status.clone());
        final_status
    }

    /// `Ok(None)` means the workflow was cancelled before it could commit.
    async fn execute(&self, accepted: &Accepted) -> Result<Option<GenerationRecord>, GenerationError> {
        self.transition(WorkflowStatus::Submitting);
        let credential = self.credential()?;

        let submitted = match self
            .unless_cancelled(self.client.submit(&accepted.prompt, credential))
            .await
        {
            Some(result) => result?,
            None => return Ok(None),
        };
        info!(job = %submitted.name, "🎬 Generation job submitted");

        let handle = match self.poll_until_done(submitted, credential).await? {
            Some(done) => done,
            None => return Ok(None),
        };

        self.transition(WorkflowStatus::Resolving);
        let locator = self.client.resolve_locator(&handle).ok_or_else(|| {
            GenerationError::EmptyResult(
                self.client
                    .failure_reason(&handle)
                    .unwrap_or_else(|| "the finished job returned no video".to_string()),
            )
        })?;

        let local: LocalReference = match self
            .unless_cancelled(self.fetcher.materialize(&locator, credential))
            .await
        {
            Some(result) => result?,
            None => return Ok(None),
        };

        // A late response must not commit once the caller has lost interest.
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        Ok(Some(GenerationRecord::commit(
            accepted.prompt.clone(),
            accepted.notes.clone(),
            local,
        )))
    }

    async fn poll_until_done(
        &self,
        mut handle: JobHandle,
        credential: &Credential,
    ) -> Result<Option<JobHandle>, GenerationError> {
        let started = Instant::now();
        let mut polls: u64 = 0;
        self.transition(WorkflowStatus::Polling {
            message: polling_message(polls, started.elapsed()),
        });

        while !self.client.is_done(&handle) {
            if self
                .unless_cancelled(tokio::time::sleep(self.config.poll_interval))
                .await
                .is_none()
            {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                return Ok(None);
            }

            let polled = self.unless_cancelled(self.client.poll(&handle, credential)).await;
            handle = match polled {
                Some(result) => result?,
                None => return Ok(None),
            };
            polls += 1;
            debug!(job = %handle.name, polls, done = handle.done, "Polled generation job");

            self.transition(WorkflowStatus::Polling {
                message: polling_message(polls, started.elapsed()),
            });
        }

        Ok(Some(handle))
    }

    fn credential(&self) -> Result<&Credential, GenerationError> {
        self.credential
            .as_ref()
            .ok_or_else(GenerationError::missing_credential)
    }

    /// Race `fut` against cancellation; `None` if cancellation won
    async fn unless_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }

    fn transition(&self, next: WorkflowStatus) {
        debug!("Workflow → {}", next.label());
        let mut history = self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match history.last_mut() {
            Some(last) if last.label() == next.label() => *last = next.clone(),
            _ => history.push(next.clone()),
        }
        drop(history);
        self.status.send_replace(next);
    }
}

fn polling_message(polls: u64, elapsed: Duration) -> String {
    format!(
        "Generating video... this can take a few minutes ({} checks, {}s elapsed)",
        polls,
        elapsed.as_secs()
    )
}
