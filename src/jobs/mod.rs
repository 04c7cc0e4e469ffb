// src/jobs/mod.rs
//! Background generation jobs.
//! Each job is an independent workflow instance; committed records are merged
//! into the shared portfolio store.

use crate::client::GenerationClient;
use crate::error::StartRejected;
use crate::media::MediaFetcher;
use crate::portfolio::PortfolioStore;
use crate::types::{Credential, RecordId};
use crate::workflow::{GenerationTask, GenerationWorkflow, WorkflowConfig, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for a background job
pub type JobId = String;

/// A running or finished generation job
struct Job {
    prompt: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: watch::Receiver<WorkflowStatus>,
    /// Set once the job has finished, including the portfolio merge
    final_status: Option<WorkflowStatus>,
    cancel: CancellationToken,
    runner: Option<JoinHandle<WorkflowStatus>>,
}

impl Job {
    /// A committed workflow is still saving until the portfolio merge has
    /// finished, so it only reports `Committed` once `final_status` is set.
    fn current_status(&self) -> WorkflowStatus {
        if let Some(status) = &self.final_status {
            return status.clone();
        }
        match &*self.status.borrow() {
            WorkflowStatus::Committed { .. } => WorkflowStatus::Resolving,
            live => live.clone(),
        }
    }
}

/// Serializable view of a job for listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub job_id: JobId,
    pub prompt: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Job manager starts workflows and tracks their state
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    client: Arc<dyn GenerationClient>,
    fetcher: Arc<dyn MediaFetcher>,
    credential: Option<Credential>,
    config: WorkflowConfig,
    store: Arc<PortfolioStore>,
}

impl JobManager {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        fetcher: Arc<dyn MediaFetcher>,
        credential: Option<Credential>,
        config: WorkflowConfig,
        store: Arc<PortfolioStore>,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            client,
            fetcher,
            credential,
            config,
            store,
        }
    }

    /// Start a new workflow in the background
    pub async fn spawn_generation(
        &self,
        prompt: &str,
        notes: Option<&str>,
    ) -> Result<JobId, StartRejected> {
        let workflow = Arc::new(GenerationWorkflow::new(
            self.client.clone(),
            self.fetcher.clone(),
            self.credential.clone(),
            self.config.clone(),
        ));
        let task = workflow.spawn(prompt, notes)?;
        let cancel = task.cancellation_token();
        let GenerationTask {
            status,
            committed,
            handle,
            ..
        } = task;

        let job_id: JobId = Uuid::new_v4().to_string();
        let store = self.store.clone();
        let jobs = self.jobs.clone();
        let runner_id = job_id.clone();

        // Hold the map lock until the job is registered so the runner cannot finish first.
        let mut guard = self.jobs.write().await;

        let runner = tokio::spawn(async move {
            let mut final_status = match handle.await {
                Ok(status) => status,
                Err(e) => WorkflowStatus::Failed {
                    message: format!("generation task aborted: {}", e),
                },
            };

            if let Ok(record) = committed.await {
                let record_id: RecordId = record.id.clone();
                if let Err(e) = store.add(record).await {
                    tracing::error!(record_id = %record_id, "Failed to save generation to portfolio: {}", e);
                    final_status = WorkflowStatus::Failed {
                        message: format!("Failed to save to portfolio: {}", e),
                    };
                }
            }

            let mut jobs = jobs.write().await;
            if let Some(job) = jobs.get_mut(&runner_id) {
                job.final_status = Some(final_status.clone());
                job.completed_at = Some(Utc::now());
            }
            tracing::info!("🏁 Job {} finished: {}", runner_id, final_status.label());
            final_status
        });

        guard.insert(
            job_id.clone(),
            Job {
                prompt: prompt.trim().to_string(),
                created_at: Utc::now(),
                completed_at: None,
                status,
                final_status: None,
                cancel,
                runner: Some(runner),
            },
        );
        tracing::info!("🎬 Created job: {}", job_id);
        Ok(job_id)
    }

    pub async fn job_status(&self, job_id: &str) -> Option<WorkflowStatus> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).map(|job| job.current_status())
    }

    /// Live status updates of the underlying workflow. Its `Committed` arrives
    /// before the portfolio merge; `wait` gives the job's final outcome.
    pub async fn subscribe(&self, job_id: &str) -> Option<watch::Receiver<WorkflowStatus>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id).map(|job| job.status.clone())
    }

    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<JobSummary> = jobs
            .iter()
            .map(|(id, job)| JobSummary {
                job_id: id.clone(),
                prompt: job.prompt.clone(),
                status: job.current_status(),
                created_at: job.created_at,
                completed_at: job.completed_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Jobs that have not reached a terminal state yet
    pub async fn active_jobs(&self) -> Vec<JobSummary> {
        self.list_jobs()
            .await
            .into_iter()
            .filter(|summary| !summary.status.is_terminal())
            .collect()
    }

    /// Request cancellation; returns `false` for unknown jobs
    pub async fn cancel(&self, job_id: &str) -> bool {
        let jobs = self.jobs.read().await;
        match jobs.get(job_id) {
            Some(job) => {
                job.cancel.cancel();
                tracing::info!("🛑 Cancellation requested for job: {}", job_id);
                true
            }
            None => false,
        }
    }

    /// Wait until the job has finished, including the portfolio merge
    pub async fn wait(&self, job_id: &str) -> Option<WorkflowStatus> {
        let runner = {
            let mut jobs = self.jobs.write().await;
            jobs.get_mut(job_id)?.runner.take()
        };

        match runner {
            Some(runner) => Some(runner.await.unwrap_or_else(|e| WorkflowStatus::Failed {
                message: format!("job runner aborted: {}", e),
            })),
            // Someone else is already waiting; report what is known.
            None => self.job_status(job_id).await,
        }
    }

    /// Drop finished jobs that completed more than `max_age_hours` ago
    pub async fn cleanup_old_jobs(&self, max_age_hours: i64) {
        let mut jobs = self.jobs.write().await;
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);

        jobs.retain(|job_id, job| {
            let expired = job.completed_at.map(|done| done < cutoff).unwrap_or(false);
            if expired {
                tracing::debug!("🗑️ Cleaned up old job: {}", job_id);
            }
            !expired
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::JobHandle;
    use crate::error::{GenerationError, PortfolioError};
    use crate::portfolio::{MemoryStorage, StorageBackend};
    use crate::types::{LocalReference, MediaLocator};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Finishes on the first poll unless the prompt asks to run forever
    struct FakeVeo;

    #[async_trait]
    impl GenerationClient for FakeVeo {
        async fn submit(&self, prompt: &str, _credential: &Credential) -> Result<JobHandle, GenerationError> {
            if prompt == "fail" {
                return Err(GenerationError::Transport("timeout".to_string()));
            }
            Ok(JobHandle::pending(format!("operations/{}", prompt)))
        }

        async fn poll(&self, handle: &JobHandle, _credential: &Credential) -> Result<JobHandle, GenerationError> {
            if handle.name.ends_with("forever") {
                return Ok(handle.clone());
            }
            Ok(JobHandle::completed(handle.name.clone(), "https://example.com/v.mp4"))
        }
    }

    struct FakeFetcher;

    #[async_trait]
    impl MediaFetcher for FakeFetcher {
        async fn materialize(
            &self,
            locator: &MediaLocator,
            _credential: &Credential,
        ) -> Result<LocalReference, GenerationError> {
            Ok(LocalReference::new(format!("local:{}", locator)))
        }
    }

    async fn manager() -> (JobManager, Arc<PortfolioStore>) {
        let store = Arc::new(PortfolioStore::open(Arc::new(MemoryStorage::new())).await);
        let manager = JobManager::new(
            Arc::new(FakeVeo),
            Arc::new(FakeFetcher),
            Credential::new("k"),
            WorkflowConfig {
                poll_interval: Duration::from_millis(1),
            },
            store.clone(),
        );
        (manager, store)
    }

    #[tokio::test]
    async fn test_successful_job_is_added_to_portfolio() {
        let (manager, store) = manager().await;
        let job_id = manager.spawn_generation("A rabbit in a forest", None).await.unwrap();

        let status = manager.wait(&job_id).await.unwrap();

        let portfolio = store.snapshot().await;
        assert_eq!(portfolio.len(), 3);
        assert_eq!(portfolio[0].prompt, "A rabbit in a forest");
        assert_eq!(portfolio[0].source_locator.as_str(), "local:https://example.com/v.mp4");
        assert_eq!(status, WorkflowStatus::Committed { record_id: portfolio[0].id.clone() });
        assert_eq!(manager.job_status(&job_id).await, Some(status));
        assert!(manager.active_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_job_leaves_portfolio_unchanged() {
        let (manager, store) = manager().await;
        let before = store.snapshot().await;
        let job_id = manager.spawn_generation("fail", None).await.unwrap();

        let status = manager.wait(&job_id).await.unwrap();

        assert!(matches!(status, WorkflowStatus::Failed { ref message } if message.contains("timeout")));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_cancelled_job() {
        let (manager, store) = manager().await;
        let job_id = manager.spawn_generation("forever", None).await.unwrap();
        assert_eq!(manager.active_jobs().await.len(), 1);

        assert!(manager.cancel(&job_id).await);
        assert_eq!(manager.wait(&job_id).await, Some(WorkflowStatus::Cancelled));
        assert_eq!(store.snapshot().await.len(), 2);
        assert!(!manager.cancel("unknown").await);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_all_commit() {
        let (manager, store) = manager().await;
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(manager.spawn_generation(&format!("clip {}", i), Some("batch")).await.unwrap());
        }
        for id in &ids {
            assert!(matches!(manager.wait(id).await, Some(WorkflowStatus::Committed { .. })));
        }

        let portfolio = store.snapshot().await;
        assert_eq!(portfolio.len(), 7);
        assert!(portfolio.iter().take(5).all(|r| r.notes == "batch"));
        assert_eq!(manager.list_jobs().await.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_prompt_creates_no_job() {
        let (manager, _) = manager().await;
        assert_eq!(manager.spawn_generation("  ", None).await, Err(StartRejected::EmptyPrompt));
        assert!(manager.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_jobs() {
        let (manager, _) = manager().await;
        let job_id = manager.spawn_generation("quick", None).await.unwrap();
        manager.wait(&job_id).await;

        manager.cleanup_old_jobs(1).await;
        assert_eq!(manager.list_jobs().await.len(), 1);
        manager.cleanup_old_jobs(-1).await;
        assert!(manager.list_jobs().await.is_empty());
    }

    /// Holds every write until released, then fails it
    #[derive(Default)]
    struct StalledDisk {
        writing: Notify,
        release: Notify,
    }

    #[async_trait]
    impl StorageBackend for StalledDisk {
        async fn read(&self, _key: &str) -> Result<Option<String>, PortfolioError> {
            Ok(None)
        }

        async fn write(&self, _key: &str, _value: &str) -> Result<(), PortfolioError> {
            self.writing.notify_one();
            self.release.notified().await;
            Err(PortfolioError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    #[tokio::test]
    async fn test_status_stays_pending_until_portfolio_merge_finishes() {
        let disk = Arc::new(StalledDisk::default());
        let store = Arc::new(PortfolioStore::open(disk.clone()).await);
        let manager = JobManager::new(
            Arc::new(FakeVeo),
            Arc::new(FakeFetcher),
            Credential::new("k"),
            WorkflowConfig {
                poll_interval: Duration::from_millis(1),
            },
            store.clone(),
        );
        let job_id = manager.spawn_generation("A rabbit in a forest", None).await.unwrap();

        disk.writing.notified().await;
        let workflow_status = manager.subscribe(&job_id).await.unwrap().borrow().clone();
        assert!(matches!(workflow_status, WorkflowStatus::Committed { .. }));
        assert_eq!(manager.job_status(&job_id).await, Some(WorkflowStatus::Resolving));
        assert_eq!(manager.active_jobs().await.len(), 1);

        disk.release.notify_one();
        let status = manager.wait(&job_id).await.unwrap();

        assert!(matches!(status, WorkflowStatus::Failed { ref message } if message.contains("disk full")));
        assert_eq!(manager.job_status(&job_id).await, Some(status));
        assert_eq!(store.snapshot().await.len(), 2);
    }
}
