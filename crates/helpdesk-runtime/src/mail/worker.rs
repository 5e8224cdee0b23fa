use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use uuid::Uuid;

use helpdesk_core::config::{MailConfig, WorkerConfig};

use super::mailer::Mailer;
use super::queue::{MailJob, MailQueue};

/// Exponential backoff between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            max: Duration::from_secs(60 * 60),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): base, 2x base, 4x base…
    /// capped at `max`.
    pub fn delay_for(&self, attempt: i32) -> Duration {
        let exponent = attempt.saturating_sub(1).clamp(0, 20) as u32;
        self.base
            .checked_mul(2u32.saturating_pow(exponent))
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Mail worker settings.
#[derive(Debug, Clone)]
pub struct MailWorkerConfig {
    /// Generated when not set.
    pub id: Option<Uuid>,
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// Upper bound on one delivery.
    pub delivery_timeout: Duration,
    pub stale_cleanup_interval: Duration,
    pub stale_threshold: chrono::Duration,
    pub retry: RetryPolicy,
}

impl Default for MailWorkerConfig {
    fn default() -> Self {
        Self {
            id: None,
            max_concurrent: 4,
            poll_interval: Duration::from_millis(1000),
            batch_size: 10,
            delivery_timeout: Duration::from_secs(30),
            stale_cleanup_interval: Duration::from_secs(60),
            stale_threshold: chrono::Duration::minutes(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl MailWorkerConfig {
    pub fn from_config(worker: &WorkerConfig, mail: &MailConfig) -> Self {
        Self {
            max_concurrent: worker.max_concurrent.max(1),
            poll_interval: Duration::from_millis(worker.poll_interval_ms),
            batch_size: worker.batch_size.max(1),
            delivery_timeout: Duration::from_secs(mail.timeout_secs),
            ..Default::default()
        }
    }
}

/// What happened to one claimed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Retrying,
    DeadLettered,
}

/// Delivers queued mail in the background.
pub struct MailWorker {
    id: Uuid,
    config: MailWorkerConfig,
    queue: Arc<dyn MailQueue>,
    mailer: Arc<dyn Mailer>,
}

impl MailWorker {
    pub fn new(
        config: MailWorkerConfig,
        queue: Arc<dyn MailQueue>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let id = config.id.unwrap_or_else(Uuid::new_v4);
        Self {
            id,
            config,
            queue,
            mailer,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Poll until a shutdown signal arrives. In-flight deliveries finish on
    /// their own tasks.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), WorkerError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));

        let cleanup_queue = self.queue.clone();
        let cleanup_interval = self.config.stale_cleanup_interval;
        let stale_threshold = self.config.stale_threshold;
        let cleanup = tokio::spawn(async move {
            loop {
                tokio::time::sleep(cleanup_interval).await;
                match cleanup_queue.release_stale(stale_threshold).await {
                    Ok(0) => {}
                    Ok(n) => tracing::warn!(released = n, "Released stale mail claims"),
                    Err(e) => tracing::error!("Failed to release stale mail claims: {}", e),
                }
            }
        });

        tracing::info!(worker_id = %self.id, "Mail worker started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(worker_id = %self.id, "Mail worker shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    let available = semaphore.available_permits();
                    if available == 0 {
                        continue;
                    }
                    let limit = (available as i64).min(self.config.batch_size);

                    let jobs = match self.queue.claim(self.id, limit).await {
                        Ok(jobs) => jobs,
                        Err(e) => {
                            tracing::error!("Failed to claim mail: {}", e);
                            continue;
                        }
                    };

                    for job in jobs {
                        let permit = semaphore
                            .clone()
                            .acquire_owned()
                            .await
                            .map_err(|e| WorkerError::Stopped(e.to_string()))?;
                        let queue = self.queue.clone();
                        let mailer = self.mailer.clone();
                        let timeout = self.config.delivery_timeout;
                        let retry = self.config.retry;

                        tokio::spawn(async move {
                            let job_id = job.id;
                            if let Err(e) =
                                deliver(queue.as_ref(), mailer.as_ref(), job, timeout, retry).await
                            {
                                tracing::error!(job_id = %job_id, "Failed to record delivery: {}", e);
                            }
                            drop(permit);
                        });
                    }
                }
            }
        }

        cleanup.abort();
        Ok(())
    }

    /// Claim one batch and deliver it inline. Returns the outcomes in claim
    /// order.
    pub async fn run_once(&self) -> Result<Vec<Delivery>, WorkerError> {
        let jobs = self
            .queue
            .claim(self.id, self.config.batch_size)
            .await
            .map_err(|e| WorkerError::Queue(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            outcomes.push(
                deliver(
                    self.queue.as_ref(),
                    self.mailer.as_ref(),
                    job,
                    self.config.delivery_timeout,
                    self.config.retry,
                )
                .await?,
            );
        }
        Ok(outcomes)
    }
}

/// Send one claimed message and record the outcome on the queue.
async fn deliver(
    queue: &dyn MailQueue,
    mailer: &dyn Mailer,
    job: MailJob,
    timeout: Duration,
    retry: RetryPolicy,
) -> Result<Delivery, WorkerError> {
    tracing::debug!(job_id = %job.id, attempt = job.attempts, "Delivering mail");

    let error = match tokio::time::timeout(timeout, mailer.send(&job.mail)).await {
        Ok(Ok(())) => {
            queue
                .complete(job.id)
                .await
                .map_err(|e| WorkerError::Queue(e.to_string()))?;
            tracing::info!(job_id = %job.id, to = %job.mail.to.email, "Mail sent");
            return Ok(Delivery::Sent);
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("Delivery timed out after {}s", timeout.as_secs()),
    };

    let (delay, outcome) = if job.can_retry() {
        let delay = chrono::Duration::from_std(retry.delay_for(job.attempts))
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        (Some(delay), Delivery::Retrying)
    } else {
        (None, Delivery::DeadLettered)
    };

    queue
        .fail(job.id, &error, delay)
        .await
        .map_err(|e| WorkerError::Queue(e.to_string()))?;

    match outcome {
        Delivery::Retrying => tracing::warn!(
            job_id = %job.id,
            attempt = job.attempts,
            error = %error,
            "Mail delivery failed, will retry"
        ),
        _ => tracing::error!(
            job_id = %job.id,
            attempts = job.attempts,
            error = %error,
            "Mail delivery failed permanently"
        ),
    }
    Ok(outcome)
}

/// Worker errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Worker stopped: {0}")]
    Stopped(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use helpdesk_core::error::{HelpdeskError, Result};
    use helpdesk_core::notification::{OutboundMail, Recipient};

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Completed(Uuid),
        Failed(Uuid, Option<chrono::Duration>),
    }

    #[derive(Default)]
    struct FakeQueue {
        pending: Mutex<Vec<MailJob>>,
        recorded: Mutex<Vec<Recorded>>,
    }

    impl FakeQueue {
        fn with(jobs: Vec<MailJob>) -> Self {
            Self {
                pending: Mutex::new(jobs),
                recorded: Mutex::default(),
            }
        }

        fn recorded(&self) -> Vec<Recorded> {
            self.recorded.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailQueue for FakeQueue {
        async fn claim(&self, _worker_id: Uuid, limit: i64) -> Result<Vec<MailJob>> {
            let mut pending = self.pending.lock().unwrap();
            let take = (limit.max(0) as usize).min(pending.len());
            Ok(pending
                .drain(..take)
                .map(|mut job| {
                    job.attempts += 1;
                    job
                })
                .collect())
        }

        async fn complete(&self, job_id: Uuid) -> Result<()> {
            self.recorded
                .lock()
                .unwrap()
                .push(Recorded::Completed(job_id));
            Ok(())
        }

        async fn fail(
            &self,
            job_id: Uuid,
            _error: &str,
            retry_delay: Option<chrono::Duration>,
        ) -> Result<()> {
            self.recorded
                .lock()
                .unwrap()
                .push(Recorded::Failed(job_id, retry_delay));
            Ok(())
        }

        async fn release_stale(&self, _stale_threshold: chrono::Duration) -> Result<u64> {
            Ok(0)
        }
    }

    enum Behaviour {
        Accept,
        Reject,
        Hang,
    }

    struct FakeMailer(Behaviour);

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, _mail: &OutboundMail) -> Result<()> {
            match self.0 {
                Behaviour::Accept => Ok(()),
                Behaviour::Reject => Err(HelpdeskError::Mail("550 mailbox unavailable".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    fn job(attempts: i32, max_attempts: i32) -> MailJob {
        let mut job = MailJob::new(
            OutboundMail {
                to: Recipient {
                    user_id: 1,
                    name: "Ann".into(),
                    email: "ann@example.com".into(),
                },
                subject: "New Reply in Ticket: VPN".into(),
                body: "Hello, Ann!".into(),
            },
            max_attempts,
        );
        job.attempts = attempts;
        job
    }

    fn worker(queue: Arc<FakeQueue>, behaviour: Behaviour) -> MailWorker {
        let config = MailWorkerConfig {
            delivery_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        MailWorker::new(config, queue, Arc::new(FakeMailer(behaviour)))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryPolicy {
            base: Duration::from_secs(10),
            max: Duration::from_secs(60),
        };
        assert_eq!(retry.delay_for(1), Duration::from_secs(10));
        assert_eq!(retry.delay_for(2), Duration::from_secs(20));
        assert_eq!(retry.delay_for(3), Duration::from_secs(40));
        assert_eq!(retry.delay_for(4), Duration::from_secs(60));
        assert_eq!(retry.delay_for(500), Duration::from_secs(60));
        assert_eq!(retry.delay_for(0), Duration::from_secs(10));
    }

    #[test]
    fn test_config_from_settings() {
        let worker = WorkerConfig {
            poll_interval_ms: 250,
            batch_size: 0,
            max_attempts: 3,
            max_concurrent: 2,
        };
        let mail = MailConfig {
            timeout_secs: 7,
            ..Default::default()
        };
        let config = MailWorkerConfig::from_config(&worker, &mail);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.delivery_timeout, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_successful_delivery_completes() {
        let pending = job(0, 3);
        let id = pending.id;
        let queue = Arc::new(FakeQueue::with(vec![pending]));

        let outcomes = worker(queue.clone(), Behaviour::Accept)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcomes, vec![Delivery::Sent]);
        assert_eq!(queue.recorded(), vec![Recorded::Completed(id)]);
    }

    #[tokio::test]
    async fn test_failure_with_budget_left_is_rescheduled() {
        let pending = job(0, 3);
        let id = pending.id;
        let queue = Arc::new(FakeQueue::with(vec![pending]));

        let outcomes = worker(queue.clone(), Behaviour::Reject)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcomes, vec![Delivery::Retrying]);
        assert_eq!(
            queue.recorded(),
            vec![Recorded::Failed(id, Some(chrono::Duration::seconds(30)))]
        );
    }

    #[tokio::test]
    async fn test_last_attempt_dead_letters() {
        let pending = job(2, 3);
        let id = pending.id;
        let queue = Arc::new(FakeQueue::with(vec![pending]));

        let outcomes = worker(queue.clone(), Behaviour::Reject)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcomes, vec![Delivery::DeadLettered]);
        assert_eq!(queue.recorded(), vec![Recorded::Failed(id, None)]);
    }

    #[tokio::test]
    async fn test_hung_delivery_times_out() {
        let queue = Arc::new(FakeQueue::with(vec![job(0, 3)]));

        let outcomes = worker(queue.clone(), Behaviour::Hang)
            .run_once()
            .await
            .unwrap();

        assert_eq!(outcomes, vec![Delivery::Retrying]);
    }

    #[tokio::test]
    async fn test_run_delivers_and_stops_on_shutdown() {
        let queue = Arc::new(FakeQueue::with(vec![job(0, 3), job(0, 3)]));
        let config = MailWorkerConfig {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let worker = MailWorker::new(config, queue.clone(), Arc::new(FakeMailer(Behaviour::Accept)));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(rx));

        for _ in 0..100 {
            if queue.recorded().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(queue.recorded().len(), 2);
    }
}
