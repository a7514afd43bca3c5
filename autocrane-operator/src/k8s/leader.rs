use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams, LeaseLockResult};
use owo_colors::OwoColorize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::collaborators::LeaderElection;
use crate::error::Error;
use crate::util::colors::{FG1, FG2};

/// Lease-based leader election, one replica wins at a time (§4.1, §6).
///
/// `start` spawns the renewal task and returns once it is running; the
/// caller polls `is_leader`/`is_completed` each iteration rather than
/// awaiting the task directly. `is_completed` only latches `true` when the
/// renewal loop ends for a reason *other* than the caller's own
/// cancellation — an expected shutdown must not trip the orchestrator's
/// "leader-election task completed unexpectedly" exit path (§6, exit `3`).
pub struct KubeLeaderElection {
    client: Client,
    namespace: String,
    holder_id: String,
    lease_ttl: Duration,
    is_leader: Arc<AtomicBool>,
    completed_unexpectedly: Arc<AtomicBool>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl KubeLeaderElection {
    pub fn new(client: Client, namespace: impl Into<String>, holder_id: impl Into<String>, lease_ttl: Duration) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            holder_id: holder_id.into(),
            lease_ttl,
            is_leader: Arc::new(AtomicBool::new(false)),
            completed_unexpectedly: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl LeaderElection for KubeLeaderElection {
    async fn start(&self, lease_name: &str, renew: Duration, cancel: CancellationToken) -> Result<(), Error> {
        let leadership = LeaseLock::new(
            self.client.clone(),
            &self.namespace,
            LeaseLockParams {
                holder_id: self.holder_id.clone(),
                lease_name: lease_name.to_string(),
                lease_ttl: self.lease_ttl,
            },
        );
        let is_leader = self.is_leader.clone();
        let completed_unexpectedly = self.completed_unexpectedly.clone();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(renew);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        is_leader.store(false, Ordering::SeqCst);
                        break;
                    }
                    _ = tick.tick() => {}
                }
                match leadership.try_acquire_or_renew().await {
                    Ok(LeaseLockResult::Acquired(_)) => {
                        if !is_leader.swap(true, Ordering::SeqCst) {
                            println!("{}", "acquired leadership".color(FG2));
                        }
                    }
                    Ok(_) => {
                        if is_leader.swap(false, Ordering::SeqCst) {
                            eprintln!("{}", "lost leadership".color(FG1));
                        }
                    }
                    Err(e) => {
                        eprintln!("{}", format!("leader election renew/acquire failed: {e}").color(FG1));
                        is_leader.store(false, Ordering::SeqCst);
                    }
                }
            }
        });

        // If the spawned task panics, that is unexpected completion from
        // the orchestrator's point of view.
        let completed_on_panic = self.completed_unexpectedly.clone();
        let mut task = self.task.lock().await;
        *task = Some(tokio::spawn(async move {
            if handle.await.is_err() {
                completed_on_panic.store(true, Ordering::SeqCst);
            }
        }));
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    fn is_completed(&self) -> bool {
        self.completed_unexpectedly.load(Ordering::SeqCst)
    }
}
