//! Top-level polling loop.
//!
//! Every `check_interval` the loop snapshots the monitored channels and runs
//! one [`ChannelMonitor`] check per channel. Checks run concurrently (bounded
//! by a semaphore) and are launched with a fixed stagger between them.

use std::sync::Arc;

use tokio::{
    sync::{watch, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Pacing,
    monitor::{ChannelMonitor, CheckOutcome},
    store::ConfigStore,
    utils::sleep_or_cancelled,
    Result,
};

/// Observable lifecycle of the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Checking,
    Waiting,
    Stopped,
}

/// Counts for one finished cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub launched: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub struct SchedulerLoop {
    store: Arc<dyn ConfigStore>,
    monitor: Arc<ChannelMonitor>,
    pacing: Pacing,
    state: watch::Sender<LoopState>,
}

impl SchedulerLoop {
    pub fn new(store: Arc<dyn ConfigStore>, monitor: Arc<ChannelMonitor>, pacing: Pacing) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            store,
            monitor,
            pacing,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    fn set_state(&self, next: LoopState) {
        self.state.send_replace(next);
    }

    /// Run cycles until `cancel` fires. Never returns an error.
    pub async fn run(&self, cancel: CancellationToken) {
        self.set_state(LoopState::Running);
        info!(
            interval_secs = self.pacing.check_interval.as_secs(),
            max_concurrent = self.pacing.max_concurrent_checks,
            "polling loop started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_state(LoopState::Checking);
            let pause = match self.run_cycle(&cancel).await {
                Ok(summary) => {
                    debug!(?summary, "cycle finished");
                    self.pacing.check_interval
                }
                Err(e) => {
                    error!("polling cycle failed: {e}");
                    self.pacing.cycle_error_backoff
                }
            };

            if cancel.is_cancelled() {
                break;
            }
            self.set_state(LoopState::Waiting);
            if sleep_or_cancelled(&cancel, pause).await {
                break;
            }
        }

        self.set_state(LoopState::Stopped);
        info!("polling loop stopped");
    }

    /// One pass over the current channel list.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleSummary> {
        let channels = self.store.list_channels()?;
        let mut summary = CycleSummary::default();
        if channels.is_empty() {
            debug!("no channels to check");
            return Ok(summary);
        }

        info!(channels = channels.len(), "checking channels");
        let permits = Arc::new(Semaphore::new(self.pacing.max_concurrent_checks.max(1)));
        let mut tasks = JoinSet::new();
        let total = channels.len();

        for (idx, channel) in channels.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
              _ = cancel.cancelled() => break,
              p = permits.clone().acquire_owned() => match p {
                Ok(p) => p,
                Err(_) => break,
              },
            };

            let monitor = self.monitor.clone();
            let cancel_task = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                monitor.check(&channel, &cancel_task).await
            });
            summary.launched += 1;

            if idx + 1 < total && sleep_or_cancelled(cancel, self.pacing.launch_stagger).await {
                info!(launched = summary.launched, total, "shutdown requested, no further checks launched");
                break;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(CheckOutcome::Completed { .. }) => summary.completed += 1,
                Ok(CheckOutcome::Skipped) => summary.skipped += 1,
                Ok(CheckOutcome::Failed) => summary.failed += 1,
                Ok(CheckOutcome::Cancelled) => summary.cancelled += 1,
                Err(e) => {
                    warn!("channel check task aborted: {e}");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatcher::{
            tests::{store_with_chats, video, FakeMessenger},
            Dispatcher,
        },
        domain::{ChatId, DestinationChat, MonitoredChannel},
        messaging::types::SendError,
        monitor::tests::FakeSource,
        Error,
    };
    use chrono::Utc;
    use std::{sync::Mutex, time::Duration};

    struct Harness {
        source: Arc<FakeSource>,
        messenger: Arc<FakeMessenger>,
        store: Arc<dyn ConfigStore>,
        monitor: Arc<ChannelMonitor>,
    }

    fn harness(name: &str, chats: &[i64], channels: &[&str], pacing: Pacing) -> Harness {
        let source = Arc::new(FakeSource::default());
        let messenger = Arc::new(FakeMessenger::default());
        let json = store_with_chats(name, chats);
        for id in channels {
            json.add_channel(MonitoredChannel::new("Chan", id).unwrap())
                .unwrap();
        }
        let store: Arc<dyn ConfigStore> = json;
        let dispatcher = Arc::new(Dispatcher::new(
            source.clone(),
            messenger.clone(),
            store.clone(),
            pacing,
        ));
        let monitor = Arc::new(ChannelMonitor::new(source.clone(), dispatcher, pacing));
        Harness {
            source,
            messenger,
            store,
            monitor,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_checks_every_channel() {
        let h = harness("s-all", &[1], &["UC1", "UC2", "UC3"], Pacing::default());
        let sched = SchedulerLoop::new(h.store.clone(), h.monitor.clone(), Pacing::default());

        let summary = sched.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.launched, 3);
        assert_eq!(summary.completed, 3);
        for id in ["UC1", "UC2", "UC3"] {
            assert!(h.monitor.last_checked(id).await.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let pacing = Pacing {
            launch_stagger: Duration::ZERO,
            max_concurrent_checks: 2,
            ..Pacing::default()
        };
        let channels = ["UC1", "UC2", "UC3", "UC4"];
        let h = harness("s-bound", &[1, 2, 3], &channels, pacing);
        for (n, id) in channels.iter().enumerate() {
            h.source
                .with_uploads(id, vec![video(&format!("v{n}"), Utc::now())]);
        }
        let sched = SchedulerLoop::new(h.store.clone(), h.monitor.clone(), pacing);

        // Each check dispatches to three chats: three 2s pauses = 6s.
        let started = tokio::time::Instant::now();
        let summary = sched.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.completed, 4);
        assert_eq!(started.elapsed(), Duration::from_secs(12));
        assert_eq!(h.messenger.sent().len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_launches_and_reaches_stopped() {
        let h = harness("s-cancel", &[1], &["UC1", "UC2", "UC3"], Pacing::default());
        let sched = Arc::new(SchedulerLoop::new(
            h.store.clone(),
            h.monitor.clone(),
            Pacing::default(),
        ));
        let mut rx = sched.subscribe();
        assert_eq!(*rx.borrow(), LoopState::Idle);

        let cancel = CancellationToken::new();
        let task = {
            let sched = sched.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { sched.run(cancel).await })
        };

        // First launch at t=0, second would follow the 2s stagger.
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(h.source.list_calls.lock().unwrap().len(), 1);
        assert_eq!(sched.state(), LoopState::Stopped);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_check_interval_between_cycles() {
        let h = harness("s-interval", &[1], &["UC1"], Pacing::default());
        let sched = Arc::new(SchedulerLoop::new(
            h.store.clone(),
            h.monitor.clone(),
            Pacing::default(),
        ));
        let cancel = CancellationToken::new();
        let task = {
            let sched = sched.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { sched.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sched.state(), LoopState::Waiting);
        assert_eq!(h.source.list_calls.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(h.source.list_calls.lock().unwrap().len(), 2);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(sched.state(), LoopState::Stopped);
    }

    /// Store whose channel listing always fails.
    #[derive(Default)]
    struct BrokenStore {
        calls: Mutex<usize>,
    }

    impl ConfigStore for BrokenStore {
        fn list_channels(&self) -> Result<Vec<MonitoredChannel>> {
            *self.calls.lock().unwrap() += 1;
            Err(Error::External("disk on fire".to_string()))
        }
        fn get_channel(&self, _channel_id: &str) -> Result<Option<MonitoredChannel>> {
            Ok(None)
        }
        fn add_channel(&self, _channel: MonitoredChannel) -> Result<bool> {
            Ok(false)
        }
        fn remove_channel(&self, _channel_id: &str) -> Result<bool> {
            Ok(false)
        }
        fn list_chats(&self) -> Result<Vec<DestinationChat>> {
            Ok(vec![])
        }
        fn add_chat(&self, _chat: DestinationChat) -> Result<bool> {
            Ok(false)
        }
        fn remove_chat(&self, _chat_id: ChatId) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_error_backs_off_and_keeps_running() {
        let h = harness("s-broken", &[1], &[], Pacing::default());
        let store = Arc::new(BrokenStore::default());
        let sched = Arc::new(SchedulerLoop::new(
            store.clone(),
            h.monitor.clone(),
            Pacing::default(),
        ));
        let cancel = CancellationToken::new();
        let task = {
            let sched = sched.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { sched.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(*store.calls.lock().unwrap(), 2);
        assert_eq!(sched.state(), LoopState::Waiting);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(sched.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_removes_gone_chat_and_advances_state() {
        let h = harness("s-e2e", &[1, 2, 3, 4], &["UC1"], Pacing::default());
        h.source.with_uploads("UC1", vec![video("fresh", Utc::now())]);
        h.messenger
            .fail_next(3, vec![SendError::DestinationGone("bot was kicked".into())]);
        let sched = SchedulerLoop::new(h.store.clone(), h.monitor.clone(), Pacing::default());

        let summary = sched.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.completed, 1);

        let sent = h.messenger.sent();
        let order: Vec<i64> = sent.iter().map(|s| s.0 .0).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        // Chat 4 opens the second batch; the gone chat before it adds no pause.
        assert_eq!(sent[3].2 - sent[2].2, Duration::from_secs(3));

        let remaining: Vec<i64> = h.store.list_chats().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![1, 2, 4]);
        assert!(h.monitor.last_checked("UC1").await.is_some());
    }
}
