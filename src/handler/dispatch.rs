use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use serde::Serialize;
use tokio::{
    sync::Semaphore,
    task::{self, JoinError, JoinSet},
};
use tracing::{error, info, warn};

use crate::{
    dao::SubscriptionStore,
    error::Error,
    model::Subscription,
    provider::{PushClient, SendError},
    types::NotificationPayload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryOutcome {
    Delivered,
    FailedTransient,
    FailedPermanent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub endpoint: String,
    pub outcome: DeliveryOutcome,
    pub reason: Option<String>,
    /// Set when a permanent failure led to the row being deleted.
    pub pruned: bool,
}

impl DeliveryResult {
    fn delivered(endpoint: String) -> Self {
        Self {
            endpoint,
            outcome: DeliveryOutcome::Delivered,
            reason: None,
            pruned: false,
        }
    }

    fn transient(endpoint: String, reason: String) -> Self {
        Self {
            endpoint,
            outcome: DeliveryOutcome::FailedTransient,
            reason: Some(reason),
            pruned: false,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DeliveryReport {
    pub total_attempted: usize,
    pub total_sent: usize,
    pub failures: Vec<DeliveryResult>,
}

impl DeliveryReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Fan-out of one notification to every subscriber.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<dyn SubscriptionStore>,
    client: Arc<dyn PushClient>,
    push_permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        client: Arc<dyn PushClient>,
        max_tasks: usize,
    ) -> Self {
        Self {
            store,
            client,
            push_permits: Arc::new(Semaphore::new(max_tasks.max(1))),
        }
    }

    /// Loads every stored subscription and dispatches to all of them.
    pub async fn notify_all(
        &self,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReport, Error> {
        let subscriptions = self.store.list_all().await?;
        self.dispatch(payload, subscriptions).await
    }

    /// Sends to each subscriber concurrently and waits for all of them.
    ///
    /// Only serialization can fail here; per-subscriber failures end up in
    /// the report.
    pub async fn dispatch(
        &self,
        payload: &NotificationPayload,
        subscriptions: Vec<Subscription>,
    ) -> Result<DeliveryReport, Error> {
        if subscriptions.is_empty() {
            info!("No subscribers to notify");
            return Ok(DeliveryReport::default());
        }

        let wire: Arc<str> = Arc::from(payload.to_wire()?);
        let total_attempted = subscriptions.len();
        let mut set = JoinSet::new();
        let mut endpoints: HashMap<task::Id, String> = HashMap::new();

        for subscription in subscriptions {
            let store = self.store.clone();
            let client = self.client.clone();
            let permits = self.push_permits.clone();
            let wire = wire.clone();
            let endpoint = subscription.endpoint.to_owned();
            let task_endpoint = endpoint.clone();

            let handle = set.spawn(async move {
                let delivery = AssertUnwindSafe(deliver(
                    store,
                    client,
                    permits,
                    subscription,
                    wire,
                ))
                .catch_unwind()
                .await;

                delivery.unwrap_or_else(|_| {
                    DeliveryResult::transient(
                        endpoint,
                        String::from("delivery task panicked"),
                    )
                })
            });
            endpoints.insert(handle.id(), task_endpoint);
        }

        let mut report = DeliveryReport {
            total_attempted,
            ..DeliveryReport::default()
        };

        while let Some(result) = set.join_next_with_id().await {
            match result {
                Ok((id, item)) => {
                    endpoints.remove(&id);
                    if item.outcome == DeliveryOutcome::Delivered {
                        report.total_sent += 1;
                    } else {
                        report.failures.push(item);
                    }
                },
                Err(e) => report.failures.push(lost_task(&mut endpoints, e)),
            }
        }

        info!(
            "Push dispatch finished: {}/{} sent, {} failed",
            report.total_sent,
            report.total_attempted,
            report.failed()
        );

        Ok(report)
    }
}

/// Result for a task that never handed back its own.
fn lost_task(
    endpoints: &mut HashMap<task::Id, String>,
    e: JoinError,
) -> DeliveryResult {
    error!("Push task did not finish: {}", e);
    let endpoint = endpoints.remove(&e.id()).unwrap_or_default();
    DeliveryResult::transient(endpoint, e.to_string())
}

async fn deliver(
    store: Arc<dyn SubscriptionStore>,
    client: Arc<dyn PushClient>,
    permits: Arc<Semaphore>,
    subscription: Subscription,
    wire: Arc<str>,
) -> DeliveryResult {
    let endpoint = subscription.endpoint.to_owned();

    // Acquire permit to limit concurrent push tasks
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return DeliveryResult::transient(endpoint, e.to_string()),
    };

    match client.send(&subscription, &wire).await {
        Ok(()) => DeliveryResult::delivered(endpoint),
        Err(e @ SendError::Gone(_)) => {
            info!("Pruning subscription {}: {}", &endpoint, e);
            let pruned = match store.delete_by_endpoint(&endpoint).await {
                Ok(()) => true,
                Err(prune_error) => {
                    error!(
                        "Failed to prune subscription {}: {}",
                        &endpoint, prune_error
                    );
                    false
                },
            };

            DeliveryResult {
                endpoint,
                outcome: DeliveryOutcome::FailedPermanent,
                reason: Some(e.to_string()),
                pruned,
            }
        },
        Err(e) => {
            warn!("Push notification to {} failed: {}", &endpoint, e);
            DeliveryResult::transient(endpoint, e.to_string())
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::Mutex,
        time::{Duration, Instant},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        dao::{MemoryStore, UnconfiguredStore},
        model::SubscriptionKeys,
    };

    #[derive(Debug, Clone)]
    enum Script {
        Deliver,
        Gone,
        Fail,
        SlowFail(Duration),
        Slow(Duration),
        Panic,
    }

    #[derive(Debug, Default)]
    struct ScriptedClient {
        scripts: HashMap<String, Script>,
        attempts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn with(scripts: &[(&str, Script)]) -> Arc<Self> {
            Arc::new(Self {
                scripts: scripts
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                attempts: Mutex::new(vec![]),
            })
        }

        fn attempts(&self) -> Vec<String> {
            let mut items = self.attempts.lock().unwrap().clone();
            items.sort();
            items
        }
    }

    #[async_trait]
    impl PushClient for ScriptedClient {
        async fn send(
            &self,
            subscription: &Subscription,
            payload: &str,
        ) -> Result<(), SendError> {
            assert!(payload.contains("\"title\""));
            self.attempts
                .lock()
                .unwrap()
                .push(subscription.endpoint.to_owned());

            match self
                .scripts
                .get(&subscription.endpoint)
                .cloned()
                .unwrap_or(Script::Deliver)
            {
                Script::Deliver => Ok(()),
                Script::Gone => Err(SendError::Gone(410)),
                Script::Fail => {
                    Err(SendError::Transient(String::from("HTTP 500")))
                },
                Script::SlowFail(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(SendError::Transient(String::from("timed out")))
                },
                Script::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                },
                Script::Panic => panic!("push service exploded"),
            }
        }
    }

    /// Counts deletes on top of the in-memory store.
    #[derive(Debug, Default)]
    struct RecordingStore {
        inner: MemoryStore,
        deleted: Mutex<Vec<String>>,
        fail_deletes: bool,
    }

    #[async_trait]
    impl SubscriptionStore for RecordingStore {
        async fn upsert(
            &self,
            endpoint: &str,
            keys: &SubscriptionKeys,
        ) -> Result<bool, Error> {
            self.inner.upsert(endpoint, keys).await
        }

        async fn list_all(&self) -> Result<Vec<Subscription>, Error> {
            self.inner.list_all().await
        }

        async fn count(&self) -> Result<i64, Error> {
            self.inner.count().await
        }

        async fn delete_by_endpoint(
            &self,
            endpoint: &str,
        ) -> Result<(), Error> {
            self.deleted.lock().unwrap().push(endpoint.to_owned());
            if self.fail_deletes {
                return Err(Error::StoreUnavailable(String::from("offline")));
            }
            self.inner.delete_by_endpoint(endpoint).await
        }

        async fn delete_by_id(&self, id: i64) -> Result<(), Error> {
            self.inner.delete_by_id(id).await
        }
    }

    fn endpoint(n: usize) -> String {
        format!("https://push.example/device-{}", n)
    }

    async fn seeded(count: usize, fail_deletes: bool) -> Arc<RecordingStore> {
        let store = RecordingStore {
            fail_deletes,
            ..RecordingStore::default()
        };
        for n in 0..count {
            store
                .upsert(&endpoint(n), &SubscriptionKeys::new("p256dh", "auth"))
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_zero_subscribers_never_contacts_client() {
        let store = seeded(0, false).await;
        let client = ScriptedClient::with(&[]);
        let dispatcher = Dispatcher::new(store, client.clone(), 8);

        let report = dispatcher
            .notify_all(&NotificationPayload::default())
            .await
            .unwrap();

        assert_eq!(report.total_sent, 0);
        assert_eq!(report.total_attempted, 0);
        assert!(client.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_failure_prunes_only_that_endpoint() {
        let store = seeded(4, false).await;
        let gone = endpoint(2);
        let client = ScriptedClient::with(&[(gone.as_str(), Script::Gone)]);
        let dispatcher = Dispatcher::new(store.clone(), client.clone(), 8);

        let report = dispatcher
            .notify_all(&NotificationPayload::default())
            .await
            .unwrap();

        assert_eq!(report.total_attempted, 4);
        assert_eq!(report.total_sent, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].endpoint, gone);
        assert_eq!(
            report.failures[0].outcome,
            DeliveryOutcome::FailedPermanent
        );
        assert!(report.failures[0].pruned);

        assert_eq!(*store.deleted.lock().unwrap(), vec![gone.clone()]);
        assert!(store.inner.get(&gone).await.is_none());
        for n in [0, 1, 3] {
            assert!(store.inner.get(&endpoint(n)).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_transient_failures_do_not_stop_other_sends() {
        let store = seeded(5, false).await;
        let client = ScriptedClient::with(&[
            (endpoint(0).as_str(), Script::Panic),
            (endpoint(1).as_str(), Script::SlowFail(Duration::from_millis(50))),
            (endpoint(2).as_str(), Script::Fail),
        ]);
        let dispatcher = Dispatcher::new(store.clone(), client.clone(), 8);

        let report = dispatcher
            .notify_all(&NotificationPayload::default())
            .await
            .unwrap();

        let mut expected: Vec<String> = (0..5).map(endpoint).collect();
        expected.sort();
        assert_eq!(client.attempts(), expected);

        assert_eq!(report.total_sent, 2);
        assert_eq!(report.failures.len(), 3);
        assert!(report
            .failures
            .iter()
            .all(|item| item.outcome == DeliveryOutcome::FailedTransient));

        assert!(store.deleted.lock().unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_prune_failure_is_not_escalated() {
        let store = seeded(2, true).await;
        let client =
            ScriptedClient::with(&[(endpoint(0).as_str(), Script::Gone)]);
        let dispatcher = Dispatcher::new(store.clone(), client, 8);

        let report = dispatcher
            .notify_all(&NotificationPayload::default())
            .await
            .unwrap();

        assert_eq!(report.total_sent, 1);
        assert_eq!(
            report.failures[0].outcome,
            DeliveryOutcome::FailedPermanent
        );
        assert!(!report.failures[0].pruned);
    }

    #[tokio::test]
    async fn test_sends_run_concurrently() {
        let store = seeded(5, false).await;
        let delay = Duration::from_millis(200);
        let scripts: Vec<(String, Script)> =
            (0..5).map(|n| (endpoint(n), Script::Slow(delay))).collect();
        let scripts: Vec<(&str, Script)> = scripts
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        let client = ScriptedClient::with(&scripts);
        let dispatcher = Dispatcher::new(store, client, 8);

        let started = Instant::now();
        let report = dispatcher
            .notify_all(&NotificationPayload::default())
            .await
            .unwrap();

        assert_eq!(report.total_sent, 5);
        assert!(started.elapsed() < delay * 4);
    }

    #[tokio::test]
    async fn test_unreadable_store_fails_dispatch() {
        let dispatcher = Dispatcher::new(
            Arc::new(UnconfiguredStore),
            ScriptedClient::with(&[]),
            8,
        );

        let result =
            dispatcher.notify_all(&NotificationPayload::default()).await;
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_lost_task_keeps_its_endpoint() {
        let mut set = JoinSet::new();
        let mut endpoints = HashMap::new();

        let handle = set.spawn(async {
            panic!("send blew up");
        });
        let lost = String::from("https://push.example/lost");
        endpoints.insert(handle.id(), lost);

        let err = set.join_next().await.unwrap().unwrap_err();
        let result = lost_task(&mut endpoints, err);

        assert_eq!(result.endpoint, "https://push.example/lost");
        assert_eq!(result.outcome, DeliveryOutcome::FailedTransient);
        assert!(endpoints.is_empty());
    }
}
