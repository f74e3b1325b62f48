//! Per-descriptor fetch tasks: timeout, retry with backoff, placeholder
//! fallback, and an in-flight registry that makes launches idempotent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use catalog::Descriptor;
use formats::{FeatureRecord, parse_body, placeholder_features};
use foundation::DescriptorId;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchFailure};
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Progress reported by a fetch task. Messages from one task arrive in the
/// order they were sent.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMessage {
    pub descriptor_id: DescriptorId,
    /// Launch generation; stale generations must be ignored by the receiver.
    pub generation: u64,
    pub update: FetchUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchUpdate {
    Retrying {
        retry_count: u32,
        message: String,
    },
    Loaded {
        features: Vec<FeatureRecord>,
    },
    /// Terminal failure. `features` is the placeholder set to show instead.
    Failed {
        message: String,
        features: Vec<FeatureRecord>,
    },
}

impl FetchUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FetchUpdate::Retrying { .. })
    }
}

/// One timed attempt: request, status check, parse.
pub async fn fetch_once(
    transport: &dyn Transport,
    descriptor: &Descriptor,
    timeout: Duration,
) -> Result<Vec<FeatureRecord>, FetchError> {
    let resp = match tokio::time::timeout(timeout, transport.get(descriptor.endpoint.clone())).await
    {
        Ok(resp) => resp?,
        Err(_) => return Err(FetchError::timeout(timeout)),
    };
    if !resp.is_success() {
        return Err(FetchError::http_status(resp.status));
    }
    Ok(parse_body(&resp.body, descriptor)?)
}

/// Runs attempts until one succeeds, a non-retryable error occurs, or the
/// policy is exhausted. `on_retry` is called once per scheduled retry, before
/// its backoff sleep.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    descriptor: &Descriptor,
    policy: &RetryPolicy,
    timeout: Duration,
    mut on_retry: impl FnMut(u32, String),
) -> Result<Vec<FeatureRecord>, FetchFailure> {
    let mut retries = 0;
    loop {
        match fetch_once(transport, descriptor, timeout).await {
            Ok(features) => return Ok(features),
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay_for(retries);
                warn!(
                    descriptor = %descriptor.id,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "fetch failed: {e}"
                );
                on_retry(
                    retries,
                    format!("{e}; retrying ({retries}/{})", policy.max_retries),
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(FetchFailure {
                    last: e,
                    attempts: retries + 1,
                });
            }
        }
    }
}

struct InFlight {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Launches and cancels fetch tasks, at most one per descriptor.
///
/// Tasks report through the channel given at construction. The registry entry
/// stays until the receiver calls [`FetchPipeline::finish`] for the terminal
/// message, so a second launch in between is a no-op.
pub struct FetchPipeline {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    timeout_override: Option<Duration>,
    tx: UnboundedSender<FetchMessage>,
    in_flight: BTreeMap<DescriptorId, InFlight>,
    next_generation: u64,
}

impl FetchPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        tx: UnboundedSender<FetchMessage>,
    ) -> Self {
        Self {
            transport,
            policy,
            timeout_override: None,
            tx,
            in_flight: BTreeMap::new(),
            next_generation: 1,
        }
    }

    /// Uses one timeout for every descriptor instead of the per-kind default.
    pub fn with_timeout_override(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_override = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_in_flight(&self, id: &DescriptorId) -> bool {
        self.in_flight.contains_key(id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_current(&self, id: &DescriptorId, generation: u64) -> bool {
        self.in_flight
            .get(id)
            .is_some_and(|f| f.generation == generation)
    }

    /// Starts a fetch for `descriptor`.
    ///
    /// Returns the new generation, or `None` if one is already outstanding.
    pub fn launch(&mut self, descriptor: &Descriptor) -> Option<u64> {
        if self.in_flight.contains_key(&descriptor.id) {
            debug!(descriptor = %descriptor.id, "fetch already in flight");
            return None;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let transport = Arc::clone(&self.transport);
        let policy = self.policy;
        let timeout = self.timeout_override.unwrap_or(descriptor.timeout);
        let tx = self.tx.clone();
        let descriptor = descriptor.clone();
        let id = descriptor.id.clone();

        info!(descriptor = %id, generation, url = %descriptor.endpoint, "fetch launched");
        let handle = tokio::spawn(async move {
            let send = |update| {
                let _ = tx.send(FetchMessage {
                    descriptor_id: descriptor.id.clone(),
                    generation,
                    update,
                });
            };

            let result = fetch_with_retry(
                transport.as_ref(),
                &descriptor,
                &policy,
                timeout,
                |retry_count, message| send(FetchUpdate::Retrying {
                    retry_count,
                    message,
                }),
            )
            .await;

            let update = match result {
                Ok(features) => {
                    info!(descriptor = %descriptor.id, features = features.len(), "fetch loaded");
                    FetchUpdate::Loaded { features }
                }
                Err(failure) => {
                    warn!(descriptor = %descriptor.id, "fetch failed for good: {failure}");
                    FetchUpdate::Failed {
                        message: failure.to_string(),
                        features: placeholder_features(&descriptor),
                    }
                }
            };
            send(update);
        });

        self.in_flight.insert(id, InFlight { generation, handle });
        Some(generation)
    }

    /// Aborts the outstanding fetch for `id`, including any backoff sleep.
    ///
    /// Returns `true` if a fetch was cancelled.
    pub fn cancel(&mut self, id: &DescriptorId) -> bool {
        let Some(flight) = self.in_flight.remove(id) else {
            return false;
        };
        flight.handle.abort();
        info!(descriptor = %id, generation = flight.generation, "fetch cancelled");
        true
    }

    pub fn cancel_all(&mut self) {
        let ids: Vec<_> = self.in_flight.keys().cloned().collect();
        for id in ids {
            self.cancel(&id);
        }
    }

    /// Releases the registry entry once the terminal message for
    /// `generation` has been received. Stale generations are ignored.
    pub fn finish(&mut self, id: &DescriptorId, generation: u64) -> bool {
        if !self.is_current(id, generation) {
            return false;
        }
        self.in_flight.remove(id);
        true
    }
}

impl Drop for FetchPipeline {
    fn drop(&mut self) {
        for flight in self.in_flight.values() {
            flight.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use catalog::{Descriptor, LayerKind};
    use formats::PLACEHOLDER_FEATURE_COUNT;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::{FetchMessage, FetchPipeline, FetchUpdate, fetch_with_retry};
    use crate::retry::RetryPolicy;
    use crate::transport::ScriptedTransport;

    const URL: &str = "http://test/parcels?district=7";

    fn parcels() -> Descriptor {
        Descriptor::new("district-7", LayerKind::Parcels, URL)
    }

    fn two_parcels() -> Vec<u8> {
        json!({"parcels": [
            {"id": 1, "geom": {"type": "Point", "coordinates": [32.8, 39.9]}},
            {"id": 2, "geom": {"type": "Point", "coordinates": [32.9, 39.9]}}
        ]})
        .to_string()
        .into_bytes()
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<FetchMessage>) -> Vec<FetchUpdate> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv().await {
            let done = msg.update.is_terminal();
            out.push(msg.update);
            if done {
                break;
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_three_server_errors() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(URL, 500, "oops")
            .respond(URL, 500, "oops")
            .respond(URL, 500, "oops")
            .respond(URL, 200, two_parcels());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut p = FetchPipeline::new(t.clone(), RetryPolicy::default(), tx);
        let start = Instant::now();
        let generation = p.launch(&parcels()).expect("launch");

        let updates = drain(&mut rx).await;
        assert_eq!(updates.len(), 4);
        for (i, u) in updates[..3].iter().enumerate() {
            let FetchUpdate::Retrying {
                retry_count,
                message,
            } = u
            else {
                panic!("expected retry, got {u:?}");
            };
            assert_eq!(*retry_count, i as u32 + 1);
            assert!(message.starts_with("server error (HTTP 500); retrying"));
        }
        let FetchUpdate::Loaded { features } = &updates[3] else {
            panic!("expected loaded");
        };
        assert_eq!(features.len(), 2);
        assert_eq!(t.call_count(URL), 4);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(1 + 2 + 4) && waited < Duration::from_secs(8));

        assert!(p.finish(&parcels().id, generation));
        assert!(!p.is_in_flight(&parcels().id));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_key_ends_with_placeholders() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(URL, 200, r#"{"data": []}"#);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut p = FetchPipeline::new(t.clone(), RetryPolicy::default(), tx);
        p.launch(&parcels()).expect("launch");

        let updates = drain(&mut rx).await;
        let Some(FetchUpdate::Failed { message, features }) = updates.last() else {
            panic!("expected failure");
        };
        assert!(message.starts_with("invalid shape"));
        assert!(message.ends_with("exhausted after 4 attempts"));
        assert_eq!(features.len(), PLACEHOLDER_FEATURE_COUNT);
        assert!(features.iter().all(|f| f.is_placeholder()));
        assert_eq!(t.call_count(URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let t = ScriptedTransport::new();
        t.respond(URL, 404, "missing");
        let err = fetch_with_retry(
            &t,
            &parcels(),
            &RetryPolicy::default(),
            Duration::from_secs(15),
            |_, _| panic!("no retry expected"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.to_string(), "request rejected (HTTP 404)");
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_source_times_out_per_attempt() {
        let t = ScriptedTransport::new();
        t.hang(URL);
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let start = Instant::now();
        let mut retries = Vec::new();
        let err = fetch_with_retry(&t, &parcels(), &policy, Duration::from_secs(15), |n, _| {
            retries.push(n)
        })
        .await
        .unwrap_err();
        assert_eq!(retries, [1]);
        assert_eq!(err.attempts, 2);
        assert!(err.to_string().starts_with("timeout"));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(15 + 1 + 15) && waited < Duration::from_secs(32));
    }

    #[tokio::test(start_paused = true)]
    async fn second_launch_is_a_noop_and_cancel_silences_the_task() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond_after(URL, Duration::from_secs(5), 200, two_parcels());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut p = FetchPipeline::new(t.clone(), RetryPolicy::default(), tx);
        let d = parcels();
        assert!(p.launch(&d).is_some());
        assert!(p.launch(&d).is_none());
        assert_eq!(p.in_flight_count(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(p.cancel(&d.id));
        assert!(!p.cancel(&d.id));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(t.call_count(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn relaunch_gets_a_new_generation() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(URL, 200, two_parcels());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut p = FetchPipeline::new(t, RetryPolicy::default(), tx);
        let d = parcels();

        let first = p.launch(&d).expect("launch");
        p.cancel(&d.id);
        let second = p.launch(&d).expect("relaunch");
        assert!(second > first);
        assert!(!p.is_current(&d.id, first));

        let msg = rx.recv().await.expect("message");
        assert_eq!(msg.generation, second);
        assert!(!p.finish(&d.id, first));
        assert!(p.finish(&d.id, second));
    }
}
