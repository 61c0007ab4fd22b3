//! Per-key call coalescing.
//!
//! [`SingleFlight`] guarantees that, for any key, at most one execution of a
//! piece of async work is in progress. Callers arriving while it runs wait
//! for it and receive a clone of its result instead of running the work
//! again. Once the work finishes the key is released and the next call
//! starts a fresh execution.
//!
//! The work runs on its own tokio task. Dropping a waiting caller (client
//! disconnect, request deadline) never cancels the execution other callers
//! depend on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Errors reported to callers of [`SingleFlight::run`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlightError {
    /// The work ended without producing a value (it panicked).
    #[error("in-flight work for '{key}' was abandoned")]
    Abandoned { key: String },
}

/// Value published by a finished execution: the result plus whether any
/// other caller was still waiting for it.
type Published<T> = Option<(T, bool)>;

type Calls<T> = Arc<Mutex<HashMap<String, watch::Receiver<Published<T>>>>>;

/// Coalesces concurrent executions by key.
///
/// # Examples
///
/// ```
/// use rawcache_server::singleflight::SingleFlight;
///
/// # #[tokio::main]
/// # async fn main() {
/// let flights = SingleFlight::<u32>::new();
/// let (value, shared) = flights.run("k", || async { 42 }).await.unwrap();
/// assert_eq!(value, 42);
/// assert!(!shared);
/// # }
/// ```
pub struct SingleFlight<T> {
    calls: Calls<T>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs `work` for `key`, or joins the execution already in progress.
    ///
    /// Returns the result and a flag that is true when the result was (or
    /// may have been) handed to more than one caller.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<(T, bool), FlightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (mut rx, sender) = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(rx) => (rx.clone(), None),
                None => {
                    let (tx, rx) = watch::channel(None);
                    calls.insert(key.to_string(), rx.clone());
                    (rx, Some(tx))
                },
            }
        };

        // `work` corre sin el lock tomado: si entra en panic, `Release`
        // vuelve a tomarlo al liberar la key.
        let leader = match sender {
            Some(tx) => {
                let release = Release {
                    calls: Arc::clone(&self.calls),
                    key: key.to_string(),
                };
                let fut = work();
                tokio::spawn(async move {
                    let value = fut.await;
                    // Liberar la key antes de publicar: una llamada
                    // posterior arranca una ejecucion nueva.
                    drop(release);
                    let shared = tx.receiver_count() > 1;
                    let _ = tx.send(Some((value, shared)));
                });
                true
            },
            None => {
                debug!(%key, "joining in-flight call");
                false
            },
        };

        let published = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| {
                warn!(%key, "in-flight call abandoned");
                FlightError::Abandoned {
                    key: key.to_string(),
                }
            })?
            .clone();

        match published {
            Some((value, shared)) => Ok((value, shared || !leader)),
            None => Err(FlightError::Abandoned {
                key: key.to_string(),
            }),
        }
    }

    /// Returns the number of keys with an execution in progress.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the key from the in-flight map when the execution ends, whether
/// it returned or unwound.
struct Release<T> {
    calls: Calls<T>,
    key: String,
}

impl<T> Drop for Release<T> {
    fn drop(&mut self) {
        self.calls.lock().remove(&self.key);
    }
}
