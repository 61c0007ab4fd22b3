//! Test helpers para rawcache-server.

#![allow(dead_code, unused_imports)]

pub mod assertions;
pub mod client;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use rawcache_server::{AppState, CachePolicy, create_router};
use rawcache_storage::{MemoryStore, ObjectStore};

pub use assertions::*;
pub use client::{TestClient, TestResponse};
pub use upstream::{MockReply, MockUpstream};

/// Everything a proxy test needs to poke at.
pub struct Harness {
    pub client: TestClient,
    pub store: Arc<MemoryStore>,
    pub upstream: Arc<MockUpstream>,
}

/// Policy with the default TTLs and a short request deadline.
pub fn test_policy() -> CachePolicy {
    CachePolicy {
        request_timeout: Duration::from_secs(5),
        ..CachePolicy::default()
    }
}

/// Builds a router over a memory store and a scripted upstream.
pub fn harness(policy: CachePolicy) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let upstream = Arc::new(MockUpstream::new());
    let client = client_for(store.clone(), Arc::clone(&upstream), policy);

    Harness {
        client,
        store,
        upstream,
    }
}

/// Builds a client over the given collaborators.
pub fn client_for(
    store: Arc<dyn ObjectStore>,
    upstream: Arc<MockUpstream>,
    policy: CachePolicy,
) -> TestClient {
    let state = AppState::from_parts(store, upstream, policy);
    TestClient::new(create_router(state))
}

/// Crea un TestClient sobre un store vacio y un origen que no responde nada.
pub fn client() -> TestClient {
    harness(test_policy()).client
}
