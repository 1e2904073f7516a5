//! Common test helpers for the Spacebrew crates
//!
//! - Condition-based waiting (no hardcoded sleeps)
//! - An in-memory [`Transport`] that records what was published
//! - Route files in throwaway directories
//! - Port allocation for servers under test

use bytes::Bytes;
use parking_lot::Mutex;
use spacebrew_router::{Router, RouterConfig, RouterError, Transport};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Wait until `transport` has recorded at least `n` publishes
pub async fn wait_for_publishes(transport: &RecordingTransport, n: usize, max_wait: Duration) -> bool {
    wait_for(
        || async { transport.count() >= n },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

// ============================================================================
// Recording Transport
// ============================================================================

/// One publish seen by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Bytes,
}

impl Published {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Transport that keeps every publish in memory.
///
/// Starts connected; [`set_connected(false)`](Self::set_connected) makes
/// every publish fail with a transport error.
#[derive(Debug)]
pub struct RecordingTransport {
    published: Mutex<Vec<Published>>,
    connected: AtomicBool,
    endpoint: String,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            endpoint: "test-broker:1883".to_string(),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().clone()
    }

    /// Publishes to one topic, in order
    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published
            .lock()
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for RecordingTransport {
    fn publish(&self, topic: &str, payload: Bytes) -> spacebrew_router::Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RouterError::Transport("not connected".to_string()));
        }
        self.published.lock().push(Published {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

// ============================================================================
// Route files
// ============================================================================

/// A route file path inside a temporary directory, removed on drop
pub struct TempRoutes {
    dir: TempDir,
    path: PathBuf,
}

impl TempRoutes {
    /// Path to a route file that does not exist yet
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.txt");
        Self { dir, path }
    }

    /// Route file pre-filled with `contents`
    pub fn with_contents(contents: &str) -> Self {
        let routes = Self::new();
        std::fs::write(&routes.path, contents).unwrap();
        routes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Current file contents
    pub fn read(&self) -> String {
        std::fs::read_to_string(&self.path).unwrap()
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Router config pointing at this file
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            route_file: self.path.clone(),
            ..Default::default()
        }
    }

    /// Router with its routes already loaded
    pub fn router(&self) -> Router {
        let router = Router::new(self.router_config());
        router.load_routes().unwrap();
        router
    }
}

impl Default for TempRoutes {
    fn default() -> Self {
        Self::new()
    }
}
