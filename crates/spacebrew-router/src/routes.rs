//! Route table and its route file
//!
//! The route file is plain UTF-8 text, hand-editable:
//! ```text
//! # Spacebrew2 Router Routes: Publisher, Subscriber
//! VirtualButton1/button,VirtualButton2/bgcolor
//! VirtualButton2/button,VirtualButton1/bgcolor
//! ```
//!
//! Every mutation rewrites the whole file while the table lock is held, so
//! the file and the in-memory table never disagree once a call returns.

use indexmap::IndexMap;
use parking_lot::Mutex;
use spacebrew_core::ROUTE_FILE_HEADER;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::{Result, RouterError};

/// Ordered publisher topic -> subscriber topic mapping
pub type RouteMap = IndexMap<String, String>;

/// Routes written when no route file exists yet
pub fn default_routes() -> RouteMap {
    IndexMap::from([
        (
            "VirtualButton1/button".to_string(),
            "VirtualButton2/bgcolor".to_string(),
        ),
        (
            "VirtualButton2/button".to_string(),
            "VirtualButton1/bgcolor".to_string(),
        ),
    ])
}

/// Result of [`RouteTable::add_route`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Mapping stored; `replaced` holds the previous subscriber, if any
    Added { replaced: Option<String> },
    /// The exact mapping was already present, nothing written
    Unchanged,
}

/// Result of [`RouteTable::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
    /// No route file existed and the defaults were written
    pub seeded: bool,
}

/// Parse route file text.
///
/// Blank lines and `#` comments are ignored. Each other line is split on
/// its first comma; lines without a comma or with an empty side are
/// skipped and counted.
pub fn parse_routes(text: &str) -> (RouteMap, usize) {
    let mut routes = RouteMap::new();
    let mut skipped = 0;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.split_once(',') {
            Some((publisher, subscriber))
                if !publisher.trim().is_empty() && !subscriber.trim().is_empty() =>
            {
                routes.insert(
                    publisher.trim().to_string(),
                    subscriber.trim().to_string(),
                );
            }
            _ => {
                debug!("Skipping malformed route line: {}", line);
                skipped += 1;
            }
        }
    }

    (routes, skipped)
}

/// Render routes in file format
pub fn render_routes(routes: &RouteMap) -> String {
    let mut out = String::with_capacity(64 + routes.len() * 48);
    out.push_str(ROUTE_FILE_HEADER);
    out.push('\n');
    for (publisher, subscriber) in routes {
        out.push_str(publisher);
        out.push(',');
        out.push_str(subscriber);
        out.push('\n');
    }
    out
}

/// Reject topics that would not survive a save/load cycle
pub fn validate_topic(topic: &str) -> Result<()> {
    let invalid = |reason| {
        Err(RouterError::InvalidTopic {
            topic: topic.to_string(),
            reason,
        })
    };

    if topic.is_empty() {
        return invalid("topic is empty");
    }
    if topic.trim() != topic {
        return invalid("leading or trailing whitespace");
    }
    if topic.contains(['\n', '\r']) {
        return invalid("contains a line break");
    }
    Ok(())
}

/// Publisher topics are keys in the file, so they are stricter
pub fn validate_publisher(topic: &str) -> Result<()> {
    validate_topic(topic)?;
    if topic.contains(',') {
        return Err(RouterError::InvalidTopic {
            topic: topic.to_string(),
            reason: "publisher topic contains ','",
        });
    }
    if topic.starts_with('#') {
        return Err(RouterError::InvalidTopic {
            topic: topic.to_string(),
            reason: "publisher topic starts with '#'",
        });
    }
    Ok(())
}

/// Location of the route file
#[derive(Debug, Clone)]
pub struct RouteStore {
    path: PathBuf,
}

impl RouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file. `Ok(None)` when it does not exist.
    pub fn read(&self) -> io::Result<Option<(RouteMap, usize)>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(parse_routes(&text))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the file through a temporary sibling and an atomic rename
    pub fn write(&self, routes: &RouteMap) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(render_routes(routes).as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// The router's route table
pub struct RouteTable {
    routes: Mutex<RouteMap>,
    store: RouteStore,
}

impl RouteTable {
    /// Create an empty table backed by `store`. Call [`load`](Self::load)
    /// to read the file.
    pub fn new(store: RouteStore) -> Self {
        Self {
            routes: Mutex::new(RouteMap::new()),
            store,
        }
    }

    pub fn store(&self) -> &RouteStore {
        &self.store
    }

    /// Load the route file, seeding it with [`default_routes`] if absent.
    ///
    /// A read error leaves the in-memory table untouched.
    pub fn load(&self) -> Result<LoadReport> {
        let mut routes = self.routes.lock();

        match self.store.read().map_err(|e| self.persistence_error(e))? {
            Some((loaded, skipped)) => {
                *routes = loaded;
                info!(
                    "Routes loaded from '{}'. Total routes: {}",
                    self.store.path.display(),
                    routes.len()
                );
                Ok(LoadReport {
                    loaded: routes.len(),
                    skipped,
                    seeded: false,
                })
            }
            None => {
                info!(
                    "File '{}' not found. Creating file with default routes.",
                    self.store.path.display()
                );
                *routes = default_routes();
                self.persist(&routes)?;
                Ok(LoadReport {
                    loaded: routes.len(),
                    skipped: 0,
                    seeded: true,
                })
            }
        }
    }

    /// Write the current table to the route file
    pub fn save(&self) -> Result<()> {
        let routes = self.routes.lock();
        self.persist(&routes)
    }

    /// Map `publisher` to `subscriber`, replacing any previous mapping.
    ///
    /// An `Err(Persistence)` means the in-memory table was updated but the
    /// file could not be written.
    pub fn add_route(&self, publisher: &str, subscriber: &str) -> Result<AddOutcome> {
        validate_publisher(publisher)?;
        validate_topic(subscriber)?;

        let mut routes = self.routes.lock();
        if routes.get(publisher).map(String::as_str) == Some(subscriber) {
            return Ok(AddOutcome::Unchanged);
        }

        let replaced = routes.insert(publisher.to_string(), subscriber.to_string());
        info!("Route added: {} -> {}", publisher, subscriber);
        self.persist(&routes)?;

        Ok(AddOutcome::Added { replaced })
    }

    /// Remove the route for `publisher`, returning its subscriber.
    ///
    /// As with [`add_route`](Self::add_route), `Err(Persistence)` means the
    /// route is already gone from memory.
    pub fn delete_route(&self, publisher: &str) -> Result<String> {
        let mut routes = self.routes.lock();
        let subscriber = routes
            .shift_remove(publisher)
            .ok_or_else(|| RouterError::RouteNotFound(publisher.to_string()))?;

        info!("Route deleted: {} -> {}", publisher, subscriber);
        self.persist(&routes)?;

        Ok(subscriber)
    }

    /// Subscriber topic for an exact publisher topic
    pub fn lookup(&self, publisher: &str) -> Option<String> {
        self.routes.lock().get(publisher).cloned()
    }

    /// Snapshot in insertion order
    pub fn list(&self) -> RouteMap {
        self.routes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }

    fn persist(&self, routes: &RouteMap) -> Result<()> {
        self.store.write(routes).map_err(|e| {
            error!(
                "Error saving routes to '{}': {}",
                self.store.path.display(),
                e
            );
            self.persistence_error(e)
        })
    }

    fn persistence_error(&self, source: io::Error) -> RouterError {
        RouterError::Persistence {
            path: self.store.path.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("path", &self.store.path)
            .field("routes", &self.len())
            .finish()
    }
}
