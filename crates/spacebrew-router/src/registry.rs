//! Registered clients

use parking_lot::RwLock;
use spacebrew_core::ClientDescriptor;
use tracing::{info, warn};

use crate::error::{Result, RouterError};

/// Clients that announced themselves, in registration order.
///
/// Names are unique. There is no removal: a name stays taken until the
/// process restarts.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<Vec<ClientDescriptor>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client unless its name is already registered
    pub fn register(&self, descriptor: ClientDescriptor) -> Result<()> {
        let mut clients = self.clients.write();
        if clients.iter().any(|c| c.name == descriptor.name) {
            warn!("Client rejected: Name '{}' already exists.", descriptor.name);
            return Err(RouterError::DuplicateName(descriptor.name));
        }

        info!("Registered new client: {}", descriptor.name);
        clients.push(descriptor);
        Ok(())
    }

    /// Snapshot in registration order
    pub fn list(&self) -> Vec<ClientDescriptor> {
        self.clients.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<ClientDescriptor> {
        self.clients.read().iter().find(|c| c.name == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.read().iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacebrew_core::Channel;

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = ClientRegistry::new();
        let first = ClientDescriptor::new("ClientDuplicate", "first")
            .with_publisher(Channel::new("p1", "bool"));
        let second = ClientDescriptor::new("ClientDuplicate", "second");

        registry.register(first.clone()).unwrap();
        let err = registry.register(second).unwrap_err();

        assert!(matches!(err, RouterError::DuplicateName(ref n) if n == "ClientDuplicate"));
        assert_eq!(registry.list(), vec![first]);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let registry = ClientRegistry::new();
        registry.register(ClientDescriptor::new("button", "")).unwrap();
        registry.register(ClientDescriptor::new("Button", "")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let registry = ClientRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(ClientDescriptor::new(name, "")).unwrap();
        }

        let names: Vec<_> = registry.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert!(registry.contains("a"));
        assert_eq!(registry.get("b").unwrap().name, "b");
        assert!(registry.get("z").is_none());
    }
}
