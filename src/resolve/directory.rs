//! Known-service directory collaborator.
//!
//! The persistence layer owns the authoritative list of service names; the
//! core takes one read-only snapshot per run.

use async_trait::async_trait;

/// Supplies the known service names for the current scope.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    async fn snapshot(&self) -> Vec<String>;
}

/// A fixed, in-memory directory.
pub struct StaticServiceDirectory {
    services: Vec<String>,
}

impl StaticServiceDirectory {
    pub fn new(services: Vec<String>) -> Self {
        Self { services }
    }

    pub fn empty() -> Self {
        Self {
            services: Vec::new(),
        }
    }
}

#[async_trait]
impl ServiceDirectory for StaticServiceDirectory {
    async fn snapshot(&self) -> Vec<String> {
        self.services.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_snapshot() {
        let directory =
            StaticServiceDirectory::new(vec!["billing".to_string(), "orders".to_string()]);
        let snapshot = directory.snapshot().await;
        assert_eq!(snapshot, vec!["billing", "orders"]);
    }

    #[tokio::test]
    async fn test_empty_directory() {
        assert!(StaticServiceDirectory::empty().snapshot().await.is_empty());
    }
}
