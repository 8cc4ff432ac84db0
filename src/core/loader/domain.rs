use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::LoaderResult;

/// Security/codebase context shared by every class defined from one origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDomain {
    pub origin: String,
    pub codebase: String,
}

/// Lazily built per-origin domains. Concurrent first requests for the same
/// origin converge on one instance.
#[derive(Debug, Default)]
pub struct DomainCache {
    domains: RwLock<HashMap<String, Arc<CodeDomain>>>,
}

impl DomainCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, origin: &str) -> Option<Arc<CodeDomain>> {
        self.domains.read().get(origin).cloned()
    }

    pub fn get_or_create<F>(&self, origin: &str, codebase: F) -> LoaderResult<Arc<CodeDomain>>
    where
        F: FnOnce(&str) -> LoaderResult<String>,
    {
        if let Some(domain) = self.get(origin) {
            return Ok(domain);
        }

        let mut domains = self.domains.write();
        if let Some(domain) = domains.get(origin) {
            return Ok(domain.clone());
        }
        let domain = Arc::new(CodeDomain {
            origin: origin.to_string(),
            codebase: codebase(origin)?,
        });
        domains.insert(origin.to_string(), domain.clone());
        Ok(domain)
    }

    pub fn len(&self) -> usize {
        self.domains.read().len()
    }
}
