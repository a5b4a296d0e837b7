use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use am_core::classifier::{OriginResolver, ResolveError};
use am_core::types::ContextId;

/// Current document origin of every open context, as announced by the host.
#[derive(Debug, Clone, Default)]
pub struct ContextOrigins {
    inner: Arc<RwLock<HashMap<ContextId, String>>>,
}

impl ContextOrigins {
    pub fn new() -> Self {
        Self::default()
    }

    // Every write is a single insert or remove, so a poisoned table is
    // still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ContextId, String>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ContextId, String>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set(&self, context_id: ContextId, origin: String) {
        self.write().insert(context_id, origin);
    }

    pub fn close(&self, context_id: ContextId) {
        self.write().remove(&context_id);
    }

    fn lookup(&self, context_id: ContextId) -> Result<String, ResolveError> {
        let map = self.read();
        match map.get(&context_id) {
            Some(origin) if !origin.is_empty() => Ok(origin.clone()),
            Some(_) => Err(ResolveError::NoOrigin(context_id)),
            None => Err(ResolveError::ContextClosed(context_id)),
        }
    }
}

impl OriginResolver for ContextOrigins {
    async fn resolve_context_origin(&self, context_id: ContextId) -> Result<String, ResolveError> {
        self.lookup(context_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_open_and_closed_contexts() {
        let origins = ContextOrigins::new();
        origins.set(ContextId(1), "https://example.com/".to_string());
        origins.set(ContextId(2), String::new());

        assert_eq!(
            origins.resolve_context_origin(ContextId(1)).await,
            Ok("https://example.com/".to_string())
        );
        assert_eq!(
            origins.resolve_context_origin(ContextId(2)).await,
            Err(ResolveError::NoOrigin(ContextId(2)))
        );

        origins.close(ContextId(1));
        assert_eq!(
            origins.resolve_context_origin(ContextId(1)).await,
            Err(ResolveError::ContextClosed(ContextId(1)))
        );
    }

    #[tokio::test]
    async fn test_updates_survive_poisoned_table() {
        let origins = ContextOrigins::new();
        origins.set(ContextId(1), "https://old.example/".to_string());

        let poisoner = origins.clone();
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("poison the origin table");
        })
        .join();
        assert!(joined.is_err());
        assert!(origins.inner.is_poisoned());

        origins.set(ContextId(1), "https://new.example/".to_string());
        origins.set(ContextId(2), "https://two.example/".to_string());
        origins.close(ContextId(2));

        assert_eq!(
            origins.resolve_context_origin(ContextId(1)).await,
            Ok("https://new.example/".to_string())
        );
        assert_eq!(
            origins.resolve_context_origin(ContextId(2)).await,
            Err(ResolveError::ContextClosed(ContextId(2)))
        );
    }
}
