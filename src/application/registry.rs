use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::OutboxError;
use crate::handlers::OutboxEventHandler;

/// Immutable map from event type to its handler, built once at startup.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn OutboxEventHandler>>,
}

impl HandlerRegistry {
    /// Build the registry, failing on the first event type registered twice.
    pub fn new<I>(handlers: I) -> Result<Self, OutboxError>
    where
        I: IntoIterator<Item = Arc<dyn OutboxEventHandler>>,
    {
        let mut map = HashMap::new();
        for handler in handlers {
            let event_type = handler.event_type().to_string();
            if map.contains_key(&event_type) {
                return Err(OutboxError::DuplicateHandler(event_type));
            }
            map.insert(event_type, handler);
        }
        Ok(Self { handlers: map })
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn get(&self, event_type: &str) -> Option<&dyn OutboxEventHandler> {
        self.handlers.get(event_type).map(Arc::as_ref)
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventRecord;
    use crate::handlers::{AssetCreatedHandler, HandlerError};

    struct Named(&'static str);

    impl OutboxEventHandler for Named {
        fn event_type(&self) -> &str {
            self.0
        }

        fn handle(&self, _event: &EventRecord) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn looks_up_by_event_type() {
        let registry = HandlerRegistry::new([
            Arc::new(AssetCreatedHandler) as Arc<dyn OutboxEventHandler>,
            Arc::new(Named("AssetRetired")) as Arc<dyn OutboxEventHandler>,
        ])
        .expect("no duplicates");

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("AssetCreated").map(|h| h.event_type()),
            Some("AssetCreated")
        );
        assert!(registry.get("AssetUpdated").is_none());
        assert_eq!(registry.event_types(), vec!["AssetCreated", "AssetRetired"]);
    }

    #[test]
    fn duplicate_event_type_fails_fast() {
        let err = HandlerRegistry::new([
            Arc::new(Named("AssetCreated")) as Arc<dyn OutboxEventHandler>,
            Arc::new(AssetCreatedHandler) as Arc<dyn OutboxEventHandler>,
        ])
        .unwrap_err();

        assert!(matches!(err, OutboxError::DuplicateHandler(t) if t == "AssetCreated"));
    }

    #[test]
    fn empty_registry_has_no_handlers() {
        let registry = HandlerRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.get("AssetCreated").is_none());
    }
}
