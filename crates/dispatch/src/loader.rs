//! Resolving controllers by name, for routes declared by name rather than by instance.

use crate::error::ResolveError;
use crate::handler::Controller;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Resolves a controller instance from its name.
pub trait ControllerLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<dyn Controller>, ResolveError>;
}

impl<F> ControllerLoader for F
where
    F: Fn(&str) -> Option<Arc<dyn Controller>> + Send + Sync,
{
    fn load(&self, name: &str) -> Result<Arc<dyn Controller>, ResolveError> {
        (self)(name).ok_or_else(|| ResolveError::unknown_controller(name))
    }
}

/// In-memory [`ControllerLoader`] over registered controller instances.
#[derive(Default, Clone)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller under its type name.
    #[must_use]
    pub fn register<C: Controller>(self, controller: C) -> Self {
        let name = controller.controller_type().name().to_string();
        self.register_as(name, controller)
    }

    /// Registers an already shared controller under its type name.
    #[must_use]
    pub fn register_shared(mut self, controller: Arc<dyn Controller>) -> Self {
        let name = controller.controller_type().name().to_string();
        self.controllers.insert(name, controller);
        self
    }

    /// Registers a controller under an explicit name, replacing any previous one.
    #[must_use]
    pub fn register_as<C: Controller>(mut self, name: impl Into<String>, controller: C) -> Self {
        self.controllers.insert(name.into(), Arc::new(controller));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl ControllerLoader for ControllerRegistry {
    fn load(&self, name: &str) -> Result<Arc<dyn Controller>, ResolveError> {
        self.controllers.get(name).cloned().ok_or_else(|| ResolveError::unknown_controller(name))
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.controllers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::metadata::ControllerType;
    use crate::request::Request;
    use crate::response::Response;
    use async_trait::async_trait;

    struct Home {
        controller_type: Arc<ControllerType>,
    }

    impl Home {
        fn new() -> Self {
            Self { controller_type: ControllerType::builder("Home").action("index").build() }
        }
    }

    #[async_trait]
    impl Controller for Home {
        fn controller_type(&self) -> &ControllerType {
            &self.controller_type
        }

        async fn invoke(&self, _action: &str, _req: &mut Request, _resp: &mut Response) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_by_type_name() {
        let registry = ControllerRegistry::new().register(Home::new()).register_as("pages", Home::new());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.load("Home").unwrap().controller_type().name(), "Home");
        assert!(registry.load("pages").is_ok());
    }

    #[test]
    fn test_unknown_controller() {
        let registry = ControllerRegistry::new();
        let error = registry.load("Missing").err().unwrap();
        assert_eq!(error, ResolveError::unknown_controller("Missing"));
    }

    #[test]
    fn test_closure_loader() {
        let home: Arc<dyn Controller> = Arc::new(Home::new());
        let loader = move |name: &str| (name == "Home").then(|| Arc::clone(&home));

        assert!(loader.load("Home").is_ok());
        assert_eq!(loader.load("Other").err().unwrap(), ResolveError::unknown_controller("Other"));
    }
}
