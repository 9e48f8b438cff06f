//! Per-project registry of namespace converters.
//!
//! The registry is owned by the storage factory and shared by reference. It
//! is written while the factory is configured (explicit registrations) and
//! the first time a project is resolved through the optional
//! [`ConverterFactory`]; afterwards it is only read. Callers must not race
//! two first-time resolutions of the same project against an explicit
//! registration for it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use docstore_types::ProjectId;
use tracing::debug;

use crate::converter::{ConverterFactory, NamespaceConverter, StubNamespaceConverter};
use crate::error::{Result, TenantError};

/// Registry mapping a backend project to its namespace converter.
#[derive(Default)]
pub struct ConverterRegistry {
    factory: Option<Arc<dyn ConverterFactory>>,
    converters: RwLock<HashMap<ProjectId, Arc<dyn NamespaceConverter>>>,
}

impl ConverterRegistry {
    /// An empty registry without a factory: unregistered projects get a stub.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry that builds converters for unregistered projects.
    pub fn with_factory(factory: Arc<dyn ConverterFactory>) -> Self {
        Self {
            factory: Some(factory),
            converters: RwLock::new(HashMap::new()),
        }
    }

    /// Register the converter of `project`.
    ///
    /// Each project is registered at most once.
    pub fn register(
        &self,
        project: ProjectId,
        converter: Arc<dyn NamespaceConverter>,
    ) -> Result<()> {
        let mut converters = self.converters.write().expect("lock poisoned");
        if converters.contains_key(&project) {
            return Err(TenantError::AlreadyRegistered(project.to_string()));
        }
        debug!(%project, ?converter, "namespace converter registered");
        converters.insert(project, converter);
        Ok(())
    }

    pub fn is_registered(&self, project: &ProjectId) -> bool {
        self.converters
            .read()
            .expect("lock poisoned")
            .contains_key(project)
    }

    /// Converter of `project`.
    ///
    /// Returns the registered converter, else builds and registers one with
    /// the factory, else returns a [`StubNamespaceConverter`].
    pub fn converter_for(&self, project: &ProjectId) -> Arc<dyn NamespaceConverter> {
        if let Some(converter) = self.converters.read().expect("lock poisoned").get(project) {
            return Arc::clone(converter);
        }
        let Some(factory) = &self.factory else {
            return Arc::new(StubNamespaceConverter::new(project.clone()));
        };
        let mut converters = self.converters.write().expect("lock poisoned");
        let converter = converters
            .entry(project.clone())
            .or_insert_with(|| factory.converter_for(project));
        Arc::clone(converter)
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let projects: Vec<ProjectId> = self
            .converters
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("ConverterRegistry")
            .field("has_factory", &self.factory.is_some())
            .field("projects", &projects)
            .finish()
    }
}
