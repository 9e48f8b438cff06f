use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use docstore_backend::Datastore;
use docstore_client::{ClientConfig, DatastoreWrapper};
use docstore_mapping::{Column, ColumnMapping};
use docstore_storage::{
    AggregateStorage, FlatLayout, KeyLayout, ProjectionStorage, RecordStorage, StandStorage,
    LAST_HANDLED_EVENT_TIME_KIND,
};
use docstore_tenant::{ConverterFactory, ConverterRegistry, NamespaceConverter, NamespaceResolver};
use docstore_types::{Kind, Namespace, ProjectId, TenantId, TypeDescriptor};
use tracing::{debug, info};

use crate::config::FactoryConfig;
use crate::context::StorageContext;
use crate::error::{FactoryError, FactoryResult};

/// Layout name bound to each (kind, namespace) pair.
type Bindings = RwLock<HashMap<(Kind, Namespace), String>>;

/// Creates storages bound to a tenant's namespace.
///
/// The factory owns the client wrapper, the namespace resolver and the
/// column mapping, and shares them with every storage it creates. It
/// remembers the key layout each kind was created with in each namespace
/// and refuses to create a second storage with another layout.
///
/// Cloning a factory is cheap; clones share the client and the bindings.
#[derive(Clone)]
pub struct StorageFactory {
    client: Arc<DatastoreWrapper>,
    resolver: NamespaceResolver,
    registry: Arc<ConverterRegistry>,
    mapping: ColumnMapping,
    layouts: Arc<HashMap<Kind, Arc<dyn KeyLayout>>>,
    bindings: Arc<Bindings>,
    config: FactoryConfig,
}

impl StorageFactory {
    /// Start configuring a factory.
    pub fn builder() -> StorageFactoryBuilder {
        StorageFactoryBuilder::default()
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Whether storages are bound to per-tenant namespaces.
    pub fn is_multitenant(&self) -> bool {
        self.resolver.is_multitenant()
    }

    pub fn project_id(&self) -> &ProjectId {
        self.client.project_id()
    }

    pub fn resolver(&self) -> &NamespaceResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &Arc<ConverterRegistry> {
        &self.registry
    }

    /// The shared client wrapper.
    pub fn client(&self) -> &Arc<DatastoreWrapper> {
        &self.client
    }

    /// Namespace the storages of `context` are bound to.
    pub fn namespace_for(&self, context: &StorageContext) -> FactoryResult<Namespace> {
        if self.client.is_closed() {
            return Err(FactoryError::Closed);
        }
        Ok(self.resolver.namespace_for(context.tenant())?)
    }

    fn layout_for(&self, kind: &Kind) -> Arc<dyn KeyLayout> {
        self.layouts
            .get(kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(FlatLayout))
    }

    /// Record the layout of every `(kind, layout)` pair in `namespace`.
    ///
    /// Nothing is recorded unless every pair agrees with the existing
    /// bindings.
    fn bind(&self, namespace: &Namespace, layouts: &[(&Kind, &dyn KeyLayout)]) -> FactoryResult<()> {
        let mut bindings = self.bindings.write().expect("lock poisoned");
        for (kind, layout) in layouts {
            let requested = layout.identity();
            if let Some(existing) = bindings.get(&((*kind).clone(), namespace.clone())) {
                if *existing != requested {
                    return Err(FactoryError::LayoutConflict {
                        kind: kind.to_string(),
                        namespace: namespace.to_string(),
                        existing: existing.clone(),
                        requested,
                    });
                }
            }
        }
        for (kind, layout) in layouts {
            bindings
                .entry(((*kind).clone(), namespace.clone()))
                .or_insert_with(|| layout.identity());
        }
        Ok(())
    }

    /// Storage for the records of `descriptor`'s type.
    ///
    /// The kind is validated before the backend is touched.
    pub fn create_record_storage(
        &self,
        context: &StorageContext,
        descriptor: &TypeDescriptor,
        columns: Vec<Column>,
    ) -> FactoryResult<RecordStorage> {
        let kind = Kind::of_descriptor(descriptor)?;
        let namespace = self.namespace_for(context)?;
        let layout = self.layout_for(&kind);
        let storage = RecordStorage::new(
            self.client.clone(),
            kind,
            namespace,
            columns,
            layout,
            self.mapping.clone(),
        )?;
        self.bind(storage.namespace(), &[(storage.kind(), storage.layout())])?;
        debug!(kind = %storage.kind(), namespace = %storage.namespace(), "record storage created");
        Ok(storage)
    }

    /// History and lifecycle storage of an aggregate type.
    pub fn create_aggregate_storage(
        &self,
        context: &StorageContext,
        descriptor: &TypeDescriptor,
    ) -> FactoryResult<AggregateStorage> {
        let aggregate_kind = Kind::of_descriptor(descriptor)?;
        let namespace = self.namespace_for(context)?;
        let storage = AggregateStorage::new(
            self.client.clone(),
            aggregate_kind.clone(),
            namespace.clone(),
            self.mapping.clone(),
        )?;
        let lifecycle_kind = AggregateStorage::lifecycle_kind(&aggregate_kind)?;
        self.bind(
            &namespace,
            &[
                (storage.history().kind(), storage.history().layout()),
                (&lifecycle_kind, &FlatLayout as &dyn KeyLayout),
            ],
        )?;
        debug!(kind = %aggregate_kind, %namespace, "aggregate storage created");
        Ok(storage)
    }

    /// Storage of the latest entity states of every type.
    pub fn create_stand_storage(&self, context: &StorageContext) -> FactoryResult<StandStorage> {
        let namespace = self.namespace_for(context)?;
        let storage = StandStorage::new(self.client.clone(), namespace, self.mapping.clone())?;
        let records = storage.records();
        self.bind(records.namespace(), &[(records.kind(), records.layout())])?;
        debug!(namespace = %storage.records().namespace(), "stand storage created");
        Ok(storage)
    }

    /// Storage of a projection type's states and last handled event time.
    pub fn create_projection_storage(
        &self,
        context: &StorageContext,
        descriptor: &TypeDescriptor,
        columns: Vec<Column>,
    ) -> FactoryResult<ProjectionStorage> {
        let kind = Kind::of_descriptor(descriptor)?;
        let namespace = self.namespace_for(context)?;
        let layout = self.layout_for(&kind);
        let storage = ProjectionStorage::new(
            self.client.clone(),
            kind,
            namespace.clone(),
            columns,
            layout,
            self.mapping.clone(),
        )?;
        let records = storage.records();
        self.bind(
            &namespace,
            &[
                (records.kind(), records.layout()),
                (&Kind::new(LAST_HANDLED_EVENT_TIME_KIND)?, &FlatLayout as &dyn KeyLayout),
            ],
        )?;
        debug!(kind = %storage.records().kind(), "projection storage created");
        Ok(storage)
    }

    /// A single-tenant factory over the same client.
    ///
    /// Returns a clone when this factory is already single-tenant.
    pub fn to_single_tenant(&self) -> StorageFactory {
        if !self.is_multitenant() {
            return self.clone();
        }
        let namespace = self.client.pinned_namespace().cloned().unwrap_or_default();
        StorageFactory {
            resolver: NamespaceResolver::single_tenant(namespace),
            config: FactoryConfig {
                multitenant: false,
                ..self.config.clone()
            },
            ..self.clone()
        }
    }

    /// Tenants that own data in the backend.
    ///
    /// Empty for single-tenant factories.
    pub fn tenant_index(&self) -> FactoryResult<Vec<TenantId>> {
        if !self.is_multitenant() {
            return Ok(Vec::new());
        }
        let namespaces = self.client.namespaces()?;
        Ok(self.resolver.recover_all(namespaces))
    }

    /// Release the client. Safe to call more than once.
    pub fn close(&self) {
        if !self.client.is_closed() {
            info!(project = %self.project_id(), "storage factory closing");
        }
        self.client.close();
    }

    /// Whether the shared client was released.
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

impl fmt::Debug for StorageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFactory")
            .field("project", self.project_id())
            .field("resolver", &self.resolver)
            .field("mapping", &self.mapping)
            .field("layouts", &self.layouts.keys().collect::<Vec<_>>())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`StorageFactory`].
#[derive(Default)]
pub struct StorageFactoryBuilder {
    datastore: Option<Arc<dyn Datastore>>,
    config: FactoryConfig,
    mapping: Option<ColumnMapping>,
    layouts: HashMap<Kind, Arc<dyn KeyLayout>>,
    converter: Option<Arc<dyn NamespaceConverter>>,
    converter_factory: Option<Arc<dyn ConverterFactory>>,
    registry: Option<Arc<ConverterRegistry>>,
}

impl StorageFactoryBuilder {
    /// Backend the factory's storages talk to. Required.
    pub fn with_datastore(mut self, datastore: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(datastore);
        self
    }

    pub fn multitenant(mut self, multitenant: bool) -> Self {
        self.config.multitenant = multitenant;
        self
    }

    pub fn with_config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_client_config(mut self, client: ClientConfig) -> Self {
        self.config.client = client;
        self
    }

    /// Column mapping shared by every storage; the built-in mapping is used
    /// otherwise.
    pub fn with_column_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Key layout for the records of `kind`. Kinds without a layout are flat.
    pub fn with_layout(mut self, kind: Kind, layout: impl KeyLayout + 'static) -> Self {
        self.layouts.insert(kind, Arc::new(layout));
        self
    }

    /// Converter registered for the datastore's project when the factory
    /// is built.
    pub fn with_namespace_converter(mut self, converter: Arc<dyn NamespaceConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Builds converters for projects without a registered one.
    pub fn with_converter_factory(mut self, factory: Arc<dyn ConverterFactory>) -> Self {
        self.converter_factory = Some(factory);
        self
    }

    /// Registry shared with other factories. A converter factory given to
    /// this builder is ignored when a registry is supplied.
    pub fn with_converter_registry(mut self, registry: Arc<ConverterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the factory. Fails without a datastore or when a multitenant
    /// factory is asked for over a client that pins a namespace.
    pub fn build(self) -> FactoryResult<StorageFactory> {
        let datastore = self.datastore.ok_or(FactoryError::MissingDatastore)?;
        let project = datastore.project_id().clone();
        let registry = match (self.registry, self.converter_factory) {
            (Some(registry), _) => registry,
            (None, Some(factory)) => Arc::new(ConverterRegistry::with_factory(factory)),
            (None, None) => Arc::new(ConverterRegistry::new()),
        };
        if let Some(converter) = self.converter {
            registry.register(project.clone(), converter)?;
        }

        let resolver = if self.config.multitenant {
            NamespaceResolver::multitenant(&project, datastore.default_namespace(), &registry)?
        } else {
            NamespaceResolver::single_tenant(datastore.default_namespace().cloned().unwrap_or_default())
        };
        let client = Arc::new(DatastoreWrapper::new(datastore, self.config.client.clone()));
        info!(
            %project,
            multitenant = self.config.multitenant,
            layouts = self.layouts.len(),
            "storage factory built"
        );
        Ok(StorageFactory {
            client,
            resolver,
            registry,
            mapping: self.mapping.unwrap_or_default(),
            layouts: Arc::new(self.layouts),
            bindings: Arc::new(RwLock::new(HashMap::new())),
            config: self.config,
        })
    }
}
