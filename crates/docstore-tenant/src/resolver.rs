use std::sync::Arc;

use docstore_types::{Namespace, ProjectId, TenantId};
use tracing::warn;

use crate::converter::NamespaceConverter;
use crate::error::{Result, TenantError};
use crate::registry::ConverterRegistry;

/// Resolves the namespace that holds a tenant's data.
#[derive(Clone, Debug)]
pub enum NamespaceResolver {
    /// Every tenant maps to the same fixed namespace.
    SingleTenant { namespace: Namespace },
    /// Each tenant maps to its own namespace through the project's converter.
    Multitenant {
        project: ProjectId,
        converter: Arc<dyn NamespaceConverter>,
    },
}

impl NamespaceResolver {
    pub fn single_tenant(namespace: Namespace) -> Self {
        Self::SingleTenant { namespace }
    }

    /// A multitenant resolver for `project`.
    ///
    /// `pinned` is the namespace the client handle was configured with.
    /// Per-tenant namespaces cannot coexist with a pinned non-empty one, so
    /// that combination fails.
    pub fn multitenant(
        project: &ProjectId,
        pinned: Option<&Namespace>,
        registry: &ConverterRegistry,
    ) -> Result<Self> {
        if let Some(namespace) = pinned.filter(|ns| !ns.is_empty()) {
            return Err(TenantError::AmbiguousNamespace {
                project: project.to_string(),
                namespace: namespace.as_str().to_string(),
            });
        }
        Ok(Self::Multitenant {
            project: project.clone(),
            converter: registry.converter_for(project),
        })
    }

    pub fn is_multitenant(&self) -> bool {
        matches!(self, Self::Multitenant { .. })
    }

    /// Namespace of `tenant`. A single-tenant resolver ignores the tenant.
    pub fn resolve(&self, tenant: &TenantId) -> Result<Namespace> {
        match self {
            Self::SingleTenant { namespace } => Ok(namespace.clone()),
            Self::Multitenant { converter, .. } => converter.to_namespace(tenant),
        }
    }

    /// Tenant owning `namespace`.
    pub fn recover(&self, namespace: &Namespace) -> Result<TenantId> {
        match self {
            Self::SingleTenant { .. } => Err(TenantError::NoTenantInNamespace(
                namespace.as_str().to_string(),
            )),
            Self::Multitenant { converter, .. } => converter.to_tenant(namespace),
        }
    }

    /// Namespace for an optional tenant context.
    ///
    /// Multitenant resolvers require a tenant.
    pub fn namespace_for(&self, tenant: Option<&TenantId>) -> Result<Namespace> {
        match (self, tenant) {
            (Self::SingleTenant { namespace }, _) => Ok(namespace.clone()),
            (Self::Multitenant { .. }, Some(tenant)) => self.resolve(tenant),
            (Self::Multitenant { .. }, None) => Err(TenantError::TenantRequired),
        }
    }

    /// Tenants owning the given namespaces.
    ///
    /// The default namespace and namespaces that do not decode are skipped.
    pub fn recover_all(&self, namespaces: impl IntoIterator<Item = Namespace>) -> Vec<TenantId> {
        namespaces
            .into_iter()
            .filter(|ns| !ns.is_empty())
            .filter_map(|ns| match self.recover(&ns) {
                Ok(tenant) => Some(tenant),
                Err(e) => {
                    warn!(namespace = %ns, error = %e, "skipping namespace without a tenant");
                    None
                }
            })
            .collect()
    }
}
