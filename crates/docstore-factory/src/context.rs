use docstore_types::TenantId;

/// The tenant a storage is created for.
///
/// Storages are bound to one namespace when they are created; the context
/// names the tenant whose namespace that is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageContext {
    tenant: Option<TenantId>,
}

impl StorageContext {
    /// A context without a tenant, for single-tenant deployments.
    pub fn single_tenant() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant: TenantId) -> Self {
        Self {
            tenant: Some(tenant),
        }
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }
}
