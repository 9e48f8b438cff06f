//! Conversion between tenants and namespaces.
//!
//! The default encoding is a one-letter prefix naming the tenant kind
//! followed by the tenant value escaped to the namespace alphabet:
//!
//! - `D` for domains, `E` for emails, `V` for plain values
//! - `[A-Za-z0-9.-]` is kept as is
//! - every other byte of the UTF-8 value is written as `_` and two lowercase
//!   hex digits
//!
//! The escape character `_` is itself escaped, which keeps the encoding
//! bijective.

use std::fmt;
use std::sync::Arc;

use docstore_types::{Namespace, ProjectId, TenantId, MAX_NAMESPACE_LEN};

use crate::error::{Result, TenantError};

const DOMAIN_PREFIX: char = 'D';
const EMAIL_PREFIX: char = 'E';
const VALUE_PREFIX: char = 'V';
const ESCAPE: u8 = b'_';

/// Two-way conversion between tenants and namespaces of one project.
pub trait NamespaceConverter: Send + Sync + fmt::Debug {
    /// Namespace holding the data of `tenant`.
    fn to_namespace(&self, tenant: &TenantId) -> Result<Namespace>;

    /// Tenant owning `namespace`.
    fn to_tenant(&self, namespace: &Namespace) -> Result<TenantId>;
}

/// Builds the converter of a project the first time the project is seen.
pub trait ConverterFactory: Send + Sync {
    fn converter_for(&self, project: &ProjectId) -> Arc<dyn NamespaceConverter>;
}

impl<F> ConverterFactory for F
where
    F: Fn(&ProjectId) -> Arc<dyn NamespaceConverter> + Send + Sync,
{
    fn converter_for(&self, project: &ProjectId) -> Arc<dyn NamespaceConverter> {
        self(project)
    }
}

/// Prefix-and-escape converter used unless a deployment supplies its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNamespaceConverter;

fn is_literal(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-'
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for &byte in value.as_bytes() {
        if is_literal(byte) {
            out.push(byte as char);
        } else {
            out.push(ESCAPE as char);
            out.push_str(&hex::encode([byte]));
        }
    }
    out
}

fn unescape(encoded: &str) -> std::result::Result<String, String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == ESCAPE {
            let digits = encoded
                .get(i + 1..i + 3)
                .ok_or_else(|| format!("truncated escape at byte {i}"))?;
            if digits.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(format!("escape {digits:?} is not lowercase hex"));
            }
            let decoded = hex::decode(digits).map_err(|e| format!("bad escape {digits:?}: {e}"))?;
            out.extend_from_slice(&decoded);
            i += 3;
        } else if is_literal(byte) {
            out.push(byte);
            i += 1;
        } else {
            return Err(format!("unexpected character {:?}", byte as char));
        }
    }
    String::from_utf8(out).map_err(|e| format!("not UTF-8: {e}"))
}

impl NamespaceConverter for DefaultNamespaceConverter {
    fn to_namespace(&self, tenant: &TenantId) -> Result<Namespace> {
        let prefix = match tenant {
            TenantId::Domain(_) => DOMAIN_PREFIX,
            TenantId::Email(_) => EMAIL_PREFIX,
            TenantId::Value(_) => VALUE_PREFIX,
        };
        let encoded = format!("{prefix}{}", escape(tenant.as_str()));
        if encoded.len() > MAX_NAMESPACE_LEN {
            return Err(TenantError::InvalidTenant {
                tenant: tenant.to_string(),
                reason: format!(
                    "encoded namespace is {} bytes; the limit is {MAX_NAMESPACE_LEN}",
                    encoded.len()
                ),
            });
        }
        Ok(Namespace::new(encoded)?)
    }

    fn to_tenant(&self, namespace: &Namespace) -> Result<TenantId> {
        let malformed = |reason: String| TenantError::MalformedNamespace {
            namespace: namespace.as_str().to_string(),
            reason,
        };
        let raw = namespace.as_str();
        let mut chars = raw.chars();
        let prefix = chars
            .next()
            .ok_or_else(|| malformed("namespace is empty".into()))?;
        let value = unescape(chars.as_str()).map_err(malformed)?;
        // Only the canonical encoding maps back, keeping the pair bijective.
        if escape(&value) != chars.as_str() {
            return Err(malformed("non-canonical escaping".into()));
        }
        match prefix {
            DOMAIN_PREFIX => Ok(TenantId::Domain(value)),
            EMAIL_PREFIX => Ok(TenantId::Email(value)),
            VALUE_PREFIX => Ok(TenantId::Value(value)),
            other => Err(malformed(format!("unknown tenant prefix {other:?}"))),
        }
    }
}

/// Converter of a project nothing was registered for.
///
/// Every conversion fails with [`TenantError::Unsupported`], surfacing the
/// misconfiguration at the first tenant-scoped call.
#[derive(Clone, Debug)]
pub struct StubNamespaceConverter {
    project: ProjectId,
}

impl StubNamespaceConverter {
    pub fn new(project: ProjectId) -> Self {
        Self { project }
    }

    fn unsupported(&self, operation: &str) -> TenantError {
        TenantError::Unsupported {
            project: self.project.to_string(),
            operation: operation.to_string(),
        }
    }
}

impl NamespaceConverter for StubNamespaceConverter {
    fn to_namespace(&self, _tenant: &TenantId) -> Result<Namespace> {
        Err(self.unsupported("tenant-to-namespace"))
    }

    fn to_tenant(&self, _namespace: &Namespace) -> Result<TenantId> {
        Err(self.unsupported("namespace-to-tenant"))
    }
}
