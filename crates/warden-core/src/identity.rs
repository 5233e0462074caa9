//! Authenticated identity and the permission predicate the façade consults
//! before running any operation (§4.9 / §6 of the spec).

/// A resolved, authenticated principal. Authentication itself is an
/// external collaborator; the core only ever sees the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub principal: String,
    pub is_superuser: bool,
}

impl Identity {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            is_superuser: false,
        }
    }

    pub fn superuser(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            is_superuser: true,
        }
    }
}

/// Permission scopes a façade operation may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionScope {
    Superuser,
    PermissionView,
    ProductAdmin,
    ProductAccess,
    ProductStore,
    ProductView,
}

impl std::fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Superuser => "SUPERUSER",
            Self::PermissionView => "PERMISSION_VIEW",
            Self::ProductAdmin => "PRODUCT_ADMIN",
            Self::ProductAccess => "PRODUCT_ACCESS",
            Self::ProductStore => "PRODUCT_STORE",
            Self::ProductView => "PRODUCT_VIEW",
        };
        f.write_str(s)
    }
}

/// Injected permission check. The façade never decides authorization
/// itself — it asks this predicate and surfaces `Unauthorized` on denial.
pub trait PermissionPredicate: Send + Sync {
    fn allows(&self, identity: &Identity, scope: PermissionScope, product_id: Option<i64>) -> bool;
}

/// A predicate that allows everything — useful for tests and for embedding
/// binaries that perform authorization upstream of the core.
pub struct AllowAll;

impl PermissionPredicate for AllowAll {
    fn allows(&self, _identity: &Identity, _scope: PermissionScope, _product_id: Option<i64>) -> bool {
        true
    }
}

/// A predicate that denies everything except superuser identities —
/// useful as a conservative default and in tests asserting on denial paths.
pub struct SuperuserOnly;

impl PermissionPredicate for SuperuserOnly {
    fn allows(&self, identity: &Identity, scope: PermissionScope, _product_id: Option<i64>) -> bool {
        identity.is_superuser || scope == PermissionScope::PermissionView
    }
}
