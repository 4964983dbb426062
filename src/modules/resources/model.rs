use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tourdesk_core::query::Projection;
use tourdesk_core::{AppError, Document, ResourceSchema};

use crate::middleware::auth::AccessRule;

/// Payload keys that a generic update must never touch.
pub const FORBIDDEN_UPDATE_FIELDS: [&str; 2] = ["password", "passwordConfirm"];

#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    pub read: AccessRule,
    pub create: AccessRule,
    pub update: AccessRule,
    pub delete: AccessRule,
}

impl AccessPolicy {
    pub const fn uniform(rule: AccessRule) -> Self {
        Self {
            read: rule,
            create: rule,
            update: rule,
            delete: rule,
        }
    }
}

/// Replaces a reference id with `{id, ..select}` of the referenced document.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceJoin {
    pub field: &'static str,
    pub collection: &'static str,
    pub select: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub enum JoinSpec {
    Reference(ReferenceJoin),
    /// Attaches, under `as_field`, every document of `collection` whose
    /// `foreign_field` references the joined document.
    Virtual {
        as_field: &'static str,
        collection: &'static str,
        foreign_field: &'static str,
        references: &'static [ReferenceJoin],
    },
}

/// Nesting under a parent route, e.g. `/tours/{id}/reviews`.
#[derive(Debug, Clone, Copy)]
pub struct ParentScope {
    /// Path parameter holding the parent id.
    pub param: &'static str,
    /// Field of the child that references the parent.
    pub field: &'static str,
}

#[derive(Debug, Clone)]
pub enum MutationEvent {
    Created { after: Document },
    Updated { before: Document, after: Document },
    Deleted { before: Document },
}

impl MutationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationEvent::Created { .. } => "created",
            MutationEvent::Updated { .. } => "updated",
            MutationEvent::Deleted { .. } => "deleted",
        }
    }
}

/// Receives every committed mutation of a resource. Handlers await all
/// observers before responding.
#[async_trait]
pub trait MutationObserver: Send + Sync {
    async fn on_mutation(&self, event: &MutationEvent) -> Result<(), AppError>;
}

/// Everything the generic handlers need to serve one resource.
pub struct ResourceDescriptor {
    pub schema: ResourceSchema,
    pub access: AccessPolicy,
    pub list_joins: &'static [JoinSpec],
    pub detail_joins: &'static [JoinSpec],
    pub parent: Option<ParentScope>,
    /// Field defaulted to the caller's id on create.
    pub author_field: Option<&'static str>,
    pub observers: Vec<Arc<dyn MutationObserver>>,
}

impl ResourceDescriptor {
    pub fn new(schema: ResourceSchema, access: AccessPolicy) -> Self {
        Self {
            schema,
            access,
            list_joins: &[],
            detail_joins: &[],
            parent: None,
            author_field: None,
            observers: Vec::new(),
        }
    }

    pub fn list_joins(mut self, joins: &'static [JoinSpec]) -> Self {
        self.list_joins = joins;
        self
    }

    pub fn detail_joins(mut self, joins: &'static [JoinSpec]) -> Self {
        self.detail_joins = joins;
        self
    }

    pub fn parent(mut self, scope: ParentScope) -> Self {
        self.parent = Some(scope);
        self
    }

    pub fn author_field(mut self, field: &'static str) -> Self {
        self.author_field = Some(field);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn MutationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn collection(&self) -> &'static str {
        self.schema.name
    }

    /// Projection used whenever the client did not pick fields.
    pub fn default_projection(&self) -> Projection {
        let mut hidden = match Projection::default() {
            Projection::Exclude(fields) => fields,
            Projection::Include(_) => Vec::new(),
        };
        hidden.extend(self.schema.hidden_fields().iter().map(|f| f.to_string()));
        Projection::Exclude(hidden)
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("collection", &self.collection())
            .field("access", &self.access)
            .field("parent", &self.parent)
            .field("observers", &self.observers.len())
            .finish()
    }
}
