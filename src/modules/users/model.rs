use serde_json::json;
use std::sync::Arc;
use tourdesk_auth::Role;
use tourdesk_core::{FieldSpec, FieldType, ResourceSchema};

use crate::middleware::auth::AccessRule;
use crate::modules::resources::{AccessPolicy, MutationObserver, ResourceDescriptor};

pub const ROLES: &[&str] = &["user", "guide", "lead-guide", "admin"];

pub fn user_schema() -> ResourceSchema {
    ResourceSchema::new("users")
        .field(FieldSpec::new("name", FieldType::String).required("Please tell us your name!"))
        .field(
            FieldSpec::new("email", FieldType::String)
                .required("Please provide your email")
                .unique(),
        )
        .field(FieldSpec::new("photo", FieldType::String).default_value(json!("default.jpg")))
        .field(FieldSpec::new("role", FieldType::Enum(ROLES)).default_value(json!("user")))
        .field(
            FieldSpec::new("active", FieldType::Boolean)
                .managed()
                .default_value(json!(true))
                .hidden()
                .unfilterable(),
        )
}

pub fn user_resource(on_close: Arc<dyn MutationObserver>) -> ResourceDescriptor {
    ResourceDescriptor::new(
        user_schema(),
        AccessPolicy::uniform(AccessRule::Roles(&[Role::Admin])),
    )
    .observer(on_close)
}
