use std::sync::Arc;
use tourdesk_auth::Role;
use tourdesk_core::{FieldSpec, FieldType, ResourceSchema};

use crate::middleware::auth::AccessRule;
use crate::modules::resources::{
    AccessPolicy, JoinSpec, MutationObserver, ParentScope, ReferenceJoin, ResourceDescriptor,
};

const REVIEW_LIST_JOINS: &[JoinSpec] = &[JoinSpec::Reference(ReferenceJoin {
    field: "user",
    collection: "users",
    select: &["name", "photo"],
})];

pub fn review_schema() -> ResourceSchema {
    ResourceSchema::new("reviews")
        .field(FieldSpec::new("review", FieldType::String).required("Review cannot be empty"))
        .field(
            FieldSpec::new("rating", FieldType::Integer)
                .required("Review must has a rating")
                .range(1.0, 5.0),
        )
        .field(
            FieldSpec::new("tour", FieldType::Reference("tours"))
                .required("Review must belong to a tour."),
        )
        .field(
            FieldSpec::new("user", FieldType::Reference("users"))
                .required("Review must belong to a user."),
        )
        .unique_together(&["tour", "user"])
}

/// Reviews, nested under `/tours/{id}/reviews` and feeding the tour's
/// rating summary through `ratings`.
pub fn review_resource(ratings: Arc<dyn MutationObserver>) -> ResourceDescriptor {
    ResourceDescriptor::new(
        review_schema(),
        AccessPolicy {
            read: AccessRule::Authenticated,
            create: AccessRule::Roles(&[Role::User]),
            update: AccessRule::Roles(&[Role::User, Role::Admin]),
            delete: AccessRule::Roles(&[Role::User, Role::Admin]),
        },
    )
    .list_joins(REVIEW_LIST_JOINS)
    .detail_joins(REVIEW_LIST_JOINS)
    .parent(ParentScope {
        param: "id",
        field: "tour",
    })
    .author_field("user")
    .observer(ratings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rating_out_of_range_and_missing_review() {
        let payload = json!({
            "rating": 6,
            "tour": "00000000-0000-0000-0000-000000000001",
            "user": "00000000-0000-0000-0000-000000000002"
        });
        let errors = review_schema()
            .validate_create(payload.as_object().unwrap())
            .unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("rating"));
        assert!(fields.contains_key("review"));
    }

    #[test]
    fn test_missing_rating_message() {
        let payload = json!({ "review": "Great", "tour": "00000000-0000-0000-0000-000000000001", "user": "00000000-0000-0000-0000-000000000002" });
        let errors = review_schema()
            .validate_create(payload.as_object().unwrap())
            .unwrap_err();
        let message = errors.field_errors()["rating"][0].message.clone().unwrap();
        assert_eq!(message, "Review must has a rating");
    }

    #[test]
    fn test_one_review_per_tour_and_user() {
        assert!(
            review_schema()
                .unique_constraints()
                .contains(&vec!["tour", "user"])
        );
    }
}
