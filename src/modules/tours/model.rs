use serde_json::json;
use tourdesk_auth::Role;
use tourdesk_core::{FieldSpec, FieldType, ResourceSchema};

use crate::middleware::auth::AccessRule;
use crate::modules::ratings::NEUTRAL_RATING;
use crate::modules::resources::{
    AccessPolicy, JoinSpec, ReferenceJoin, ResourceDescriptor,
};

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

/// Query parameters prefilled by `GET /tours/top-5-cheap`.
pub const TOP_FIVE_CHEAP: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "-ratingsAverage,price"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

const TOUR_DETAIL_JOINS: &[JoinSpec] = &[JoinSpec::Virtual {
    as_field: "reviews",
    collection: "reviews",
    foreign_field: "tour",
    references: &[ReferenceJoin {
        field: "user",
        collection: "users",
        select: &["name", "photo"],
    }],
}];

pub fn tour_schema() -> ResourceSchema {
    ResourceSchema::new("tours")
        .field(
            FieldSpec::new("name", FieldType::String)
                .required("A tour must have a name")
                .length(10, 40)
                .unique(),
        )
        .field(FieldSpec::new("duration", FieldType::Number).required("A tour must have a duration"))
        .field(
            FieldSpec::new("maxGroupSize", FieldType::Integer)
                .required("A tour must have a group size"),
        )
        .field(
            FieldSpec::new("difficulty", FieldType::Enum(DIFFICULTIES))
                .required("A tour must have a difficulty"),
        )
        .field(FieldSpec::new("price", FieldType::Number).required("A tour must have a price"))
        .field(FieldSpec::new("priceDiscount", FieldType::Number))
        .field(FieldSpec::new("summary", FieldType::String).required("A tour must have a summary"))
        .field(FieldSpec::new("description", FieldType::String))
        .field(
            FieldSpec::new("imageCover", FieldType::String)
                .required("A tour must have a cover image"),
        )
        .field(FieldSpec::new("images", FieldType::StringList))
        .field(FieldSpec::new("startDates", FieldType::StringList))
        .field(
            FieldSpec::new("secretTour", FieldType::Boolean)
                .default_value(json!(false))
                .hidden(),
        )
        .field(
            FieldSpec::new("ratingsQuantity", FieldType::Integer)
                .managed()
                .default_value(json!(0)),
        )
        .field(
            FieldSpec::new("ratingsAverage", FieldType::Number)
                .managed()
                .default_value(json!(NEUTRAL_RATING)),
        )
}

pub fn tour_resource() -> ResourceDescriptor {
    let staff = AccessRule::Roles(&[Role::Admin, Role::LeadGuide]);

    ResourceDescriptor::new(
        tour_schema(),
        AccessPolicy {
            read: AccessRule::Public,
            create: staff,
            update: staff,
            delete: staff,
        },
    )
    .detail_joins(TOUR_DETAIL_JOINS)
}
