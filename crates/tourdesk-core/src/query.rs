//! Query features: raw query-string parameters to a storage query descriptor.
//!
//! ```text
//! ?difficulty=easy&price[lte]=500&sort=-ratingsAverage,price&fields=name,price&page=2&limit=10
//! ```
//!
//! becomes a [`QueryDescriptor`] with two predicates, two sort keys, an
//! inclusive projection and `skip = 10, limit = 10`. The pipeline is pure: it
//! never touches storage and never fails. Malformed pagination values fall
//! back to their defaults, unknown fields pass through as literal
//! predicates.
//!
//! The stages mirror each other and may be chained in any order:
//!
//! ```ignore
//! let descriptor = QueryFeatures::new(&raw, &schema)
//!     .scoped(vec![Predicate::eq("tour", tour_id.to_value())])
//!     .filter()
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .build();
//! ```

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::document::{Document, VERSION_FIELD};
use crate::schema::ResourceSchema;

/// Parameters that steer the query instead of filtering it.
pub const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;

/// One query-string value; repeated keys collapse into `Many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    One(String),
    Many(Vec<String>),
}

impl RawValue {
    pub fn first(&self) -> &str {
        match self {
            RawValue::One(v) => v,
            RawValue::Many(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            RawValue::One(v) => vec![v.as_str()],
            RawValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Untrusted query parameters keyed by their literal name (`price[gte]`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery(BTreeMap<String, RawValue>);

impl RawQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a raw query from decoded `key=value` pairs, keeping every
    /// value of a repeated key in arrival order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut query = Self::new();
        for (key, value) in pairs {
            query.push(key, value);
        }
        query
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        self.0
            .entry(key.into())
            .and_modify(|existing| {
                let next = match std::mem::replace(existing, RawValue::Many(Vec::new())) {
                    RawValue::One(first) => RawValue::Many(vec![first, value.clone()]),
                    RawValue::Many(mut all) => {
                        all.push(value.clone());
                        RawValue::Many(all)
                    }
                };
                *existing = next;
            })
            .or_insert_with(|| RawValue::One(value.clone()));
    }

    /// Sets `key` unless the client already supplied it.
    pub fn set_default(&mut self, key: &str, value: &str) {
        self.0
            .entry(key.to_string())
            .or_insert_with(|| RawValue::One(value.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawValue)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
    /// Field equals any element of an array value.
    In,
}

impl FilterOp {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gte" => Some(FilterOp::Gte),
            "gt" => Some(FilterOp::Gt),
            "lte" => Some(FilterOp::Lte),
            "lt" => Some(FilterOp::Lt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Evaluates the predicate against a document. Missing and null fields
    /// never match; equality is exact, without type coercion.
    pub fn matches(&self, document: &Document) -> bool {
        let actual = match document.get(&self.field) {
            Some(Value::Null) | None => return false,
            Some(v) => v,
        };

        match self.op {
            FilterOp::Eq => actual == self.value,
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|options| options.contains(&actual)),
            FilterOp::Gte => ordered(&actual, &self.value).is_some_and(Ordering::is_ge),
            FilterOp::Gt => ordered(&actual, &self.value).is_some_and(Ordering::is_gt),
            FilterOp::Lte => ordered(&actual, &self.value).is_some_and(Ordering::is_le),
            FilterOp::Lt => ordered(&actual, &self.value).is_some_and(Ordering::is_lt),
        }
    }
}

/// True when the document satisfies every predicate.
pub fn matches_all(document: &Document, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|p| p.matches(document))
}

/// Range comparison: numbers numerically, strings lexicographically,
/// anything else is incomparable.
fn ordered(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order used for sorting: null < bool < number < string < array < object.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Stable multi-key sort; documents equal on every key keep their order.
pub fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = compare_values(a.get(&key.field).as_ref(), b.get(&key.field).as_ref());
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Only these fields (plus the id).
    Include(Vec<String>),
    /// Everything except these fields.
    Exclude(Vec<String>),
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Exclude(vec![VERSION_FIELD.to_string()])
    }
}

impl Projection {
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Projection::Include(fields) => fields.iter().any(|f| f == field),
            Projection::Exclude(fields) => !fields.iter().any(|f| f == field),
        }
    }
}

/// Immutable description of one storage query. Stores apply the filter,
/// then the sort (falling back to insertion order), then `skip`/`limit`.
/// Projection is applied by the caller when rendering documents.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub filter: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl QueryDescriptor {
    /// Every document matching `filter`, in storage order.
    pub fn unbounded(filter: Vec<Predicate>) -> Self {
        Self {
            filter,
            sort: Vec::new(),
            projection: Projection::default(),
            skip: 0,
            limit: None,
        }
    }
}

/// Pagination defaults and the server-side cap on `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationPolicy {
    pub default_limit: u64,
    /// `None` leaves `limit` uncapped.
    pub max_limit: Option<u64>,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: None,
        }
    }
}

pub struct QueryFeatures<'a> {
    raw: &'a RawQuery,
    schema: &'a ResourceSchema,
    policy: PaginationPolicy,
    scope: Vec<Predicate>,
    filter: Vec<Predicate>,
    sort: Vec<SortKey>,
    projection: Option<Projection>,
    skip: u64,
    limit: Option<u64>,
}

impl<'a> QueryFeatures<'a> {
    pub fn new(raw: &'a RawQuery, schema: &'a ResourceSchema) -> Self {
        Self {
            raw,
            schema,
            policy: PaginationPolicy::default(),
            scope: Vec::new(),
            filter: Vec::new(),
            sort: Vec::new(),
            projection: None,
            skip: 0,
            limit: None,
        }
    }

    pub fn with_policy(mut self, policy: PaginationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Forced predicates that always apply, whatever the client sent.
    pub fn scoped(mut self, scope: Vec<Predicate>) -> Self {
        self.scope = scope;
        self
    }

    pub fn filter(mut self) -> Self {
        let (raw, schema) = (self.raw, self.schema);
        let mut predicates = Vec::new();

        for (key, value) in raw.iter() {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }

            let (field, op) = split_operator(key);
            if let Some(spec) = schema.field_spec(field) {
                if !spec.filterable {
                    debug!(field, "dropping predicate on non-filterable field");
                    continue;
                }
            }

            let coerce = |raw: &str| match schema.field_spec(field) {
                Some(spec) => spec.coerce_query_value(raw),
                None => Value::String(raw.to_string()),
            };

            match (op, value) {
                (FilterOp::Eq, RawValue::Many(values)) => {
                    let options = values.iter().map(|v| coerce(v)).collect();
                    predicates.push(Predicate::new(field, FilterOp::In, Value::Array(options)));
                }
                (op, value) => {
                    for raw in value.all() {
                        predicates.push(Predicate::new(field, op, coerce(raw)));
                    }
                }
            }
        }

        self.filter = predicates;
        self
    }

    pub fn sort(mut self) -> Self {
        self.sort = match self.raw.get("sort") {
            Some(value) => value
                .all()
                .join(",")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty() && *s != "-")
                .map(|s| match s.strip_prefix('-') {
                    Some(field) => SortKey::desc(field),
                    None => SortKey::asc(s),
                })
                .collect(),
            None => Vec::new(),
        };
        self
    }

    pub fn limit_fields(mut self) -> Self {
        let requested: Vec<String> = self
            .raw
            .get("fields")
            .map(|value| {
                value
                    .all()
                    .join(",")
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let (excluded, included): (Vec<String>, Vec<String>) =
            requested.into_iter().partition(|f| f.starts_with('-'));

        self.projection = Some(if !included.is_empty() {
            Projection::Include(included)
        } else {
            let mut hidden: Vec<String> = excluded
                .iter()
                .map(|f| f.trim_start_matches('-').to_string())
                .filter(|f| !f.is_empty())
                .collect();
            hidden.push(VERSION_FIELD.to_string());
            hidden.extend(self.schema.hidden_fields().iter().map(|f| f.to_string()));
            Projection::Exclude(hidden)
        });
        self
    }

    pub fn paginate(mut self) -> Self {
        let page = positive_param(self.raw, "page").unwrap_or(DEFAULT_PAGE);
        let mut limit = positive_param(self.raw, "limit").unwrap_or(self.policy.default_limit);

        if let Some(max) = self.policy.max_limit {
            if limit > max {
                debug!(requested = limit, cap = max, "clamping query limit");
                limit = max;
            }
        }

        self.skip = (page - 1).saturating_mul(limit);
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> QueryDescriptor {
        let mut filter = self.scope;
        filter.extend(self.filter);

        let projection = self.projection.unwrap_or_else(|| {
            let mut hidden = vec![VERSION_FIELD.to_string()];
            hidden.extend(self.schema.hidden_fields().iter().map(|f| f.to_string()));
            Projection::Exclude(hidden)
        });

        QueryDescriptor {
            filter,
            sort: self.sort,
            projection,
            skip: self.skip,
            limit: self.limit,
        }
    }
}

/// `price[gte]` → (`price`, Gte). Unrecognized operators keep the whole key
/// as a literal field name.
fn split_operator(key: &str) -> (&str, FilterOp) {
    if let Some((field, rest)) = key.split_once('[') {
        if let Some(op) = rest.strip_suffix(']').and_then(FilterOp::from_suffix) {
            if !field.is_empty() {
                return (field, op);
            }
        }
    }
    (key, FilterOp::Eq)
}

fn positive_param(raw: &RawQuery, key: &str) -> Option<u64> {
    raw.get(key)
        .and_then(|v| v.first().trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}
