use anyhow::Context;
use std::sync::Arc;
use tourdesk_config::{AppConfig, CorsConfig, JwtConfig, QueryConfig};
use tourdesk_core::query::PaginationPolicy;
use tourdesk_core::{DisclosureMode, DocumentStore};

use crate::db::open_store;
use crate::modules::ratings::RatingsMaintainer;
use crate::modules::resources::ResourceDescriptor;
use crate::modules::reviews::review_resource;
use crate::modules::tours::tour_resource;
use crate::modules::users::{AccountClosureNotifier, user_resource};
use crate::utils::notifier::{Notifier, notifier_from_config};

#[derive(Clone, Debug)]
pub struct Resources {
    pub tours: Arc<ResourceDescriptor>,
    pub reviews: Arc<ResourceDescriptor>,
    pub users: Arc<ResourceDescriptor>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub resources: Resources,
    pub ratings: Arc<RatingsMaintainer>,
    pub jwt_config: JwtConfig,
    pub query_config: QueryConfig,
    pub cors_config: CorsConfig,
    pub disclosure: DisclosureMode,
}

impl AppState {
    /// Wires the resources onto `store` and registers their schemas.
    pub async fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        let ratings = Arc::new(RatingsMaintainer::new(store.clone()));
        let resources = Resources {
            tours: Arc::new(tour_resource()),
            reviews: Arc::new(review_resource(ratings.clone())),
            users: Arc::new(user_resource(Arc::new(AccountClosureNotifier::new(
                notifier,
            )))),
        };

        for resource in [&resources.tours, &resources.reviews, &resources.users] {
            store
                .register(&resource.schema)
                .await
                .with_context(|| format!("Failed to register {}", resource.collection()))?;
        }

        let disclosure = if config.environment.is_development() {
            DisclosureMode::Diagnostic
        } else {
            DisclosureMode::Restricted
        };

        Ok(Self {
            store,
            resources,
            ratings,
            jwt_config: config.jwt.clone(),
            query_config: config.query.clone(),
            cors_config: config.cors.clone(),
            disclosure,
        })
    }

    pub fn pagination_policy(&self) -> PaginationPolicy {
        PaginationPolicy {
            default_limit: self.query_config.default_limit,
            max_limit: self.query_config.max_limit,
        }
    }
}

pub async fn init_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store = open_store(&config.storage).await?;
    let notifier = notifier_from_config(&config.email)?;
    AppState::new(store, notifier, config).await
}
