//! Administrative commands behind `tourdesk-cli`.

use anyhow::{Context, anyhow, bail};
use serde_json::Value;
use std::path::Path;
use tourdesk_auth::{Role, create_access_token};
use tourdesk_config::JwtConfig;
use tracing::info;
use uuid::Uuid;

use crate::modules::resources::ResourceService;
use crate::state::AppState;

/// Creates every tour of a JSON array through the regular validation path.
/// Stops at the first invalid tour; earlier ones stay imported.
pub async fn import_tours(state: &AppState, raw: &str) -> anyhow::Result<usize> {
    let tours: Vec<Value> = serde_json::from_str(raw).context("Tour file must be a JSON array")?;
    let imported = tours.len();

    for (index, tour) in tours.into_iter().enumerate() {
        let Value::Object(payload) = tour else {
            bail!("tour #{index} is not a JSON object");
        };
        ResourceService::create_one(
            state.store.clone(),
            state.resources.tours.clone(),
            payload,
        )
        .await
        .map_err(|err| anyhow!("tour #{index}: {}", err.message))?;
    }

    info!(imported, "tours imported");
    Ok(imported)
}

pub async fn import_tours_file(state: &AppState, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    import_tours(state, &raw).await
}

pub async fn delete_tours(state: &AppState) -> anyhow::Result<u64> {
    let deleted = state
        .store
        .delete_all(state.resources.tours.collection())
        .await
        .context("Failed to delete tours")?;
    info!(deleted, "tours deleted");
    Ok(deleted)
}

pub async fn reconcile_ratings(state: &AppState) -> anyhow::Result<usize> {
    state
        .ratings
        .reconcile_all()
        .await
        .map_err(|err| anyhow!("Failed to reconcile ratings: {}", err.message))
}

pub fn issue_token(user_id: Uuid, role: Role, config: &JwtConfig) -> anyhow::Result<String> {
    create_access_token(user_id, role, config).context("Failed to issue token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tourdesk_auth::verify_token;
    use tourdesk_config::AppConfig;
    use tourdesk_db::MemoryStore;

    use crate::utils::notifier::LogNotifier;

    async fn state() -> AppState {
        let config = AppConfig::from_lookup(|_| None);
        AppState::new(Arc::new(MemoryStore::new()), Arc::new(LogNotifier), &config)
            .await
            .unwrap()
    }

    const TOURS: &str = r#"[
        {
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg"
        },
        {
            "name": "The Sea Explorer",
            "duration": 7,
            "maxGroupSize": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
            "imageCover": "tour-2-cover.jpg"
        }
    ]"#;

    #[tokio::test]
    async fn test_import_then_delete() {
        let state = state().await;
        assert_eq!(import_tours(&state, TOURS).await.unwrap(), 2);
        assert_eq!(delete_tours(&state).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_import_reports_invalid_tour() {
        let state = state().await;
        let err = import_tours(&state, r#"[{ "name": "Too short" }]"#)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("tour #0: Invalid input data"));
    }

    #[tokio::test]
    async fn test_reconcile_counts_tours() {
        let state = state().await;
        import_tours(&state, TOURS).await.unwrap();
        assert_eq!(reconcile_ratings(&state).await.unwrap(), 2);
    }

    #[test]
    fn test_issued_token_verifies() {
        let config = JwtConfig::from_lookup(&|_: &str| None);
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, Role::LeadGuide, &config).unwrap();
        let principal = verify_token(&token, &config).unwrap().principal().unwrap();
        assert_eq!(principal.id, user_id);
        assert_eq!(principal.role, Role::LeadGuide);
    }
}
