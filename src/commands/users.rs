use std::sync::Arc;

use crate::core_state::CoreState;
use crate::users;

use super::run_blocking;

pub async fn list_users(state: &Arc<CoreState>) -> Result<Vec<String>, String> {
    run_blocking(state, |s| {
        users::list_users(&s.config.data_dir).map_err(|e| e.to_string())
    })
    .await
}

/// Create a user and make them the active one.
pub async fn create_user(state: &Arc<CoreState>, name: String) -> Result<(), String> {
    run_blocking(state, move |s| {
        users::create_user(&s.config.data_dir, &name).map_err(|e| e.to_string())?;
        s.select_user(&name).map_err(|e| e.to_string())
    })
    .await
}

pub async fn select_user(state: &Arc<CoreState>, name: String) -> Result<(), String> {
    run_blocking(state, move |s| s.select_user(&name).map_err(|e| e.to_string())).await
}

pub async fn active_user(state: &Arc<CoreState>) -> Result<Option<String>, String> {
    run_blocking(state, |s| match s.active_user() {
        Ok(name) => Ok(Some(name)),
        Err(crate::core_state::CoreError::NoActiveUser) => Ok(None),
        Err(e) => Err(e.to_string()),
    })
    .await
}

/// Delete a user with all their records and files. Deselects them if active.
pub async fn delete_user(state: &Arc<CoreState>, name: String) -> Result<(), String> {
    run_blocking(state, move |s| {
        if s.active_user().ok().as_deref() == Some(name.as_str()) {
            s.clear_user().map_err(|e| e.to_string())?;
        }
        users::delete_user(&s.config.data_dir, &s.config.archive.archive_root, &name)
            .map_err(|e| e.to_string())
    })
    .await
}
