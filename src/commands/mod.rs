//! Command surface shared by every front end.
//!
//! Each command is an `async fn` over `Arc<CoreState>` that runs its SQLite and
//! file work on the blocking pool and reports errors as display strings.

pub mod attachments;
pub mod export;
pub mod users;
pub mod visits;

use std::sync::Arc;

use crate::core_state::CoreState;

/// Liveness check for front ends.
pub fn health_check() -> String {
    tracing::debug!("Health check called");
    "ok".to_string()
}

/// Run `f` on the blocking pool with a clone of the shared state.
pub(crate) async fn run_blocking<T, F>(state: &Arc<CoreState>, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&CoreState) -> Result<T, String> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| format!("Task failed: {e}"))?
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::core_state::CoreState;
    use crate::users;

    /// State rooted in a temp dir with `alice` created and selected.
    pub fn state_with_user() -> (tempfile::TempDir, Arc<CoreState>) {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(AppConfig::rooted_at(&dir.path().join("app")));
        users::create_user(&state.config.data_dir, "alice").unwrap();
        state.select_user("alice").unwrap();
        (dir, Arc::new(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_is_ok() {
        assert_eq!(health_check(), "ok");
    }

    #[tokio::test]
    async fn run_blocking_passes_errors_through() {
        let (_dir, state) = test_support::state_with_user();
        let user = run_blocking(&state, |s| s.active_user().map_err(|e| e.to_string()))
            .await
            .unwrap();
        assert_eq!(user, "alice");

        let err = run_blocking::<(), _>(&state, |_| Err("boom".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
    }
}
