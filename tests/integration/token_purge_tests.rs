//! Expired token cleanup

use std::time::Duration;

use greenlight::{
    db::{token_repository, TokenRepository},
    models::TokenScope,
    AppState,
};

use crate::common::{expired_token, issue_token, TestApp, UserFactory};

async fn token_count(state: &AppState) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
        .fetch_one(&state.db)
        .await
        .expect("count tokens")
}

#[tokio::test]
async fn test_delete_expired_keeps_live_tokens() {
    let app = TestApp::new().await;
    let user = UserFactory::new(&app.state).activated().create().await;
    expired_token(&app.state, user.id).await;
    expired_token(&app.state, user.id).await;
    let live = issue_token(&app.state, user.id, TokenScope::Authentication).await;

    let purged = TokenRepository::new(&app.state.db)
        .delete_expired()
        .await
        .unwrap();

    assert_eq!(purged, 2);
    assert_eq!(token_count(&app.state).await, 1);
    app.get_auth("/v1/healthcheck", &live).await.assert_ok();
}

#[tokio::test]
async fn test_purge_task_sweeps_expired_tokens() {
    let app = TestApp::new().await;
    let user = UserFactory::new(&app.state).create().await;
    expired_token(&app.state, user.id).await;

    let purge = token_repository::spawn_expired_purge(app.state.db.clone(), Duration::from_millis(20));

    let mut remaining = token_count(&app.state).await;
    for _ in 0..50 {
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        remaining = token_count(&app.state).await;
    }
    purge.abort();

    assert_eq!(remaining, 0);
}
