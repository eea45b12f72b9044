//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use super::ensure_cart;
use crate::error::{Result, clear_sentry_user};
use crate::middleware::{CurrentOwner, RequireAuth};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;
use crate::store::{ProductsAction, Store, thunks};
use crate::views::LayoutView;

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub layout: LayoutView,
    pub name: String,
    pub email: String,
    pub member_since: String,
    pub collection_count: usize,
}

/// Display account overview page.
///
/// A session whose user no longer exists is discarded and sent to login.
#[instrument(skip(state, session, owner, current_user))]
pub async fn profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current_user): RequireAuth,
    owner: CurrentOwner,
) -> Result<Response> {
    let user = match AuthService::new(state.backend())
        .get_user(current_user.id)
        .await
    {
        Ok(user) => user,
        Err(AuthError::UserNotFound) => {
            tracing::warn!(user_id = %current_user.id, "Session user no longer exists");
            session.flush().await?;
            clear_sentry_user();
            return Ok(Redirect::to("/auth/login").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let mut store = Store::load(&session).await;
    let flash = store.take_flash();
    ensure_cart(&state, &mut store, &owner.owner).await;
    store.dispatch(ProductsAction::Pending);
    store.dispatch(thunks::fetch_collections(state.backend(), &owner.owner).await);

    let template = ProfileTemplate {
        name: current_user.greeting_name().to_owned(),
        email: user.email.to_string(),
        member_since: user.created_at.format("%d/%m/%Y").to_string(),
        collection_count: store.products.collections.len(),
        layout: LayoutView::from_store(&mut store, flash),
    };

    store.save(&session).await?;
    Ok(template.into_response())
}
