//! Auth slice: who is signed in and the last auth error.

use serde::{Deserialize, Serialize};

use super::Status;
use crate::models::CurrentUser;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthState {
    pub status: Status,
    pub user: Option<CurrentUser>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AuthAction {
    Pending,
    SignedIn(CurrentUser),
    SignedOut,
    /// A reset mail was requested; the UI shows the same notice either way.
    ResetRequested,
    Rejected(String),
}

impl AuthState {
    pub fn reduce(&mut self, action: AuthAction) {
        match action {
            AuthAction::Pending => {
                self.status = Status::Loading;
                self.error = None;
            }
            AuthAction::SignedIn(user) => {
                self.status = Status::Succeeded;
                self.user = Some(user);
                self.error = None;
            }
            AuthAction::SignedOut => {
                self.status = Status::Idle;
                self.user = None;
                self.error = None;
            }
            AuthAction::ResetRequested => {
                self.status = Status::Succeeded;
                self.error = None;
            }
            AuthAction::Rejected(message) => {
                self.status = Status::Failed;
                self.error = Some(message);
            }
        }
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Take the error for a one-time flash on the next render.
    pub const fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}
