//! Login page

use std::time::Duration;

use tracing::{info, warn};

use super::poll_until;
use crate::interaction::{Interactor, Outcome};
use crate::locators::LoginLocators;

/// How long the optional user menu gets to show up before logout
const USER_MENU_PROBE: Duration = Duration::from_secs(1);

pub struct LoginPage {
    ui: Interactor,
    loc: LoginLocators,
}

impl LoginPage {
    pub fn new(ui: Interactor, loc: LoginLocators) -> Self {
        Self { ui, loc }
    }

    /// Navigate to the login route and wait for the form
    pub async fn open(&self) -> Outcome {
        if let Err(e) = self.ui.driver().goto(&self.loc.path).await {
            return Outcome::failure(format!("navigate to {}: {}", self.loc.path, e));
        }
        if self.ui.element_exists(&self.loc.form, self.ui.timeout()).await
            || self.ui.element_exists(&self.loc.username, self.ui.timeout()).await
        {
            Outcome::Success
        } else {
            Outcome::failure("login form did not appear")
        }
    }

    /// Fill the credentials, submit, and wait for any logged-in marker
    pub async fn login(&self, username: &str, password: &str) -> Outcome {
        info!(username, "Logging in");

        if !self.ui.is_visible(&self.loc.username).await {
            if let Err(reason) = self.open().await.step("open login page") {
                self.ui.screenshot("login_failed").await;
                return Outcome::failure(reason);
            }
        }

        let submitted: Outcome = async {
            self.ui.safe_fill(&self.loc.username, username).await.step("fill username")?;
            self.ui.safe_fill(&self.loc.password, password).await.step("fill password")?;
            self.ui.safe_click(&self.loc.submit).await.step("submit")
        }
        .await
        .into();

        if !submitted.is_success() {
            self.ui.screenshot("login_failed").await;
            return submitted;
        }

        if poll_until(self.ui.timeout(), || self.is_logged_in()).await {
            self.ui.screenshot("login_success").await;
            return Outcome::Success;
        }

        self.ui.screenshot("login_failed").await;
        let reason = match self.error_message().await {
            Some(message) => format!("login rejected: {}", message),
            None => format!("no logged-in marker within {:?}", self.ui.timeout()),
        };
        warn!(username, %reason, "Login failed");
        Outcome::failure(reason)
    }

    /// Whether any logged-in marker is currently visible
    pub async fn is_logged_in(&self) -> bool {
        for marker in &self.loc.logged_in_markers {
            if self.ui.is_visible(marker).await {
                return true;
            }
        }
        false
    }

    /// Log out and wait for the login form to come back
    pub async fn logout(&self) -> Outcome {
        if self.ui.element_exists(&self.loc.user_menu, USER_MENU_PROBE).await {
            if let Err(reason) = self.ui.safe_click(&self.loc.user_menu).await.step("open user menu") {
                return Outcome::failure(reason);
            }
        }

        if let Err(reason) = self.ui.safe_click(&self.loc.logout).await.step("click logout") {
            return Outcome::failure(reason);
        }

        if self.ui.element_exists(&self.loc.username, self.ui.timeout()).await {
            Outcome::Success
        } else {
            Outcome::failure("login form did not reappear after logout")
        }
    }

    /// Text of the visible login error, if any
    pub async fn error_message(&self) -> Option<String> {
        if !self.ui.is_visible(&self.loc.error).await {
            return None;
        }
        self.ui
            .texts_of(&self.loc.error)
            .await
            .into_iter()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
    }
}
