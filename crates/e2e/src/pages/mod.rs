//! Page objects
//!
//! Each page object owns one area's locators and composes the interaction
//! layer into user-level flows. Flows report an [`Outcome`](crate::Outcome);
//! count and query helpers fall back to `0`/empty.

pub mod admin;
pub mod chat;
pub mod login;

pub use admin::{AdminPage, AdminTab, AgentKind, UserRole};
pub use chat::ChatPage;
pub use login::LoginPage;

use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Interval between samples when a page object polls for a UI state
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Restrict a CSS selector to matches containing `text`
pub(crate) fn with_text(selector: &str, text: &str) -> String {
    format!(r#":is({}):has-text("{}")"#, selector, text.replace('"', "\\\""))
}

/// Poll `probe` until it yields true or `timeout` elapses
pub(crate) async fn poll_until<F, Fut>(timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if probe().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}
