//! Chat workbench page

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{poll_until, with_text};
use crate::interaction::{Interactor, Outcome};
use crate::locators::ChatLocators;

/// How long the send button gets to become enabled after typing
const SEND_ENABLE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the just-sent text gets to show up as a user message
const ECHO_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ChatPage {
    ui: Interactor,
    loc: ChatLocators,
}

impl ChatPage {
    pub fn new(ui: Interactor, loc: ChatLocators) -> Self {
        Self { ui, loc }
    }

    pub fn interactor(&self) -> &Interactor {
        &self.ui
    }

    pub fn locators(&self) -> &ChatLocators {
        &self.loc
    }

    pub async fn open(&self) -> Outcome {
        if let Err(e) = self.ui.driver().goto(&self.loc.path).await {
            return Outcome::failure(format!("navigate to {}: {}", self.loc.path, e));
        }
        if self.ui.element_exists(&self.loc.input, self.ui.timeout()).await {
            Outcome::Success
        } else {
            Outcome::failure("chat input did not appear")
        }
    }

    /// Type `text`, send it, and wait until it is rendered as a user message
    pub async fn send_message(&self, text: &str) -> Outcome {
        self.send_message_timed(text).await.0
    }

    /// Like [`send_message`](Self::send_message), also returning when the
    /// send button was clicked; reply latency is measured from that instant.
    pub async fn send_message_timed(&self, text: &str) -> (Outcome, Instant) {
        debug!(len = text.len(), "Sending message");

        if let Err(reason) = self.ui.safe_fill(&self.loc.input, text).await.step("fill chat input") {
            return (Outcome::failure(reason), Instant::now());
        }

        let this = self;
        let enabled = poll_until(SEND_ENABLE_TIMEOUT, move || async move {
            this.ui.driver().is_enabled(&this.loc.send).await.unwrap_or(false)
        })
        .await;
        if !enabled {
            warn!("Send button did not enable, clicking anyway");
        }

        let before = self.user_message_count().await;
        let clicked_at = Instant::now();
        if let Err(reason) = self.ui.safe_click(&self.loc.send).await.step("click send") {
            return (Outcome::failure(reason), clicked_at);
        }

        // a new user node must appear and the latest one must carry the text
        let expected = text.trim();
        let echoed = poll_until(ECHO_TIMEOUT, move || async move {
            let rendered = this.ui.texts_of(&this.loc.user_message).await;
            rendered.len() > before && rendered.last().is_some_and(|t| t.contains(expected))
        })
        .await;

        let outcome = if echoed {
            Outcome::Success
        } else {
            Outcome::failure(format!("sent text not rendered within {:?}", ECHO_TIMEOUT))
        };
        (outcome, clicked_at)
    }

    /// Wait for a non-empty assistant reply with no loading indicator left
    pub async fn wait_for_response(&self, timeout: Duration) -> Outcome {
        let this = self;
        let replied = poll_until(timeout, move || async move {
            let has_text = this
                .last_assistant_message()
                .await
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false);
            has_text && !this.ui.is_visible(&this.loc.loading).await
        })
        .await;

        if replied {
            Outcome::Success
        } else {
            self.ui.screenshot("response_timeout").await;
            Outcome::failure(format!("no assistant response within {:?}", timeout))
        }
    }

    /// Start a fresh conversation and wait for the message list to clear
    pub async fn start_new_chat(&self) -> Outcome {
        info!("Starting new chat");
        if let Err(reason) = self.ui.safe_click(&self.loc.new_chat).await.step("click new chat") {
            return Outcome::failure(reason);
        }

        let this = self;
        if poll_until(self.ui.timeout(), move || async move { this.message_count().await == 0 }).await {
            Outcome::Success
        } else {
            Outcome::failure("message list not cleared")
        }
    }

    pub async fn message_count(&self) -> usize {
        self.ui.count_of(&self.loc.message).await
    }

    pub async fn user_message_count(&self) -> usize {
        self.ui.count_of(&self.loc.user_message).await
    }

    pub async fn assistant_message_count(&self) -> usize {
        self.ui.count_of(&self.loc.assistant_message).await
    }

    pub async fn last_assistant_message(&self) -> Option<String> {
        self.ui.texts_of(&self.loc.assistant_message).await.pop()
    }

    /// Labels offered by the model picker; empty when the picker is absent
    pub async fn available_models(&self) -> Vec<String> {
        if !self.ui.safe_click(&self.loc.model_select).await.is_success() {
            return Vec::new();
        }

        let models = self
            .ui
            .texts_of(&self.loc.model_option)
            .await
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if let Err(e) = self.ui.driver().press(&self.loc.model_select, "Escape").await {
            debug!(error = %e, "Closing model picker failed");
        }
        models
    }

    pub async fn select_model(&self, name: &str) -> Outcome {
        let result = async {
            self.ui.safe_click(&self.loc.model_select).await.step("open model picker")?;
            self.ui
                .safe_click(&with_text(&self.loc.model_option, name))
                .await
                .step("pick model")
        }
        .await;
        result.into()
    }

    /// Pick an agent by the display name shown on its card
    pub async fn select_agent(&self, display_name: &str) -> Outcome {
        self.ui.safe_click(&with_text(&self.loc.agent_card, display_name)).await
    }

    pub async fn session_count(&self) -> usize {
        self.ui.count_of(&self.loc.session_item).await
    }

    pub async fn session_titles(&self) -> Vec<String> {
        self.ui.texts_of(&self.loc.session_item).await
    }

    pub async fn open_session(&self, index: usize) -> Outcome {
        self.ui.safe_click(&nth(&self.loc.session_item, index)).await
    }

    /// Delete the session at `index`, confirming the prompt when one appears
    pub async fn delete_session(&self, index: usize) -> Outcome {
        let before = self.session_count().await;
        if index >= before {
            return Outcome::failure(format!("no session at index {} ({} listed)", index, before));
        }

        if let Err(reason) = self
            .ui
            .safe_click(&nth(&self.loc.session_delete, index))
            .await
            .step("click delete")
        {
            return Outcome::failure(reason);
        }

        if self.ui.element_exists(&self.loc.confirm, Duration::from_secs(1)).await {
            if let Err(reason) = self.ui.safe_click(&self.loc.confirm).await.step("confirm delete") {
                return Outcome::failure(reason);
            }
        }

        let this = self;
        if poll_until(self.ui.timeout(), move || async move { this.session_count().await < before }).await {
            Outcome::Success
        } else {
            Outcome::failure("session list did not shrink")
        }
    }
}

fn nth(selector: &str, index: usize) -> String {
    format!("{} >> nth={}", selector, index)
}
