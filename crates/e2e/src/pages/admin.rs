//! Admin panel page

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{poll_until, with_text};
use crate::interaction::{Interactor, Outcome};
use crate::locators::AdminLocators;

/// How long a validation error gets to render after submitting a form
const FORM_ERROR_PROBE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    Users,
    Agents,
    Knowledge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    /// Option label in the role select
    pub fn option_label(&self) -> &'static str {
        match self {
            UserRole::Admin => "管理员",
            UserRole::User => "普通用户",
        }
    }
}

/// Agent flavour offered by the creation form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Knowledge-base augmented
    Rag,
    Tool,
}

impl AgentKind {
    /// `rag` selects the knowledge-base type; every other value is a tool agent
    pub fn parse(value: &str) -> Self {
        if value == "rag" {
            AgentKind::Rag
        } else {
            AgentKind::Tool
        }
    }

    pub fn option_label(&self) -> &'static str {
        match self {
            AgentKind::Rag => "知识库增强型",
            AgentKind::Tool => "工具型",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Rag => write!(f, "rag"),
            AgentKind::Tool => write!(f, "tool"),
        }
    }
}

pub struct AdminPage {
    ui: Interactor,
    loc: AdminLocators,
}

impl AdminPage {
    pub fn new(ui: Interactor, loc: AdminLocators) -> Self {
        Self { ui, loc }
    }

    /// Enter the admin panel through its affordance, or by URL when hidden
    pub async fn open(&self) -> Outcome {
        if self.ui.is_visible(&self.loc.entry).await {
            if let Err(reason) = self.ui.safe_click(&self.loc.entry).await.step("open admin panel") {
                return Outcome::failure(reason);
            }
        } else if let Err(e) = self.ui.driver().goto("/admin").await {
            return Outcome::failure(format!("navigate to /admin: {}", e));
        }

        if self.ui.element_exists(&self.loc.users_tab, self.ui.timeout()).await {
            Outcome::Success
        } else {
            Outcome::failure("admin tabs did not appear")
        }
    }

    pub async fn open_tab(&self, tab: AdminTab) -> Outcome {
        let selector = match tab {
            AdminTab::Users => &self.loc.users_tab,
            AdminTab::Agents => &self.loc.agents_tab,
            AdminTab::Knowledge => &self.loc.knowledge_tab,
        };
        self.ui.safe_click(selector).await
    }

    pub async fn create_user(&self, username: &str, password: &str, role: UserRole) -> Outcome {
        info!(username, ?role, "Creating user");

        let submitted = async {
            self.open_tab(AdminTab::Users).await.step("open users tab")?;
            self.ui.safe_click(&self.loc.create_user).await.step("open create-user form")?;
            self.ui.safe_fill(&self.loc.user_username, username).await.step("fill username")?;
            self.ui.safe_fill(&self.loc.user_password, password).await.step("fill password")?;
            self.ui
                .safe_select(&self.loc.user_role, role.option_label())
                .await
                .step("select role")?;
            self.ui.safe_click(&self.loc.submit).await.step("submit")
        }
        .await;

        self.finish(submitted, &self.loc.user_row, username, "create_user").await
    }

    pub async fn user_count(&self) -> usize {
        self.ui.count_of(&self.loc.user_row).await
    }

    pub async fn create_agent(&self, name: &str, display_name: &str, kind: AgentKind) -> Outcome {
        info!(name, %kind, "Creating agent");

        let submitted = async {
            self.open_tab(AdminTab::Agents).await.step("open agents tab")?;
            self.ui.safe_click(&self.loc.create_agent).await.step("open create-agent form")?;
            self.ui.safe_fill(&self.loc.agent_name, name).await.step("fill name")?;
            self.ui
                .safe_fill(&self.loc.agent_display_name, display_name)
                .await
                .step("fill display name")?;
            self.ui
                .safe_select(&self.loc.agent_type, kind.option_label())
                .await
                .step("select type")?;
            self.ui.safe_click(&self.loc.submit).await.step("submit")
        }
        .await;

        self.finish(submitted, &self.loc.agent_row, display_name, "create_agent").await
    }

    pub async fn agent_count(&self) -> usize {
        self.ui.count_of(&self.loc.agent_row).await
    }

    /// Settle a submitted form: a rendered validation error wins, otherwise
    /// the new row has to appear in the table
    async fn finish(&self, submitted: Result<(), String>, row: &str, label: &str, artifact: &str) -> Outcome {
        if let Err(reason) = submitted {
            warn!(%reason, "{} aborted", artifact);
            self.ui.screenshot(&format!("{}_failed", artifact)).await;
            return Outcome::failure(reason);
        }

        if self.ui.element_exists(&self.loc.form_error, FORM_ERROR_PROBE).await {
            let message = self
                .ui
                .texts_of(&self.loc.form_error)
                .await
                .into_iter()
                .find(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "form rejected".to_string());
            self.ui.screenshot(&format!("{}_rejected", artifact)).await;
            return Outcome::failure(message);
        }

        let row = with_text(row, label);
        let ui = &self.ui;
        let row = row.as_str();
        if poll_until(ui.timeout(), move || async move { ui.is_visible(row).await }).await {
            Outcome::Success
        } else {
            self.ui.screenshot(&format!("{}_missing", artifact)).await;
            Outcome::failure(format!("'{}' not listed after submit", label))
        }
    }
}
