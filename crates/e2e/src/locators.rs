//! Selector registry
//!
//! Test ids come first in every selector list; the CSS and text fallbacks
//! keep the suite working against builds that do not render test ids.
//! Any selector can be overridden from the harness config file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Locators {
    pub login: LoginLocators,
    pub chat: ChatLocators,
    pub admin: AdminLocators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginLocators {
    pub path: String,
    pub form: String,
    pub username: String,
    pub password: String,
    pub submit: String,
    pub error: String,
    /// Any of these being visible means the session is authenticated
    pub logged_in_markers: Vec<String>,
    pub user_menu: String,
    pub logout: String,
}

impl Default for LoginLocators {
    fn default() -> Self {
        Self {
            path: "/login".to_string(),
            form: r#"[data-testid="login-form"], form.login-form"#.to_string(),
            username: r#"[data-testid="username-input"], input[name="username"]"#.to_string(),
            password: r#"[data-testid="password-input"], input[type="password"]"#.to_string(),
            submit: r#"[data-testid="login-button"], button[type="submit"]"#.to_string(),
            error: r#"[data-testid="login-error"], .ant-message-error, .error-message"#.to_string(),
            logged_in_markers: vec![
                "text=工作台".to_string(),
                r#"[data-testid="admin-panel-button"]"#.to_string(),
                r#"[data-testid="sidebar"], .sidebar"#.to_string(),
            ],
            user_menu: r#"[data-testid="user-menu"], .user-avatar"#.to_string(),
            logout: r#"[data-testid="logout-button"], :text("退出登录")"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatLocators {
    pub path: String,
    pub input: String,
    pub send: String,
    pub new_chat: String,
    /// Every rendered message, both roles
    pub message: String,
    pub user_message: String,
    pub assistant_message: String,
    pub loading: String,
    pub model_select: String,
    pub model_option: String,
    pub agent_card: String,
    pub session_item: String,
    pub session_delete: String,
    pub confirm: String,
}

impl Default for ChatLocators {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            input: r#"[data-testid="chat-input"], textarea"#.to_string(),
            send: r#"[data-testid="send-button"]"#.to_string(),
            new_chat: r#"[data-testid="new-chat-button"], :text("新建对话")"#.to_string(),
            message: "[data-role]".to_string(),
            user_message: r#"[data-role="user"]"#.to_string(),
            assistant_message: r#"[data-role="assistant"]"#.to_string(),
            loading: r#"[data-testid="message-loading"], .typing-indicator"#.to_string(),
            model_select: r#"[data-testid="model-select"]"#.to_string(),
            model_option: r#"[data-testid="model-option"], .ant-select-item-option"#.to_string(),
            agent_card: r#"[data-testid="agent-card"]"#.to_string(),
            session_item: r#"[data-testid="session-item"]"#.to_string(),
            session_delete: r#"[data-testid="delete-session-button"]"#.to_string(),
            confirm: r#"[data-testid="confirm-button"], .ant-popconfirm-buttons .ant-btn-primary"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminLocators {
    pub entry: String,
    pub users_tab: String,
    pub agents_tab: String,
    pub knowledge_tab: String,
    pub create_user: String,
    pub user_username: String,
    pub user_password: String,
    pub user_role: String,
    pub user_row: String,
    pub create_agent: String,
    pub agent_name: String,
    pub agent_display_name: String,
    pub agent_type: String,
    pub agent_row: String,
    pub submit: String,
    pub form_error: String,
}

impl Default for AdminLocators {
    fn default() -> Self {
        Self {
            entry: r#"[data-testid="admin-panel-button"]"#.to_string(),
            users_tab: r#"button:has-text("用户管理")"#.to_string(),
            agents_tab: r#"button:has-text("智能体管理")"#.to_string(),
            knowledge_tab: r#"button:has-text("知识库管理")"#.to_string(),
            create_user: r#"[data-testid="create-user-button"], button:has-text("创建用户")"#.to_string(),
            user_username: r#"[data-testid="user-username-input"]"#.to_string(),
            user_password: r#"[data-testid="user-password-input"]"#.to_string(),
            user_role: r#"[data-testid="user-role-select"]"#.to_string(),
            user_row: r#"[data-testid="user-row"]"#.to_string(),
            create_agent: r#"[data-testid="create-agent-button"], button:has-text("创建智能体")"#.to_string(),
            agent_name: r#"[data-testid="agent-name-input"]"#.to_string(),
            agent_display_name: r#"[data-testid="agent-display-name-input"]"#.to_string(),
            agent_type: r#"[data-testid="agent-type-select"]"#.to_string(),
            agent_row: r#"[data-testid="agent-row"]"#.to_string(),
            submit: r#"[data-testid="form-submit-button"], button:has-text("确定")"#.to_string(),
            form_error: r#"[data-testid="form-error"], .ant-form-item-explain-error"#.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let yaml = r#"
chat:
  send: '#send'
"#;
        let locators: Locators = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(locators.chat.send, "#send");
        assert_eq!(locators.chat.user_message, r#"[data-role="user"]"#);
        assert_eq!(locators.login.logged_in_markers.len(), 3);
    }
}
