//! Conversation sessions through the API and the sidebar

use std::time::Duration;

use workbench_e2e::{ensure, skip, Area, E2eError, E2eResult, Scenario, ScenarioContext};

use super::unique;

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("sessions::api_list", Area::Sessions, api_list),
        Scenario::new("sessions::api_create_read_delete", Area::Sessions, api_create_read_delete),
        Scenario::new("sessions::switch_between_sessions", Area::Sessions, switch_between_sessions),
        Scenario::new("sessions::delete_from_sidebar", Area::Sessions, delete_from_sidebar),
    ]
}

async fn api_list(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    let response = api.list_sessions().await?;
    response.expect_status(&[200])?;
    ctx.record("list_sessions_ms", response.elapsed_ms as f64);
    Ok(())
}

async fn api_create_read_delete(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;

    let created = api.create_session(&unique("e2e_session")).await?;
    created.expect_status(&[200, 201])?;
    let id = created
        .id()
        .ok_or_else(|| E2eError::AssertionFailed("created session has no id".to_string()))?;

    let messages = api.session_messages(&id).await?;
    messages.expect_status(&[200])?;
    ensure(messages.items().is_empty(), "new session already has messages")?;

    api.delete_session(&id).await?.expect_status(&[200, 204, 404])?;
    Ok(())
}

async fn switch_between_sessions(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    if chat.session_count().await < 2 {
        return skip("fewer than two sessions");
    }
    chat.open_session(0).await.into_result("open first session")?;
    chat.open_session(1).await.into_result("open second session")
}

async fn delete_from_sidebar(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    if chat.session_count().await == 0 {
        return skip("no sessions listed");
    }
    let ui = chat.interactor();
    if !ui
        .element_exists(&chat.locators().session_delete, Duration::from_secs(2))
        .await
    {
        return skip("no delete button found");
    }
    // titles repeat ("新对话"), so compare occurrences rather than presence
    let target = chat.session_titles().await.into_iter().next().unwrap_or_default();
    let occurrences = |titles: Vec<String>| titles.iter().filter(|t| **t == target).count();
    let before = occurrences(chat.session_titles().await);

    chat.delete_session(0).await.into_result("delete session")?;
    ensure(
        occurrences(chat.session_titles().await) < before,
        format!("session '{}' still listed", target),
    )
}
