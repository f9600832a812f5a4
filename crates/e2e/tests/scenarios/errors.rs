//! Bad input and unknown routes

use std::time::Duration;

use serde_json::json;
use workbench_e2e::{ensure, Area, E2eResult, Scenario, ScenarioContext};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("errors::empty_message_not_sent", Area::ErrorHandling, empty_message_not_sent),
        Scenario::new("errors::very_long_message", Area::ErrorHandling, very_long_message),
        Scenario::new("errors::unknown_route", Area::ErrorHandling, unknown_route),
        Scenario::new("errors::api_unknown_endpoint", Area::ErrorHandling, api_unknown_endpoint),
        Scenario::new("errors::api_malformed_payload", Area::ErrorHandling, api_malformed_payload),
    ]
}

async fn empty_message_not_sent(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();
    let ui = chat.interactor();
    let loc = chat.locators();

    let before = chat.user_message_count().await;
    ui.safe_fill(&loc.input, "   ").await.into_result("fill chat input")?;
    // a disabled send button is the expected way to refuse
    let _ = ui.safe_click_within(&loc.send, Duration::from_secs(1)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    ensure(
        chat.user_message_count().await == before,
        "blank message was sent",
    )
}

async fn very_long_message(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    let text = "长".repeat(4000);
    // either sent or refused; the page must stay usable
    let _ = chat.send_message(&text).await;

    ensure(
        ctx.login_page().is_logged_in().await,
        "session lost after sending a long message",
    )?;
    ensure(
        chat.interactor().is_visible(&chat.locators().input).await,
        "chat input gone after sending a long message",
    )
}

async fn unknown_route(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    ctx.driver().goto("/this-route-does-not-exist").await?;

    let text_length = ctx.driver().evaluate("document.body.innerText.length").await?;
    ensure(
        text_length.as_u64().unwrap_or(0) > 0,
        "unknown route rendered a blank page",
    )
}

async fn api_unknown_endpoint(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    api.get("/api/this-endpoint-does-not-exist")
        .await?
        .expect_status(&[404, 405])?;
    Ok(())
}

async fn api_malformed_payload(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    api.post_json("/api/sessions", &json!({ "title": { "nested": [1, 2, 3] } }))
        .await?
        .expect_status(&[200, 201, 400, 422])?;

    api.post_json("/api/auth/login", &json!({}))
        .await?
        .expect_status(&[400, 401, 422])?;
    Ok(())
}
