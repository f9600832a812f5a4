//! Behaviour under simulated network conditions

use std::time::{Duration, Instant};

use workbench_e2e::{ensure, Area, E2eResult, NetworkConditions, Scenario, ScenarioContext};

const API_ROUTES: &str = "**/api/**";

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("network::offline_then_recover", Area::Network, offline_then_recover),
        Scenario::new("network::slow_3g_login", Area::Network, slow_3g_login),
        Scenario::new("network::login_api_failure", Area::Network, login_api_failure),
        Scenario::new("network::flaky_api_recovers", Area::Network, flaky_api_recovers),
    ]
}

async fn offline_then_recover(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    NetworkConditions::offline().apply(ctx.driver(), API_ROUTES).await?;
    let baseline = chat.assistant_message_count().await;
    let _ = chat.send_message("离线时发送的消息").await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    ctx.interactor().screenshot("offline_send").await;

    let replied = chat.assistant_message_count().await > baseline
        && chat
            .last_assistant_message()
            .await
            .map(|t| t.chars().count() > 50)
            .unwrap_or(false);
    ensure(!replied, "a full reply arrived while offline")?;

    NetworkConditions::reset(ctx.driver()).await?;
    ctx.driver().reload().await?;
    chat.open().await.into_result("reopen chat after reconnecting")
}

async fn slow_3g_login(ctx: ScenarioContext) -> E2eResult<()> {
    let conditions = NetworkConditions::slow_3g();
    conditions.apply(ctx.driver(), API_ROUTES).await?;

    let start = Instant::now();
    ctx.sign_in().await?;
    let elapsed = start.elapsed();
    ctx.record("slow_3g_login_ms", elapsed.as_millis() as f64);

    ensure(
        elapsed >= Duration::from_millis(conditions.min_delay_ms()),
        format!("login finished in {:?}, faster than the injected latency", elapsed),
    )
}

async fn login_api_failure(ctx: ScenarioContext) -> E2eResult<()> {
    NetworkConditions::api_failure(500)
        .apply(ctx.driver(), "**/api/auth/login")
        .await?;

    let creds = &ctx.config().credentials;
    let login = ctx.login_page();
    let outcome = login.login(&creds.username, &creds.password).await;

    ensure(!outcome.is_success(), "login succeeded while the API returned 500")?;
    ensure(!login.is_logged_in().await, "logged in while the API returned 500")
}

async fn flaky_api_recovers(ctx: ScenarioContext) -> E2eResult<()> {
    NetworkConditions::flaky(0.3).apply(ctx.driver(), API_ROUTES).await?;
    let flaky = ctx.login_page();
    let creds = &ctx.config().credentials;
    let first_try = flaky.login(&creds.username, &creds.password).await;
    ctx.record("flaky_login_succeeded", if first_try.is_success() { 1.0 } else { 0.0 });

    NetworkConditions::reset(ctx.driver()).await?;
    if !first_try.is_success() {
        ctx.sign_in().await?;
    }
    ensure(ctx.login_page().is_logged_in().await, "not logged in after the network recovered")
}
