//! Timings recorded into the run's performance report

use std::time::Instant;

use workbench_e2e::streaming::Termination;
use workbench_e2e::{ensure, Area, E2eResult, Scenario, ScenarioContext};

/// Samples taken for API latency
const API_SAMPLES: usize = 5;

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("performance::login_page_load", Area::Performance, login_page_load),
        Scenario::new("performance::login_duration", Area::Performance, login_duration),
        Scenario::new("performance::streaming_response", Area::Performance, streaming_response),
        Scenario::new("performance::api_latency", Area::Performance, api_latency),
    ]
}

async fn login_page_load(ctx: ScenarioContext) -> E2eResult<()> {
    let start = Instant::now();
    ctx.login_page().open().await.into_result("open login page")?;
    ctx.record("page_load_ms", start.elapsed().as_millis() as f64);

    if let Ok(value) = ctx
        .driver()
        .evaluate("performance.getEntriesByType('navigation')[0]?.domContentLoadedEventEnd ?? null")
        .await
    {
        if let Some(ms) = value.as_f64() {
            ctx.record("dom_content_loaded_ms", ms);
        }
    }
    Ok(())
}

async fn login_duration(ctx: ScenarioContext) -> E2eResult<()> {
    let login = ctx.login_page();
    login.open().await.into_result("open login page")?;

    let creds = &ctx.config().credentials;
    let start = Instant::now();
    login
        .login(&creds.username, &creds.password)
        .await
        .into_result("login")?;
    ctx.record("login_ms", start.elapsed().as_millis() as f64);
    Ok(())
}

async fn streaming_response(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    let baseline = chat.assistant_message_count().await;
    let (sent, sent_at) = chat
        .send_message_timed("请用三句话介绍一下人工智能的发展历史")
        .await;
    sent.into_result("send message")?;

    let report = ctx.streaming_detector().observe(&chat, baseline, sent_at).await;
    report.record_into(ctx.metrics(), ctx.name());

    ensure(
        report.termination != Termination::NoContent,
        "no assistant message appeared",
    )?;
    ensure(report.final_length > 0, "assistant message stayed empty")
}

async fn api_latency(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;

    for _ in 0..API_SAMPLES {
        let sessions = api.list_sessions().await?;
        sessions.expect_status(&[200])?;
        ctx.record("list_sessions_ms", sessions.elapsed_ms as f64);

        let agents = api.get("/api/agents").await?;
        agents.expect_status(&[200])?;
        ctx.record("list_agents_ms", agents.elapsed_ms as f64);
    }
    Ok(())
}
