//! Agent listing, selection and streamed agent chat

use workbench_e2e::{ensure, skip, AgentDescriptor, Area, E2eResult, Scenario, ScenarioContext};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("agents::api_lists_agents", Area::Agents, api_lists_agents),
        Scenario::new("agents::select_agent_card", Area::Agents, select_agent_card),
        Scenario::new("agents::agent_chat_streams", Area::Agents, agent_chat_streams),
    ]
}

async fn first_agent(ctx: &ScenarioContext) -> E2eResult<AgentDescriptor> {
    let api = ctx.api_session().await?;
    match api.list_agents().await?.into_iter().next() {
        Some(agent) => Ok(agent),
        None => skip("no agents configured"),
    }
}

async fn api_lists_agents(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    let agents = api.list_agents().await?;

    for agent in &agents {
        ensure(!agent.id.is_empty(), format!("agent '{}' has no id", agent.name))?;
    }
    ctx.record("agent_count", agents.len() as f64);
    Ok(())
}

async fn select_agent_card(ctx: ScenarioContext) -> E2eResult<()> {
    let agent = first_agent(&ctx).await?;
    ctx.sign_in().await?;

    let chat = ctx.chat_page();
    if !chat
        .interactor()
        .element_exists(&chat.locators().agent_card, ctx.config().timeouts.ui())
        .await
    {
        return skip("agent cards not rendered");
    }
    chat.select_agent(&agent.display_name)
        .await
        .into_result("select agent")
}

async fn agent_chat_streams(ctx: ScenarioContext) -> E2eResult<()> {
    let agent = first_agent(&ctx).await?;
    let api = ctx.api_session().await?;

    let transcript = api.agent_chat_stream(&agent.id, "你好", None).await?;
    ensure(!transcript.chunks.is_empty(), "agent stream carried no data events")?;

    if let Some(first) = transcript.first_chunk_ms {
        ctx.record("agent_first_chunk_ms", first as f64);
    }
    ctx.record("agent_stream_total_ms", transcript.total_ms as f64);
    ctx.record("agent_stream_chunks", transcript.chunks.len() as f64);
    Ok(())
}
