//! Sending messages, replies, new conversations, model picker

use workbench_e2e::{ensure, skip, Area, E2eResult, Scenario, ScenarioContext};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("chat::send_message", Area::Chat, send_message),
        Scenario::new("chat::assistant_replies", Area::Chat, assistant_replies),
        Scenario::new("chat::new_chat_clears_messages", Area::Chat, new_chat_clears_messages),
        Scenario::new("chat::message_roles_add_up", Area::Chat, message_roles_add_up),
        Scenario::new("chat::select_model", Area::Chat, select_model),
    ]
}

async fn send_message(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    let before = chat.user_message_count().await;
    chat.send_message("你好，请简单介绍一下你自己")
        .await
        .into_result("send message")?;
    ensure(
        chat.user_message_count().await > before,
        "user message count did not grow",
    )
}

async fn assistant_replies(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    chat.send_message("1+1等于几？").await.into_result("send message")?;
    chat.wait_for_response(ctx.config().timeouts.response())
        .await
        .into_result("wait for response")?;

    let reply = chat.last_assistant_message().await.unwrap_or_default();
    ensure(!reply.trim().is_empty(), "assistant reply is empty")
}

async fn new_chat_clears_messages(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    chat.send_message("这条消息会被清除").await.into_result("send message")?;
    chat.start_new_chat().await.into_result("start new chat")?;

    let count = chat.message_count().await;
    ensure(count == 0, format!("expected 0 messages after new chat, found {}", count))
}

async fn message_roles_add_up(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    chat.send_message("请回复一个字：好").await.into_result("send message")?;
    chat.wait_for_response(ctx.config().timeouts.response())
        .await
        .into_result("wait for response")?;

    let total = chat.message_count().await;
    let user = chat.user_message_count().await;
    let assistant = chat.assistant_message_count().await;
    ensure(
        total == user + assistant,
        format!("{} messages but {} user + {} assistant", total, user, assistant),
    )
}

async fn select_model(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let chat = ctx.chat_page();

    let models = chat.available_models().await;
    let Some(model) = models.last() else {
        return skip("no model picker or no models offered");
    };
    chat.select_model(model).await.into_result("select model")
}
