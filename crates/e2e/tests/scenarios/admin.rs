//! Admin panel: tabs, user and agent creation

use workbench_e2e::pages::AdminTab;
use workbench_e2e::{ensure, AgentKind, Area, E2eResult, Scenario, ScenarioContext, UserRole};

use super::unique;

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("admin::open_panel", Area::Admin, open_panel),
        Scenario::new("admin::users_listed", Area::Admin, users_listed),
        Scenario::new("admin::create_user", Area::Admin, create_user),
        Scenario::new("admin::create_rag_agent", Area::Admin, create_rag_agent),
        Scenario::new("admin::create_tool_agent", Area::Admin, create_tool_agent),
    ]
}

async fn open_panel(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let admin = ctx.admin_page();

    admin.open().await.into_result("open admin panel")?;
    for tab in [AdminTab::Users, AdminTab::Agents, AdminTab::Knowledge] {
        admin.open_tab(tab).await.into_result(&format!("open {:?} tab", tab))?;
    }
    Ok(())
}

async fn users_listed(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let admin = ctx.admin_page();

    admin.open().await.into_result("open admin panel")?;
    admin.open_tab(AdminTab::Users).await.into_result("open users tab")?;
    // the signed-in admin is always listed
    ensure(admin.user_count().await >= 1, "user table is empty")
}

async fn create_user(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let admin = ctx.admin_page();
    admin.open().await.into_result("open admin panel")?;

    let username = unique("e2e_user");
    admin
        .create_user(&username, "Test@123456", UserRole::User)
        .await
        .into_result("create user")
}

async fn create_agent(ctx: ScenarioContext, kind: &str) -> E2eResult<()> {
    ctx.sign_in().await?;
    let admin = ctx.admin_page();
    admin.open().await.into_result("open admin panel")?;

    let kind = AgentKind::parse(kind);
    let name = unique(&format!("e2e_{}_agent", kind));
    let display_name = format!("E2E {} 助手 {}", kind, &name[name.len() - 6..]);

    let before = admin.agent_count().await;
    admin
        .create_agent(&name, &display_name, kind)
        .await
        .into_result("create agent")?;
    ensure(admin.agent_count().await > before, "agent count did not grow")
}

async fn create_rag_agent(ctx: ScenarioContext) -> E2eResult<()> {
    create_agent(ctx, "rag").await
}

async fn create_tool_agent(ctx: ScenarioContext) -> E2eResult<()> {
    create_agent(ctx, "tool").await
}
