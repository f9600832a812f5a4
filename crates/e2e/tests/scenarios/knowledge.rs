//! Knowledge-base groups, bases, documents and search

use workbench_e2e::api::json_id;
use workbench_e2e::pages::AdminTab;
use workbench_e2e::{skip, Area, E2eResult, Scenario, ScenarioContext};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("knowledge::list_groups", Area::KnowledgeBase, list_groups),
        Scenario::new("knowledge::list_bases", Area::KnowledgeBase, list_bases),
        Scenario::new("knowledge::upload_document", Area::KnowledgeBase, upload_document),
        Scenario::new("knowledge::search", Area::KnowledgeBase, search),
        Scenario::new("knowledge::admin_tab_opens", Area::KnowledgeBase, admin_tab_opens),
    ]
}

async fn list_groups(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    api.knowledge_groups().await?.expect_status(&[200, 404])?;
    Ok(())
}

async fn list_bases(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    let response = api.knowledge_bases().await?;
    response.expect_status(&[200])?;
    ctx.record("knowledge_base_count", response.items().len() as f64);
    Ok(())
}

async fn upload_document(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    let bases = api.knowledge_bases().await?;
    bases.expect_status(&[200])?;

    let Some(base_id) = bases.items().first().and_then(json_id) else {
        return skip("no knowledge base to upload into");
    };

    let content = "E2E 测试文档。\n这是一段用于检索测试的文本。\n".as_bytes().to_vec();
    let response = api.upload_document(&base_id, "e2e-note.txt", content).await?;
    ctx.record("document_upload_ms", response.elapsed_ms as f64);
    // unsupported type or size limits are acceptable answers
    response.expect_status(&[200, 201, 202, 400, 413, 415])?;
    Ok(())
}

async fn search(ctx: ScenarioContext) -> E2eResult<()> {
    let api = ctx.api_session().await?;
    let response = api.search_knowledge("测试", None).await?;
    ctx.record("knowledge_search_ms", response.elapsed_ms as f64);
    response.expect_status(&[200, 400, 404, 422])?;
    Ok(())
}

async fn admin_tab_opens(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let admin = ctx.admin_page();

    admin.open().await.into_result("open admin panel")?;
    admin
        .open_tab(AdminTab::Knowledge)
        .await
        .into_result("open knowledge tab")
}
