//! Login, logout and token issuance

use workbench_e2e::{ensure, Area, E2eResult, Scenario, ScenarioContext};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("auth::login_with_valid_credentials", Area::Auth, login_with_valid_credentials),
        Scenario::new("auth::login_with_invalid_credentials", Area::Auth, login_with_invalid_credentials),
        Scenario::new("auth::logout_shows_login_form", Area::Auth, logout_shows_login_form),
        Scenario::new("auth::api_login_issues_token", Area::Auth, api_login_issues_token),
        Scenario::new("auth::api_rejects_wrong_password", Area::Auth, api_rejects_wrong_password),
        Scenario::new("auth::api_requires_token", Area::Auth, api_requires_token),
    ]
}

async fn login_with_valid_credentials(ctx: ScenarioContext) -> E2eResult<()> {
    let creds = &ctx.config().credentials;
    let login = ctx.login_page();

    login
        .login(&creds.username, &creds.password)
        .await
        .into_result("login")?;
    ensure(login.is_logged_in().await, "no logged-in marker visible after login")
}

async fn login_with_invalid_credentials(ctx: ScenarioContext) -> E2eResult<()> {
    let login = ctx.login_page();

    let outcome = login.login("wronguser", "wrongpass").await;
    ensure(!outcome.is_success(), "login with wrong credentials succeeded")?;
    ensure(!login.is_logged_in().await, "logged-in marker visible after rejected login")
}

async fn logout_shows_login_form(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.sign_in().await?;
    let login = ctx.login_page();

    login.logout().await.into_result("logout")?;
    ensure(!login.is_logged_in().await, "still logged in after logout")
}

async fn api_login_issues_token(ctx: ScenarioContext) -> E2eResult<()> {
    let creds = &ctx.config().credentials;
    let response = ctx.api().login_response(&creds.username, &creds.password).await?;
    ctx.record("api_login_ms", response.elapsed_ms as f64);

    let token = ctx.api().login(&creds.username, &creds.password).await?;
    ensure(!token.is_empty(), "login returned an empty token")?;

    let authed = ctx.api().with_token(token);
    authed.list_sessions().await?.expect_status(&[200])?;
    Ok(())
}

async fn api_rejects_wrong_password(ctx: ScenarioContext) -> E2eResult<()> {
    let username = ctx.config().credentials.username.clone();
    ctx.api()
        .login_response(&username, "definitely-not-the-password")
        .await?
        .expect_status(&[400, 401, 403, 422])?;
    Ok(())
}

async fn api_requires_token(ctx: ScenarioContext) -> E2eResult<()> {
    ctx.api().list_sessions().await?.expect_status(&[401, 403])?;
    Ok(())
}
