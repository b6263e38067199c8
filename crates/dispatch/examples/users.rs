//! A small user directory behind a cookie login.
//!
//! ```sh
//! cargo run --example users [config.toml]
//! curl -i http://127.0.0.1:8080/users/42                       # 301 to /login
//! curl -i -d 'username=demo&password=demo-password' http://127.0.0.1:8080/login
//! ```

use http::{HeaderValue, StatusCode, header};
use micro_dispatch::config::AuthConfig;
use micro_dispatch::render::TemplateRenderer;
use micro_dispatch::router::{get, post};
use micro_dispatch::{RequestContext, Server, ServerConfig, ServerError, handler_fn, handler_sync, init_logging};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

const USERNAME: &str = "demo";
const PASSWORD: &str = "demo-password";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct User<'a> {
    id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Address<'a> {
    id: &'a str,
    user_id: &'a str,
}

fn load_config() -> Result<ServerConfig, ServerError> {
    if let Some(path) = std::env::args().nth(1) {
        return Ok(ServerConfig::load(path)?);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let mut config = ServerConfig::default();
    config.static_files.root.clone_from(&manifest_dir);
    config.templates.root = manifest_dir;
    config.auth = Some(AuthConfig {
        secret: "micro-dispatch-demo-secret".to_string(),
        cookie_name: "X_AUTH".to_string(),
        login_path: "/login".to_string(),
        allow_prefixes: vec!["/login".to_string(), "/public/".to_string()],
    });
    Ok(config)
}

fn path_param<'c>(ctx: &'c RequestContext, name: &str) -> &'c str {
    ctx.param(name).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = load_config()?;
    init_logging(config.level()?);
    let auth = config.auth.clone().ok_or(micro_dispatch::ConfigError::EmptySecret)?;
    let authenticator = auth.authenticator()?;
    let templates = config.templates.renderer();

    let index_templates = templates.clone();
    let login_templates = templates.clone();
    let login_failed_templates = templates;

    let server = Server::builder()
        .config(config)
        .default_middlewares()
        .wrap(auth.middleware()?)
        .route(
            "/",
            get(handler_fn(move |ctx| {
                let templates = index_templates.clone();
                Box::pin(async move {
                    let _ = templates.render(ctx, "/public/index.html", &json!({"message": "Welcome!"})).await;
                })
            })),
        )
        .route("/about", get(handler_sync(|ctx| ctx.render_text(StatusCode::OK, "about"))))
        .route(
            "/users/:id",
            get(handler_sync(|ctx| {
                let id = path_param(ctx, "id").to_string();
                let _ = ctx.render_xml("User", &User { id: &id });
            })),
        )
        .route(
            "/users/:user_id/addresses/:address_id",
            get(handler_sync(|ctx| {
                let user_id = path_param(ctx, "user_id").to_string();
                let address_id = path_param(ctx, "address_id").to_string();
                let _ = ctx.render_json(&Address { id: &address_id, user_id: &user_id });
            })),
        )
        .route(
            "/users",
            post(handler_sync(|ctx| {
                let params = ctx.params().clone();
                let _ = ctx.render_json(&params);
            })),
        )
        .route(
            "/login",
            get(handler_fn(move |ctx| {
                let templates = login_templates.clone();
                Box::pin(async move {
                    let _ = templates.render(ctx, "/public/login.html", &json!({"message": "Please log in."})).await;
                })
            })),
        )
        .route(
            "/login",
            post(handler_fn(move |ctx| {
                let templates: TemplateRenderer = login_failed_templates.clone();
                let token = authenticator.token();
                let cookie_name = auth.cookie_name.clone();
                Box::pin(async move {
                    let valid = ctx.param("username") == Ok(USERNAME) && ctx.param("password") == Ok(PASSWORD);
                    if valid
                        && let Ok(cookie) = HeaderValue::from_str(&format!("{cookie_name}={token}; Path=/; HttpOnly"))
                    {
                        ctx.response_mut().append_header(header::SET_COOKIE, cookie);
                        ctx.redirect("/");
                        return;
                    }
                    let message = json!({"message": "Check your username and password."});
                    let _ = templates.render(ctx, "/public/login.html", &message).await;
                })
            })),
        )
        .build()?;

    info!(address = %server.config().address, "users demo starting");
    server.run().await
}
