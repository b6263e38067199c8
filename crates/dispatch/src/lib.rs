//! A small async request dispatcher.
//!
//! Incoming requests flow through a pipeline composed once at start-up:
//!
//! ```text
//! transport ─▶ Dispatcher ─▶ middleware 1 ─▶ … ─▶ middleware n ─▶ route stage ─▶ handler
//! ```
//!
//! The [`Dispatcher`] creates one [`RequestContext`] per request and seeds it
//! with the query string. Each middleware decides whether to call the rest of
//! the pipeline or to answer on its own. The route stage looks the request up
//! in the [`Router`], adds the path bindings to the params and runs the
//! handler, or answers `404 Not Found`.
//!
//! ```no_run
//! use micro_dispatch::router::get;
//! use micro_dispatch::{Server, handler_sync};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), micro_dispatch::ServerError> {
//!     Server::builder()
//!         .default_middlewares()
//!         .route("/hello/:name", get(handler_sync(|ctx| {
//!             let greeting = format!("hello {}", ctx.param("name").unwrap_or("stranger"));
//!             ctx.render_text(StatusCode::OK, &greeting);
//!         })))
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

mod body;
mod dispatcher;
mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod config;
pub mod middleware;
pub mod params;
pub mod render;
pub mod router;

pub use body::ResponseBody;
pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, RegisterError, ServerError};
pub use handler::{BoxFuture, BoxHandler, FnHandler, RequestHandler, SyncFnHandler, handler_fn, handler_sync};
pub use params::{ParamError, ParamSource, ParamValue, Params};
pub use render::RenderError;
pub use request::RequestContext;
pub use response::ResponseSink;
pub use router::Router;
pub use server::{Server, ServerBuilder, init_logging};
