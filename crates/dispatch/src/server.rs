//! Server assembly and the hyper transport.
//!
//! [`ServerBuilder`] collects routes and middleware, then [`ServerBuilder::build`]
//! closes registration and composes the pipeline exactly once. The resulting
//! [`Server`] accepts connections and serves each one on its own task; a
//! panic that escapes the pipeline ends that task and its connection only.

use crate::body::ResponseBody;
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{RegisterError, ServerError};
use crate::handler::RequestHandler;
use crate::middleware::{
    FormMiddleware, JsonBodyMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, RecoveryMiddleware,
};
use crate::render::TEXT_PLAIN_UTF_8;
use crate::router::{RouteItem, Router};
use http::{HeaderValue, Request, Response, StatusCode, header};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Installs a `tracing` fmt subscriber as the global default.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("global subscriber already installed");
    }
}

pub struct ServerBuilder {
    config: ServerConfig,
    router: Router,
    middlewares: MiddlewareChain,
    with_defaults: bool,
    error: Option<RegisterError>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            router: Router::new(),
            middlewares: MiddlewareChain::new(),
            with_defaults: false,
            error: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Puts logging, recovery, static files, form and JSON body parsing in
    /// front of every middleware added with [`wrap`](Self::wrap), in that order.
    ///
    /// The static file stage is left out when disabled in the config.
    pub fn default_middlewares(mut self) -> Self {
        self.with_defaults = true;
        self
    }

    /// Appends a middleware; it runs inside everything added before it.
    pub fn wrap<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn route(mut self, pattern: impl Into<String>, item: RouteItem) -> Self {
        let result = self.router.route(pattern, item).map(|_router| ());
        self.keep_first_error(result);
        self
    }

    /// Registers `handler` for a method given by name, e.g. `"GET"`.
    pub fn register<H: RequestHandler + 'static>(
        mut self,
        method: &str,
        pattern: impl Into<String>,
        handler: H,
    ) -> Self {
        let result = self.router.register_str(method, pattern, Arc::new(handler)).map(|_router| ());
        self.keep_first_error(result);
        self
    }

    fn keep_first_error(&mut self, result: Result<(), RegisterError>) {
        if let Err(e) = result {
            warn!(cause = %e, "route registration failed");
            self.error.get_or_insert(e);
        }
    }

    /// Closes registration and composes the pipeline.
    ///
    /// Fails with the first registration error, or if the config is invalid.
    pub fn build(self) -> Result<Server, ServerError> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        self.config.validate()?;

        let mut chain = MiddlewareChain::new();
        if self.with_defaults {
            chain.push(LoggingMiddleware::new()).push(RecoveryMiddleware::new());
            if self.config.static_files.enabled {
                chain.push(self.config.static_files.middleware());
            }
            chain.push(FormMiddleware::new()).push(JsonBodyMiddleware::new());
        }
        let user_middlewares = self.middlewares.len();
        chain.push(self.middlewares);

        info!(routes = self.router.len(), user_middlewares, defaults = self.with_defaults, "pipeline composed");
        let dispatcher = Dispatcher::new(self.router, &chain);
        Ok(Server { config: self.config, dispatcher: Arc::new(dispatcher) })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Installs logging, binds the configured address and serves until ctrl-c.
    pub async fn run(self) -> Result<(), ServerError> {
        init_logging(self.config.level()?);

        let address = self.config.socket_addr()?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind { address: address.to_string(), source })?;
        info!(address = %address, "start listening");

        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serves connections from `listener` until the process ends.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serves connections from `listener` until `shutdown` completes.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let max_body_size = self.config.max_body_size;
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                () = &mut shutdown => {
                    info!("shutdown signal received, stop accepting");
                    return Ok(());
                }
            };

            let (stream, remote_addr) = match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(serve_connection(stream, remote_addr, dispatcher, max_body_size));
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(cause = %e, "can not listen for ctrl-c, serving until killed");
        std::future::pending::<()>().await;
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    max_body_size: usize,
) {
    let service = service_fn(move |request: Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(dispatch(&dispatcher, request, max_body_size).await) }
    });

    match http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
        Ok(()) => debug!(remote = %remote_addr, "connection closed"),
        Err(e) => warn!(remote = %remote_addr, cause = %e, "connection error"),
    }
}

/// Buffers the request body up to `max_body_size` and dispatches the request.
async fn dispatch(dispatcher: &Dispatcher, request: Request<Incoming>, max_body_size: usize) -> Response<ResponseBody> {
    let (parts, body) = request.into_parts();

    match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => dispatcher.serve(Request::from_parts(parts, collected.to_bytes())).await,
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(path = parts.uri.path(), limit = max_body_size, "request body too large");
            plain_status(StatusCode::PAYLOAD_TOO_LARGE)
        }
        Err(e) => {
            warn!(path = parts.uri.path(), cause = %e, "read request body error");
            plain_status(StatusCode::BAD_REQUEST)
        }
    }
}

fn plain_status(status: StatusCode) -> Response<ResponseBody> {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let mut response = Response::new(ResponseBody::from(format!("{reason}\n")));
    *response.status_mut() = status;
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF_8));
    response
}
