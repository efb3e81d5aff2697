use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use futures::stream;
use log::{error, info, warn};
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::grpc::GrpcFileService;
use crate::protocol::{AppState, SharedState, handle_list, handle_upload, healthz};
use crate::storage::PathResolver;

pub struct Server {
    http_listener: TcpListener,
    grpc_listener: TcpListener,
    state: SharedState,
}

impl Server {
    /// Binds the HTTP and gRPC listeners described by `config`.
    pub async fn new(config: &ServerConfig) -> io::Result<Self> {
        let http_listener = bind(&config.http_socket(), "HTTP").await?;
        let grpc_listener = bind(&config.grpc_socket(), "gRPC").await?;

        let resolver = PathResolver::new(config.path_prefix());
        match resolver.prefix() {
            Some(prefix) if !prefix.is_dir() => {
                warn!(
                    "Path prefix {} is not a directory; requests fail until it is created",
                    prefix.display()
                );
            }
            Some(prefix) => info!("Serving path prefix {}", prefix.display()),
            None => info!("No path prefix configured; serving the working directory"),
        }

        Ok(Self {
            http_listener,
            grpc_listener,
            state: Arc::new(AppState { resolver }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    pub fn grpc_local_addr(&self) -> io::Result<SocketAddr> {
        self.grpc_listener.local_addr()
    }

    /// Router with all endpoints, bound to `state`.
    pub fn router(state: SharedState) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/list", get(handle_list))
            .route("/", post(handle_upload).put(handle_upload))
            // Upload bodies are streamed to disk, so no size cap applies
            .layer(DefaultBodyLimit::disable())
            .with_state(state)
    }

    /// Serves both transports until Ctrl-C is received or one of them fails.
    pub async fn start(self) -> io::Result<()> {
        let http_addr = self.local_addr()?;
        let grpc_addr = self.grpc_local_addr()?;
        info!("Starting deploytar server: HTTP on {}, gRPC on {}", http_addr, grpc_addr);

        let shutdown = CancellationToken::new();
        tokio::spawn(wait_for_ctrl_c(shutdown.clone()));

        let http = {
            let shutdown = shutdown.clone();
            let serve = axum::serve(self.http_listener, Self::router(self.state.clone()))
                .with_graceful_shutdown(cancelled(shutdown.clone()));
            async move {
                let result = serve.into_future().await;
                shutdown.cancel();
                result
            }
        };

        let grpc = {
            let shutdown = shutdown.clone();
            let incoming = Box::pin(stream::unfold(self.grpc_listener, |listener| async move {
                let accepted = listener.accept().await.map(|(socket, _)| socket);
                Some((accepted, listener))
            }));
            let serve = tonic::transport::Server::builder()
                .add_service(GrpcFileService::new(self.state).into_server())
                .serve_with_incoming_shutdown(incoming, cancelled(shutdown.clone()));
            async move {
                let result = serve.await.map_err(io::Error::other);
                shutdown.cancel();
                result
            }
        };

        let (http_result, grpc_result) = tokio::join!(http, grpc);
        if let Err(e) = &http_result {
            error!("HTTP server on {} failed: {}", http_addr, e);
        }
        if let Err(e) = &grpc_result {
            error!("gRPC server on {} failed: {}", grpc_addr, e);
        }

        info!("Server stopped");
        http_result.and(grpc_result)
    }
}

async fn bind(socket: &str, transport: &str) -> io::Result<TcpListener> {
    match TcpListener::bind(socket).await {
        Ok(listener) => {
            info!("{} server bound to {}", transport, socket);
            Ok(listener)
        }
        Err(e) => {
            error!("Failed to bind {} server to {}: {}", transport, socket, e);
            Err(e)
        }
    }
}

async fn cancelled(token: CancellationToken) {
    token.cancelled().await
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
