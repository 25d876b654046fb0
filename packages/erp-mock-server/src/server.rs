//! Hyper server setup and request handling.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming as IncomingBody};
use hyper::{Request, Response, Result as HyperResult};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::MockServerConfig;
use crate::router::Router;
use crate::store::Registry;

/// JSON-RPC server bound to a local address.
pub struct MockServer {
    listener: TcpListener,
    router: Arc<Router>,
}

impl MockServer {
    /// Binds the server.
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (port 0 picks a free port)
    /// * `config` - Server configuration
    pub async fn bind(addr: SocketAddr, config: MockServerConfig) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let registry = Arc::new(Registry::new(&config.super_password));
        let router = Router::new(registry, Arc::new(config));
        Ok(Self {
            listener,
            router: Arc::new(router),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Returns the database registry.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.router.state().registry)
    }

    /// Runs the accept loop until an accept error occurs.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        tracing::info!("Mock server listening on http://{}", self.local_addr()?);

        loop {
            let (stream, _) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let router = Arc::clone(&self.router);

            tokio::task::spawn(async move {
                let builder = ConnectionBuilder::new(TokioExecutor::new());
                if let Err(err) = builder
                    .serve_connection(
                        io,
                        hyper::service::service_fn(move |req| handle_request(req, router.clone())),
                    )
                    .await
                {
                    tracing::warn!("Error serving connection: {}", err);
                }
            });
        }
    }

    /// Starts the accept loop on the current runtime.
    pub fn spawn(self) -> Result<MockServerHandle, std::io::Error> {
        let addr = self.local_addr()?;
        let registry = self.registry();
        let join = tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                tracing::error!("Mock server error: {}", e);
            }
        });
        Ok(MockServerHandle {
            addr,
            registry,
            join,
        })
    }
}

/// Handle of a spawned mock server.
pub struct MockServerHandle {
    addr: SocketAddr,
    registry: Arc<Registry>,
    join: JoinHandle<()>,
}

impl MockServerHandle {
    /// Returns the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the base URL clients connect to.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Returns the database registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Invalidates every issued session token.
    pub fn expire_sessions(&self) {
        self.registry.expire_sessions();
    }

    /// Stops the accept loop.
    pub async fn shutdown(self) {
        self.join.abort();
        let _ = self.join.await;
    }
}

/// Handles an incoming HTTP request.
async fn handle_request(
    req: Request<IncomingBody>,
    router: Arc<Router>,
) -> HyperResult<Response<Full<Bytes>>> {
    let response = match router.route(req).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!("Request rejected: {}", err);
            Response::from(err)
        }
    };
    Ok(response.map(Full::new))
}
