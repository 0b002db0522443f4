//! The running origin server.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use fc_core::config::PLAYLIST_NAME;
use fc_core::{Error, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::resolver::AddressResolver;
use crate::router::build_router;

/// An HTTP server bound to a port and serving one directory.
///
/// The listener is bound and accepting before [`OriginServer::start`]
/// returns. Dropping the server without [`OriginServer::stop`] aborts it.
#[derive(Debug)]
pub struct OriginServer {
    addr: SocketAddr,
    url: String,
    shutdown: CancellationToken,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl OriginServer {
    /// Bind `port` on all interfaces (0 = OS-assigned) and serve `dir`.
    ///
    /// The published URL's host comes from `resolver`.
    pub async fn start(
        dir: &Path,
        port: u16,
        resolver: &dyn AddressResolver,
    ) -> Result<Self> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: bind_addr,
                source,
            })?;
        let addr = listener.local_addr()?;

        let app = build_router(dir);
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(signal.cancelled_owned())
                .await
        });

        let url = stream_url(&resolver.host(), addr.port());
        tracing::info!(port = addr.port(), dir = %dir.display(), url = %url, "Origin server listening");

        Ok(Self {
            addr,
            url,
            shutdown,
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The actually bound port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `http://<host>:<port>/stream.m3u8`
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop accepting connections and wait up to `deadline` for in-flight
    /// responses. On timeout the server is aborted and [`Error::Timeout`]
    /// returned. Stopping twice is a no-op.
    pub async fn stop(&mut self, deadline: Duration) -> Result<()> {
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };
        self.shutdown.cancel();

        let result = match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(join_err)) => Err(Error::Internal(format!(
                "origin server task failed: {join_err}"
            ))),
            Err(_elapsed) => {
                task.abort();
                // Let the abort land so the listener is closed on return.
                let _ = task.await;
                Err(Error::timeout("in-flight HTTP responses", deadline))
            }
        };

        tracing::info!(port = self.port(), "Origin server stopped");
        result
    }
}

impl Drop for OriginServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Public playlist URL for `host:port`.
pub fn stream_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/{PLAYLIST_NAME}")
}
