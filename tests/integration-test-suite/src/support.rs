//! Shared helpers for spinning up loopback servers.

use std::net::SocketAddr;

use axum::Router;

/// Bind an ephemeral loopback port and serve `router` in the background.
/// Returns the bound address; the server lives until the runtime drops.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve router");
    });
    addr
}

/// The loopback base URL for a bound address.
pub fn base_url(addr: SocketAddr) -> String {
    format!("http://127.0.0.1:{}", addr.port())
}
