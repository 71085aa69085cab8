//! huddle-relay: signaling relay for huddle rooms.
//!
//! Accepts WebSocket connections on `/ws/{participant_id}`, tracks room
//! membership, and routes negotiation messages between participants. The
//! relay never inspects session descriptions or candidates.

pub mod connection;
pub mod rooms;


use tokio::net::TcpListener;

pub use rooms::RoomRegistry;

/// Run the accept loop on `listener` with a fresh registry.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    serve_with(listener, RoomRegistry::new()).await
}

/// Run the accept loop sharing an existing registry.
pub async fn serve_with(listener: TcpListener, registry: RoomRegistry) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "huddle-relay listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let registry = registry.clone();
                tokio::spawn(connection::handle_connection(stream, peer, registry));
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
