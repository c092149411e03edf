use tracing::{error, info};
use visage::reporting::{self, DEFAULT_HTTP_PORT};
use visage::signaling::{DEFAULT_SIGNALING_PORT, SignalingServer};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let ws_addr = format!("0.0.0.0:{}", env_port("SIGNALING_PORT", DEFAULT_SIGNALING_PORT));
    let http_addr = format!("0.0.0.0:{}", env_port("HTTP_PORT", DEFAULT_HTTP_PORT));

    println!("   Visage Signaling Relay");
    println!("   WebSocket on {}", ws_addr);
    println!("   Reporting API on {}", http_addr);
    println!("   Press Ctrl+C to stop\n");

    let server = SignalingServer::new();
    let handle = server.handle();

    tokio::spawn(async move {
        if let Err(e) = reporting::serve(&http_addr, handle).await {
            error!("Reporting API error: {}", e);
        }
    });

    tokio::select! {
        result = server.run(&ws_addr) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    }
}

fn env_port(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
