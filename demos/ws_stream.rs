// demos/ws_stream.rs
use enclave_connector_rs::types::{PriceUpdate, Update, CHANNEL_DEPOSITS, CHANNEL_PRICES};
use enclave_connector_rs::{ClientConfig, Credential, Hooks, WebSocketClient};
use serde_json::Value;
use std::sync::Arc;

// Prints decoded price updates, falling back to the raw frame
fn price_handler(message: &Value) {
    match Update::<PriceUpdate>::from_message(message) {
        Ok(update) => println!(
            "{}-{}: {}",
            update.data.pair.base, update.data.pair.quote, update.data.price
        ),
        Err(_) => println!("Received Message: {}", message),
    }
}

fn deposit_handler(message: &Value) {
    println!("Deposit: {}", message);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (optional)
    env_logger::init();

    // Optional: Load .env file if you have one
    dotenv::dotenv().ok();

    // ENCLAVE_KEY / ENCLAVE_SECRET, optional ENCLAVE_WS_URL (defaults to sandbox here)
    let credential = Credential::from_env()?;
    let config = match std::env::var("ENCLAVE_WS_URL") {
        Ok(_) => ClientConfig::from_env()?,
        Err(_) => ClientConfig::sandbox(),
    };
    let ping_interval = config.ping_interval.as_secs();

    let hooks = Hooks::new()
        .on_auth(|| println!("Logged in."))
        .on_disconnect(|| println!("Connection Closed."))
        .on_error(|e| eprintln!("Error: {}", e));
    let client = WebSocketClient::with_config(credential, config, hooks)?;

    // Add callbacks to be subscribed when the client connects
    client.add_pending_subscription(CHANNEL_PRICES, Arc::new(price_handler));
    client.add_pending_subscription(CHANNEL_DEPOSITS, Arc::new(deposit_handler));

    let stopper = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Stopping client...");
            stopper.close().await;
        }
    });

    // Run the client until it stops
    client.run(ping_interval).await?;
    println!("Example finished.");
    Ok(())
}
