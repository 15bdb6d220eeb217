use custody_http::{RequestConfig, RetryingHttpClient};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("custody_http=debug")),
        )
        .init();

    let api = RetryingHttpClient::from_env()?;

    let queues: JsonValue = api.get_data("/transaction/dashboard/queues").await?;
    println!("queues: {queues}");

    let wallets = api
        .send(RequestConfig::get("/wallet/list").page(1, 20))
        .await?;
    println!(
        "wallets: status={} retries={} data={}",
        wallets.status,
        wallets.retries,
        wallets.data::<JsonValue>()?
    );

    Ok(())
}
