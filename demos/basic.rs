use std::{collections::HashMap, time::Duration};

use courier_http::{ClientOptions, CourierClient, RequestContext, RetryPolicy, WellKnownKey};
use serde_json::Value;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let base_url = std::env::var("COURIER_BASE_URL")?;

    let client = CourierClient::new(
        base_url,
        ClientOptions::default()
            .with_timeout(Duration::from_secs(10))
            .with_retry(RetryPolicy::on_success_status(3, Duration::from_millis(250))),
    )
    .with_default_headers([("x-client", "courier-demo")]);

    let ctx = RequestContext::background()
        .with_value(WellKnownKey::RequestId, "demo-request-1")
        .with_value(WellKnownKey::TenantId, "demo-tenant");

    let response = client
        .get::<Value>(&ctx, "/health", &HashMap::new())
        .await?;

    println!("{} {}", response.call.status, response.body);

    Ok(())
}
