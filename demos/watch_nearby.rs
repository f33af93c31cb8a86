//! Nearby riders example
//!
//! Subscribes to the nearby-riders stream and asks the service for the
//! athlete currently being watched.
//!
//! Run with: SAUCE_BASE_URL=http://127.0.0.1:1080 cargo run --example watch_nearby

use sauce_client::ClientBuilder;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NearbyRider {
    #[serde(deserialize_with = "sauce_core::lenient::number_or_string")]
    athlete_id: i64,
    #[serde(default)]
    gap: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let client = ClientBuilder::from_env()
        .name("watch-nearby")
        .with_default_reconnect()
        .build()?;

    println!("Streaming from {}", client.events_endpoint());

    let session = client
        .subscribe_to(client.nearby()?, |riders: Vec<NearbyRider>| {
            for rider in riders.iter().take(5) {
                match rider.gap {
                    Some(gap) => println!("  athlete {:>8}  gap {:+.1}s", rider.athlete_id, gap),
                    None => println!("  athlete {:>8}", rider.athlete_id),
                }
            }
            println!("{} riders nearby\n", riders.len());
        })
        .await?;

    let watching: Option<Value> = client.call("getAthleteData", &["watching"]).await?;
    match watching {
        Some(athlete) => println!("Watching: {}", athlete),
        None => println!("No athlete data available"),
    }

    tokio::signal::ctrl_c().await?;

    client.unsubscribe_from(&session)?;
    session.stop().await;
    println!("Stopped");
    Ok(())
}
