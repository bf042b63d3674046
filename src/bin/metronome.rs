use std::time::Duration;

use clap::Parser;
use serde_json::Value;

use metronome::client::{Client, ClientConfig, ClientEvent};
use metronome::lifecycle::signals::wait_for_signal;

#[derive(Parser)]
#[command(name = "metronome")]
#[command(about = "Subscribe to a metronome hub and print every status update", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "ws://127.0.0.1:8999/stats")]
    url: String,

    #[arg(long, default_value = "")]
    username: String,

    #[arg(long, default_value = "")]
    password: String,

    /// Seconds between reconnect attempts.
    #[arg(long, default_value_t = 10)]
    reconnect_secs: u64,

    /// Pretty-print JSON payloads.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ClientConfig::parse(&cli.url)?
        .with_credentials(cli.username, cli.password)
        .with_reconnect_interval(Duration::from_secs(cli.reconnect_secs));
    let (client, mut events) = Client::spawn(config);

    let printer = async {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Connected => eprintln!("connected to {}", cli.url),
                ClientEvent::Disconnected => eprintln!("disconnected, retrying in {}s", cli.reconnect_secs),
                ClientEvent::Incoming(payload) => print_payload(&payload, cli.pretty)?,
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    };

    tokio::select! {
        result = printer => result?,
        _ = wait_for_signal() => {}
    }

    client.shutdown().await;
    Ok(())
}

fn print_payload(payload: &str, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !pretty {
        println!("{payload}");
        return Ok(());
    }

    let json: Value = serde_json::from_str(payload)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
