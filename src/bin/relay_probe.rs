use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rosrelay::logger::{self, LogTag};
use rosrelay::relay::protocol::{self, InboundFrame};
use rosrelay::relay::{ObserverMessage, TopicSubscription};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Connectivity probe for the relay.
///
/// Two modes:
/// 1. Observer (default): attach to a relay's downstream socket and print
///    every event it broadcasts.
/// 2. Raw (--raw): subscribe straight to a rosbridge server, bypassing the
///    relay, to tell upstream problems apart from relay problems.
#[derive(Parser, Debug)]
#[command(name = "relay_probe", about = "Watch relay or rosbridge traffic")]
struct Args {
    /// Socket to connect to (relay observer socket, or rosbridge with --raw)
    #[arg(long)]
    url: Option<String>,

    /// Talk rosbridge directly instead of going through the relay
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Topic to subscribe in raw mode
    #[arg(long, default_value = "/talker")]
    topic: String,

    /// Message type for the raw-mode subscription
    #[arg(long = "type", default_value = "std_msgs/String")]
    message_type: String,

    /// Stop after this many seconds (0 = run until closed)
    #[arg(long, default_value_t = 0)]
    duration: u64,

    /// Stop after this many messages (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    count: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let probe = async {
        if args.raw {
            probe_rosbridge(&args).await
        } else {
            probe_relay(&args).await
        }
    };

    let result = if args.duration > 0 {
        match tokio::time::timeout(Duration::from_secs(args.duration), probe).await {
            Ok(result) => result,
            Err(_) => {
                logger::info(
                    LogTag::Test,
                    &format!("Probe finished after {}s", args.duration),
                );
                Ok(())
            }
        }
    } else {
        probe.await
    };

    logger::flush();
    result
}

async fn probe_relay(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let url = args
        .url
        .clone()
        .unwrap_or_else(|| "ws://127.0.0.1:3002/ws".to_string());

    logger::info(LogTag::Test, &format!("Connecting to relay at {}", url));
    let (mut socket, _) = connect_async(url.as_str()).await?;
    logger::info(LogTag::Test, "Connected, waiting for events");

    let mut seen = 0;
    while let Some(frame) = socket.next().await {
        match frame? {
            Message::Text(text) => match serde_json::from_str::<ObserverMessage>(&text) {
                Ok(event) => {
                    let body = event
                        .message
                        .as_deref()
                        .or(event.error.as_deref())
                        .unwrap_or("");
                    logger::info(
                        LogTag::Test,
                        &format!("[{}] {} {}", event.timestamp, event.status, body),
                    );
                    if event.status == "message" {
                        seen += 1;
                        if args.count > 0 && seen >= args.count {
                            break;
                        }
                    }
                }
                Err(_) => logger::info(LogTag::Test, &format!("(other) {}", text)),
            },
            Message::Close(_) => {
                logger::warning(LogTag::Test, "Relay closed the connection");
                break;
            }
            _ => {}
        }
    }

    let _ = socket.close(None).await;
    logger::info(LogTag::Test, &format!("Received {} messages", seen));
    Ok(())
}

async fn probe_rosbridge(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let url = args
        .url
        .clone()
        .unwrap_or_else(|| "ws://127.0.0.1:9090".to_string());
    rosrelay::relay::validate_endpoint(&url)?;

    logger::info(LogTag::Test, &format!("Connecting to rosbridge at {}", url));
    let (mut socket, _) = connect_async(url.as_str()).await?;

    let subscription = TopicSubscription::new(args.topic.as_str(), args.message_type.as_str());
    socket
        .send(Message::Text(protocol::subscribe_frame(&subscription, 1)?))
        .await?;
    logger::info(LogTag::Test, &format!("Subscribed to {}", subscription));

    let mut seen = 0;
    while let Some(frame) = socket.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => {
                logger::warning(LogTag::Test, "rosbridge closed the connection");
                break;
            }
            _ => continue,
        };

        match protocol::parse_frame(&text) {
            Ok(InboundFrame::Publish { topic, msg }) => {
                match protocol::extract_payload(subscription.message_kind(), &msg) {
                    Ok(payload) => logger::info(LogTag::Test, &format!("{}: {}", topic, payload)),
                    Err(e) => logger::warning(LogTag::Test, &format!("{}: {}", topic, e)),
                }
                seen += 1;
                if args.count > 0 && seen >= args.count {
                    break;
                }
            }
            Ok(InboundFrame::Status { level, text }) => {
                logger::warning(LogTag::Test, &format!("status [{}]: {}", level, text));
            }
            Ok(InboundFrame::Ignored { op }) => {
                logger::info(LogTag::Test, &format!("(ignored op '{}')", op));
            }
            Err(e) => logger::warning(LogTag::Test, &format!("Malformed frame: {}", e)),
        }
    }

    let _ = socket.close(None).await;
    logger::info(LogTag::Test, &format!("Received {} messages", seen));
    Ok(())
}
