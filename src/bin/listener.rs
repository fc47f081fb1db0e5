use std::error::Error;
use std::net::TcpListener;

use peerwire::{Config, Connection, Event, Message};

/// Accepts inbound connections and answers the handshake, printing every
/// event. One peer at a time; this is a demo, not a node.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bind = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8333".to_string());
    let listener = TcpListener::bind(&bind)?;
    println!("Listening on {bind}");

    for stream in listener.incoming() {
        let stream = stream?;
        let peer = stream.peer_addr()?;
        println!("Accepted {peer}");

        let mut conn = Connection::inbound(stream, peer, Config::mainnet());
        conn.drive(|conn, event| match event {
            Event::Message(Message::Version(v)) => {
                println!("  version {} (height {})", v.version, v.start_height);
                // answer with our own version; the engine already sent verack
                if let Err(e) = conn.send_version() {
                    println!("  failed to send version: {e}");
                }
            }
            Event::Message(Message::Ping) => println!("  ping"),
            Event::Message(msg) => println!("  {:?}", msg.command()),
            Event::Disconnect => println!("  {peer} disconnected"),
            Event::Error(e) => println!("  {peer} error: {e}"),
            Event::Connect => {}
        });
    }

    Ok(())
}
