use std::error::Error;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use clap::{Parser, Subcommand};

use peerwire::{Config, Connection, Event, Message};

#[derive(Parser)]
#[command(name = "peerwire-cli")]
struct Cli {
    /// Node to connect to, e.g. 127.0.0.1:8333
    #[arg(long)]
    node: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handshake, request peer addresses, print them
    GetAddr,
    /// Handshake, then print every event until the peer hangs up
    Watch,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    println!("Connecting to {}", cli.node);

    let addr = cli
        .node
        .to_socket_addrs()?
        .next()
        .ok_or("could not resolve address")?;

    let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(30))?;
    stream.set_read_timeout(Some(Duration::from_secs(60)))?;

    let mut conn = Connection::outbound(stream, addr, Config::mainnet())?;

    match cli.command {
        Commands::GetAddr => get_addresses(&mut conn),
        Commands::Watch => watch(&mut conn),
    }
}

fn get_addresses(conn: &mut Connection<TcpStream>) -> Result<(), Box<dyn Error>> {
    loop {
        match conn.next_event() {
            Event::Connect => println!("Connected, version sent"),
            Event::Message(Message::Verack) => {
                println!("Handshake complete (peer height {})", conn.best_height());
                conn.send_getaddr()?;
            }
            Event::Message(Message::Addr(entries)) => {
                println!("Received {} peer addresses", entries.len());
                for entry in entries {
                    println!("  {}:{}", entry.ip_addr(), entry.port);
                }
                return Ok(());
            }
            Event::Message(msg) => println!("Received {:?}", msg.command()),
            Event::Disconnect => {
                println!("Peer closed connection");
                return Ok(());
            }
            Event::Error(e) => return Err(e.into()),
        }
    }
}

fn watch(conn: &mut Connection<TcpStream>) -> Result<(), Box<dyn Error>> {
    loop {
        match conn.next_event() {
            Event::Connect => println!("Connected, version sent"),
            Event::Message(Message::Inv(invs)) => {
                println!("inv with {} vectors", invs.len());
            }
            Event::Message(Message::Block(block)) => {
                println!(
                    "block with {} txs, {} bytes on the wire",
                    block.txs.len(),
                    block.size
                );
            }
            Event::Message(msg) => println!("Received {:?}", msg.command()),
            Event::Disconnect => {
                println!("Peer closed connection");
                return Ok(());
            }
            Event::Error(e) => return Err(e.into()),
        }
    }
}
