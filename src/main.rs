use std::{error::Error, fs, path::PathBuf};

use clap::Parser;
use log::{info, warn};

use mysqlsniff::util::collations::collation_name;
use mysqlsniff::util::config::get_chunk_size;
use mysqlsniff::{Decoder, FnSink, Message};

/// Decodes a captured MySQL conversation.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Bytes the client sent, in order
    client: PathBuf,
    /// Bytes the server sent, in order
    server: PathBuf,
    /// Bytes fed per call, defaults to $MYSQLSNIFF_CHUNK_SIZE or 4096
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Print one JSON object per message
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let client = fs::read(&cli.client)?;
    let server = fs::read(&cli.server)?;
    let chunk_size = cli.chunk_size.filter(|&size| size > 0).unwrap_or_else(get_chunk_size);
    info!(
        "replaying {} client and {} server bytes in chunks of {}",
        client.len(),
        server.len(),
        chunk_size
    );

    let json = cli.json;
    let mut decoder = Decoder::new(FnSink(|message: Message| {
        if !json {
            println!("{}", render(&message));
            return;
        }
        match serde_json::to_string(&message) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("cannot serialize {:?}: {}", message, e),
        }
    }));

    let mut client_chunks = client.chunks(chunk_size);
    let mut server_chunks = server.chunks(chunk_size);
    loop {
        let client_chunk = client_chunks.next();
        let server_chunk = server_chunks.next();
        if client_chunk.is_none() && server_chunk.is_none() {
            break;
        }

        if let Some(chunk) = client_chunk {
            decoder.feed_client(chunk)?;
        }
        if let Some(chunk) = server_chunk {
            decoder.feed_server(chunk)?;
        }
    }

    info!("stopped in {:?}", decoder.connection().state);
    Ok(())
}

fn render(message: &Message) -> String {
    let charset = match message {
        Message::ServerHandshake(handshake) => Some(u16::from(handshake.character_set)),
        Message::ClientHandshake(response) => response.character_set.map(u16::from),
        Message::ColumnDefinition(column) => Some(column.character_set),
        _ => None,
    };

    match charset.and_then(collation_name) {
        Some(collation) => format!("{message:?} [{collation}]"),
        None => format!("{message:?}"),
    }
}
