//! linkup-ctl — command-line interface for the LinkUp daemon.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 9301;

fn print_usage() {
    println!("Usage: linkup-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                  Show session, address, and link state");
    println!("  discovery               List active peers from the registry");
    println!("  search <id>             Find a peer by exact id or address");
    println!("  chats                   List chats and their last messages");
    println!("  send <chat-id> <text>   Send a message into a chat");
    println!("  typing <chat-id> <on|off>  Set the typing indicator");
    println!("  feed                    Show the shared post feed");
    println!("  publish <media-url>...  Publish a post");
    println!();
    println!("Options:");
    println!("  --port <port>   Daemon API port (default: {})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args.get(i)
            .context("--port requires a value")?
            .parse()
            .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                 => cmd::status::cmd_status(port).await,
        ["discovery"]                   => cmd::discovery::cmd_discovery(port).await,
        ["search", id]                  => cmd::discovery::cmd_search(port, id).await,
        ["chats"]                       => cmd::chats::cmd_chats(port).await,
        ["send", chat_id, text]         => cmd::chats::cmd_send(port, chat_id, text).await,
        ["typing", chat_id, state]      => cmd::chats::cmd_typing(port, chat_id, state).await,
        ["feed"]                        => cmd::feed::cmd_feed(port).await,
        ["publish", media @ ..] if !media.is_empty() => cmd::feed::cmd_publish(port, media).await,
        ["help"] | ["--help"] | ["-h"]  => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
