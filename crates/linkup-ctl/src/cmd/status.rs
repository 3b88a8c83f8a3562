//! Status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    user_id:  String,
    address:  String,
    degraded: bool,
    links:    Vec<LinkJson>,
    chats:    usize,
    posts:    usize,
}

#[derive(Deserialize)]
struct LinkJson {
    peer_id: String,
    state:   String,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  LinkUp Session Status");
    println!("═══════════════════════════════════════");
    println!("  User    : {}", resp.user_id);
    println!("  Address : {}", resp.address);
    if resp.degraded {
        println!("  NOTE    : degraded — canonical address held by another session");
    }
    println!("  Chats   : {}", resp.chats);
    println!("  Posts   : {}", resp.posts);

    if resp.links.is_empty() {
        println!("\n  No open links.");
    } else {
        println!("\n  Links:");
        for link in &resp.links {
            println!("  ┌─ {}", link.peer_id);
            println!("  └─ state : {}", link.state);
        }
    }

    Ok(())
}
