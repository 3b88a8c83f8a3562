//! Discovery and search commands.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body};

#[derive(Deserialize)]
struct DiscoveryResponse {
    candidates: Vec<CandidateJson>,
}

#[derive(Deserialize)]
struct CandidateJson {
    id:                String,
    profile:           ProfileJson,
    last_seen_secs:    u64,
    transport_address: String,
}

#[derive(Deserialize)]
struct ProfileJson {
    name: String,
    age:  u8,
    bio:  String,
}

pub async fn cmd_discovery(port: u16) -> Result<()> {
    let resp: DiscoveryResponse = get_json(&format!("{}/discovery", base_url(port))).await?;

    if resp.candidates.is_empty() {
        println!("Nobody around right now — try again in a bit.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Active Peers ({})", resp.candidates.len());
    println!("═══════════════════════════════════════");

    for c in &resp.candidates {
        println!("  ┌─ {} ({}, {})", c.id, c.profile.name, c.profile.age);
        println!("  │  address   : {}", c.transport_address);
        if !c.profile.bio.is_empty() {
            println!("  │  bio       : {}", c.profile.bio);
        }
        println!("  └─ last seen : {}s ago", c.last_seen_secs);
    }

    Ok(())
}

#[derive(Serialize)]
struct SearchRequest {
    query: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    found: bool,
    peer:  Option<CandidateJson>,
}

pub async fn cmd_search(port: u16, id: &str) -> Result<()> {
    let req = SearchRequest {
        query: id.to_string(),
    };
    let resp: SearchResponse =
        post_json_body(&format!("{}/discovery/search", base_url(port)), &req).await?;

    match resp.peer {
        Some(peer) if resp.found => {
            println!("Found {} ({}) — dialing.", peer.id, peer.profile.name);
            println!("  address   : {}", peer.transport_address);
            println!("  last seen : {}s ago", peer.last_seen_secs);
        }
        _ => println!("No peer matching '{}'.", id),
    }

    Ok(())
}
