//! Chat commands.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body, post_json_no_response};

#[derive(Deserialize)]
struct ChatsResponse {
    chats: Vec<ChatJson>,
}

#[derive(Deserialize)]
struct ChatJson {
    id:           String,
    participants: Vec<String>,
    messages:     Vec<MessageJson>,
}

#[derive(Deserialize)]
struct MessageJson {
    sender_id: String,
    text:      String,
    timestamp: u64,
}

pub async fn cmd_chats(port: u16) -> Result<()> {
    let resp: ChatsResponse = get_json(&format!("{}/chats", base_url(port))).await?;

    if resp.chats.is_empty() {
        println!("No chats yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Chats ({})", resp.chats.len());
    println!("═══════════════════════════════════════");

    for chat in &resp.chats {
        println!("  ┌─ {}", chat.id);
        println!("  │  with     : {}", chat.participants.join(", "));
        match chat.messages.last() {
            Some(last) => {
                println!("  │  messages : {}", chat.messages.len());
                println!("  └─ last     : [{}] {}: {}", last.timestamp, last.sender_id, last.text);
            }
            None => println!("  └─ messages : none"),
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct SendRequest {
    chat_id: String,
    text:    String,
}

#[derive(Deserialize)]
struct SendResponse {
    message: SentMessageJson,
}

#[derive(Deserialize)]
struct SentMessageJson {
    id:        String,
    timestamp: u64,
}

pub async fn cmd_send(port: u16, chat_id: &str, text: &str) -> Result<()> {
    let req = SendRequest {
        chat_id: chat_id.to_string(),
        text:    text.to_string(),
    };
    let resp: SendResponse = post_json_body(&format!("{}/chats/send", base_url(port)), &req).await?;

    println!("Message stored and sent (best effort):");
    println!("  ID        : {}", resp.message.id);
    println!("  Timestamp : {}", resp.message.timestamp);
    Ok(())
}

#[derive(Serialize)]
struct TypingRequest {
    chat_id:   String,
    is_typing: bool,
}

pub async fn cmd_typing(port: u16, chat_id: &str, state: &str) -> Result<()> {
    let is_typing = match state {
        "on"  => true,
        "off" => false,
        other => bail!("typing state must be 'on' or 'off', got '{other}'"),
    };
    let req = TypingRequest {
        chat_id: chat_id.to_string(),
        is_typing,
    };
    post_json_no_response(&format!("{}/chats/typing", base_url(port)), &req).await?;
    println!("Typing indicator {} for {}.", state, chat_id);
    Ok(())
}
