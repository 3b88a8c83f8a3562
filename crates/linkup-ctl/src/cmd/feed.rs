//! Feed commands.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body};

#[derive(Deserialize)]
struct FeedResponse {
    posts: Vec<PostJson>,
}

#[derive(Deserialize)]
struct PostJson {
    id:        String,
    user_id:   String,
    media:     Vec<String>,
    likes:     Vec<String>,
    comments:  Vec<CommentJson>,
    timestamp: u64,
}

#[derive(Deserialize)]
struct CommentJson {
    user_name: String,
    text:      String,
}

pub async fn cmd_feed(port: u16) -> Result<()> {
    let resp: FeedResponse = get_json(&format!("{}/feed", base_url(port))).await?;

    if resp.posts.is_empty() {
        println!("The feed is empty.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Feed ({} posts)", resp.posts.len());
    println!("═══════════════════════════════════════");

    for post in &resp.posts {
        println!("  ┌─ {} by {} [{}]", &post.id[..12.min(post.id.len())], post.user_id, post.timestamp);
        println!("  │  media    : {}", post.media.join(", "));
        println!("  │  likes    : {}", post.likes.len());
        if post.comments.is_empty() {
            println!("  └─ comments : none");
        } else {
            println!("  │  comments : {}", post.comments.len());
            let last = &post.comments[post.comments.len() - 1];
            println!("  └─ last     : {}: {}", last.user_name, last.text);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct PublishRequest {
    media:    Vec<String>,
    is_video: Vec<bool>,
}

#[derive(Deserialize)]
struct PublishResponse {
    post: PublishedPostJson,
}

#[derive(Deserialize)]
struct PublishedPostJson {
    id: String,
}

pub async fn cmd_publish(port: u16, media: &[&str]) -> Result<()> {
    let req = PublishRequest {
        media:    media.iter().map(|m| m.to_string()).collect(),
        is_video: media.iter().map(|_| false).collect(),
    };
    let resp: PublishResponse =
        post_json_body(&format!("{}/feed/publish", base_url(port)), &req).await?;

    println!("Post published:");
    println!("  ID : {}", resp.post.id);
    Ok(())
}
