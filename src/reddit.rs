use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::debug;

use crate::error::Error;

const BOT_USER_AGENT: &str = "redditshorts-bot/0.1";

/// One post selected for conversion into a video. Read-only snapshot; lives
/// for a single pipeline run.
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub author: String,
}

#[derive(Debug, Deserialize)]
pub struct RedditListing {
    pub data: RedditListingData,
}

#[derive(Debug, Deserialize)]
pub struct RedditListingData {
    pub children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
pub struct RedditChild {
    pub data: RedditPost,
}

#[derive(Debug, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub permalink: String,
    pub author: String,
    pub is_self: Option<bool>,
    pub over_18: Option<bool>,
}

/// Fetches today's top posts and keeps the ones worth narrating: self posts
/// with a body, nothing NSFW. Candidate order is the listing order.
pub async fn fetch_candidates(
    client: &reqwest::Client,
    subreddit: &str,
    limit: usize,
) -> Result<Vec<SourceItem>, Error> {
    let url = format!("https://www.reddit.com/r/{subreddit}/top.json?t=day&limit={limit}");
    let listing: RedditListing = client
        .get(&url)
        .header(USER_AGENT, BOT_USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(filter_candidates(listing))
}

fn filter_candidates(listing: RedditListing) -> Vec<SourceItem> {
    let mut candidates = Vec::new();
    for child in listing.data.children {
        let post = child.data;
        if post.over_18.unwrap_or(false) {
            debug!("Skipping NSFW post: {}", post.title);
            continue;
        }
        if !post.is_self.unwrap_or(true) || post.selftext.trim().is_empty() {
            debug!("Skipping post without a story body: {}", post.title);
            continue;
        }
        candidates.push(SourceItem {
            id: post.id,
            title: post.title.trim().to_string(),
            body: post.selftext.trim().to_string(),
            url: format!("https://www.reddit.com{}", post.permalink),
            author: post.author,
        });
    }
    candidates
}
