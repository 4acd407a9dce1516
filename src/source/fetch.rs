// src/source/fetch.rs
// =============================================================================
// Loads the documents the CLI is asked to filter.
//
// An input can be:
// - an http(s) URL: fetched with reqwest
// - "-": read from stdin
// - anything else: a file path
//
// Inputs load concurrently (a few at a time) but come back in the order
// they were given, so output lines up with the command line.
//
// Markdown inputs are rendered to HTML first, the same way the LMS renders
// markdown-formatted text before filters run on it.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use futures::stream::{self, StreamExt, TryStreamExt};
use pulldown_cmark::{html, Options, Parser};
use reqwest::Client;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::info;

// How many inputs are loaded at once
const CONCURRENT_LOADS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Text is already HTML (or plain text)
    Html,
    /// Text is markdown and gets rendered to HTML first
    Markdown,
}

/// One loaded input, ready to filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where it came from, as given on the command line
    pub source: String,
    pub text: String,
}

/// Loads every input, keeping their order. Fails on the first input that can't be read.
pub async fn load_documents(inputs: &[String], format: InputFormat) -> Result<Vec<Document>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    stream::iter(inputs)
        .map(|input| load_document(&client, input, format))
        .buffered(CONCURRENT_LOADS)
        .try_collect()
        .await
}

async fn load_document(client: &Client, input: &str, format: InputFormat) -> Result<Document> {
    let raw = if is_remote(input) {
        info!(url = input, "fetching");
        fetch_page(client, input).await?
    } else if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read stdin")?;
        text
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {}", input))?
    };

    let text = match format {
        InputFormat::Html => raw,
        InputFormat::Markdown => render_markdown(&raw),
    };

    Ok(Document {
        source: input.to_string(),
        text,
    })
}

fn is_remote(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

// Fetches a web page and returns its body
async fn fetch_page(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!("Failed to fetch {}: HTTP {}", url, response.status()));
    }

    Ok(response.text().await?)
}

/// Renders markdown to an HTML fragment.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
