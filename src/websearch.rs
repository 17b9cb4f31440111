//! Web-search collaborator: the last rung of the fallback ladder.
//!
//! Treated as a black box that accepts free text and returns text plus
//! citations. The DuckDuckGo implementation scrapes the HTML endpoint and
//! needs no API key.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::WebSearchConfig;

#[derive(Debug, Clone)]
pub struct WebAnswer {
    pub text: String,
    pub citations: Vec<String>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<WebAnswer>;
}

pub fn create_web_search(config: &WebSearchConfig) -> Result<Box<dyn WebSearch>> {
    match config.provider.as_str() {
        "duckduckgo" => Ok(Box::new(DuckDuckGo {
            max_results: config.max_results,
            timeout_secs: config.timeout_secs,
        })),
        "disabled" => Ok(Box::new(DisabledWebSearch)),
        other => anyhow::bail!("Unknown web search provider: {}", other),
    }
}

/// No-network fallback that reports the gap instead of answering.
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    async fn search(&self, query: &str) -> Result<WebAnswer> {
        Ok(WebAnswer {
            text: format!("No internal knowledge matched \"{}\".", query),
            citations: Vec::new(),
        })
    }
}

pub struct DuckDuckGo {
    max_results: usize,
    timeout_secs: u64,
}

#[async_trait]
impl WebSearch for DuckDuckGo {
    async fn search(&self, query: &str) -> Result<WebAnswer> {
        let client = reqwest::Client::builder()
            .user_agent("kb-pipeline/0.3")
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );
        let html = client.get(&url).send().await?.text().await?;

        let results = parse_ddg_results(&html, self.max_results);

        let mut text = String::new();
        let mut citations = Vec::new();
        for (title, snippet, url) in &results {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(title);
            if !snippet.is_empty() {
                text.push_str(": ");
                text.push_str(snippet);
            }
            citations.push(url.clone());
        }

        if text.is_empty() {
            text = format!("No results found for: {}", query);
        }

        Ok(WebAnswer { text, citations })
    }
}

fn parse_ddg_results(html: &str, max: usize) -> Vec<(String, String, String)> {
    let mut results = Vec::new();

    for segment in html.split("class=\"result__a\"").skip(1).take(max) {
        let title = extract_between(segment, ">", "</a>")
            .unwrap_or_default()
            .replace("<b>", "")
            .replace("</b>", "");

        let url = extract_between(segment, "href=\"", "\"").unwrap_or_default();

        let snippet = if let Some(snip_seg) = segment.split("class=\"result__snippet\"").nth(1) {
            extract_between(snip_seg, ">", "</")
                .unwrap_or_default()
                .replace("<b>", "")
                .replace("</b>", "")
        } else {
            String::new()
        };

        if !title.is_empty() {
            results.push((
                title.trim().to_string(),
                snippet.trim().to_string(),
                url.trim().to_string(),
            ));
        }
    }
    results
}

fn extract_between(text: &str, start: &str, end: &str) -> Option<String> {
    let start_idx = text.find(start)? + start.len();
    let remaining = &text[start_idx..];
    let end_idx = remaining.find(end)?;
    Some(remaining[..end_idx].to_string())
}
