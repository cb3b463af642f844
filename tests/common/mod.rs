#![allow(dead_code)]

use incentive_harvest::browser::{Browser, HtmlSession, StaticPages};
use incentive_harvest::config::AppConfig;
use incentive_harvest::extractor::{
    CompletionClient, CompletionOutput, OfferExtractor, RetryPolicy, TokenPricing, TokenUsage,
};
use incentive_harvest::model::CompletionError;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const LISTING_URL: &str = "https://dealer.test/global-incentives-search/index.htm";

pub const FACETS: &str = r#"
    <div><h4>Refine</h4></div>
    <div><ul><li>2023</li><li>2024</li></ul></div>
    <div><ul><li>New</li></ul></div>
    <div><ul><li>Sport</li><li>Premium</li></ul></div>
    <div><ul><li>A3</li><li>Q3</li></ul></div>"#;

pub const FINANCE_REPLY: &str = r#"{"payment": null, "payment_label": null, "term": 60,
    "down_payment": null, "down_payment_label": null, "expiration": "2024-07-01",
    "price": null, "disclaimer": "", "apr": "3.99%", "name": "3.99% APR For 60 Months",
    "amount": null, "msrp": null}"#;

pub const PROMOTION_REPLY: &str = r#"{"term": null, "expiration": "2024-07-01",
    "disclaimer": "Disclaimer(s) : bonus", "name": "$2,000 National Audi Credit",
    "amount": 2000.0}"#;

/// Results page with one card per `(display name, detail path)`.
pub fn listing_page(vehicles: &[(&str, &str)]) -> String {
    let cards: String = vehicles
        .iter()
        .map(|(name, href)| {
            format!(
                r#"<div class="vehicle-container">
                    <a href="{href}#photos"><img alt="photo"></a>
                    <h5>{name}</h5>
                    <a href="{href}">View Offers</a>
                </div>"#
            )
        })
        .collect();
    format!(
        r#"<html><body>
            <div class="incentives-header"><span id="results-count">{}</span></div>
            <div class="facets-container">{}</div>
            <div class="vehicles-container">{}</div>
        </body></html>"#,
        vehicles.len(),
        FACETS,
        cards
    )
}

/// Detail page; an empty slice leaves the section out entirely.
pub fn detail_page(finance: &[&str], promotion: &[&str]) -> String {
    fn section(kind: &str, blocks: &[&str]) -> String {
        if blocks.is_empty() {
            return String::new();
        }
        let articles: String = blocks
            .iter()
            .map(|text| format!("<article><p>{}</p></article>", text))
            .collect();
        format!(r#"<section data-offer="{}">{}</section>"#, kind, articles)
    }
    format!(
        r#"<html><body><div class="ddc-wrapper"><div></div><div>{}{}</div></div></body></html>"#,
        section("APR", finance),
        section("PROMOTION", promotion)
    )
}

pub fn detail_url(path: &str) -> String {
    format!("https://dealer.test{}", path)
}

pub fn config() -> AppConfig {
    AppConfig {
        url: LISTING_URL.to_string(),
        debug_html_dir: None,
        ..AppConfig::default()
    }
}

pub async fn session(pages: StaticPages) -> HtmlSession {
    let mut session = HtmlSession::new(Box::new(pages));
    session.load(LISTING_URL).await.unwrap();
    session
}

type Reply = dyn Fn(&str) -> Result<String, CompletionError> + Send + Sync;

/// Completion stand-in answering from the user prompt.
#[derive(Clone)]
pub struct ScriptedCompletion {
    reply: Arc<Reply>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCompletion {
    pub fn new(reply: impl Fn(&str) -> Result<String, CompletionError> + Send + Sync + 'static) -> Self {
        Self {
            reply: Arc::new(reply),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Finance reply for prompts about APR, promotion reply otherwise.
    pub fn by_category() -> Self {
        Self::new(|prompt| {
            if prompt.contains("This is a Financial offer") {
                Ok(FINANCE_REPLY.to_string())
            } else {
                Ok(PROMOTION_REPLY.to_string())
            }
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
    ) -> Result<CompletionOutput, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = (self.reply)(user)?;
        Ok(CompletionOutput {
            content,
            usage: Some(TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 100,
            }),
        })
    }
}

pub fn extractor(completion: &ScriptedCompletion) -> OfferExtractor {
    OfferExtractor::new(
        Box::new(completion.clone()),
        TokenPricing {
            prompt_per_1k: 0.0005,
            completion_per_1k: 0.0015,
        },
        RetryPolicy {
            max_attempts: 2,
            delay: Duration::ZERO,
        },
    )
}
