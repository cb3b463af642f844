use crate::config::LlmConfig;
use crate::extractor::completion::{CompletionClient, CompletionOutput, TokenUsage};
use crate::extractor::prompt::{SYSTEM_INSTRUCTION, user_prompt};
use crate::model::{CompletionError, ExtractionError, OfferCategory, OfferSettings};
use crate::utils::{parse_amount, parse_iso_date};

use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// USD price of completion tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl TokenPricing {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        usage.prompt_tokens as f64 / 1000.0 * self.prompt_per_1k
            + usage.completion_tokens as f64 / 1000.0 * self.completion_per_1k
    }
}

/// Fixed-delay retry for transient completion failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Running usage totals across every completion call of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostLedger {
    pub total_usd: f64,
    pub calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl CostLedger {
    pub fn record(&mut self, usage: Option<&TokenUsage>, pricing: &TokenPricing) -> f64 {
        self.calls += 1;
        let Some(usage) = usage else {
            return 0.0;
        };
        let cost = pricing.cost(usage);
        self.total_usd += cost;
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        cost
    }
}

/// Turns one raw offer block into [`OfferSettings`] through a completion call.
pub struct OfferExtractor {
    client: Box<dyn CompletionClient>,
    pricing: TokenPricing,
    retry: RetryPolicy,
    ledger: CostLedger,
}

impl OfferExtractor {
    pub fn new(client: Box<dyn CompletionClient>, pricing: TokenPricing, retry: RetryPolicy) -> Self {
        Self {
            client,
            pricing,
            retry,
            ledger: CostLedger::default(),
        }
    }

    pub fn from_config(client: Box<dyn CompletionClient>, config: &LlmConfig) -> Self {
        Self::new(
            client,
            TokenPricing {
                prompt_per_1k: config.prompt_cost_per_1k,
                completion_per_1k: config.completion_cost_per_1k,
            },
            RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                delay: Duration::from_millis(config.retry_delay_ms),
            },
        )
    }

    pub fn cost(&self) -> CostLedger {
        self.ledger
    }

    pub async fn extract(
        &mut self,
        category: OfferCategory,
        raw_text: &str,
    ) -> Result<OfferSettings, ExtractionError> {
        let prompt = user_prompt(category, raw_text);
        let output = self.complete_with_retry(&prompt).await?;

        let cost = self.ledger.record(output.usage.as_ref(), &self.pricing);
        debug!(
            "Extraction cost ${:.5}, cumulative ${:.5} over {} calls",
            cost, self.ledger.total_usd, self.ledger.calls
        );

        parse_settings(&output.content, raw_text)
    }

    async fn complete_with_retry(&self, prompt: &str) -> Result<CompletionOutput, CompletionError> {
        let mut attempt = 1;
        loop {
            match self.client.complete(SYSTEM_INSTRUCTION, prompt).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        "Completion attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, self.retry.max_attempts, e, self.retry.delay
                    );
                    sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Validates a completion response into typed settings.
///
/// The response must decode as a JSON object. Individual keys that are
/// missing, unreadable or carry the wrong type become `None`.
pub fn parse_settings(content: &str, raw_text: &str) -> Result<OfferSettings, ExtractionError> {
    let body = strip_code_fence(content);
    let raw_fields: HashMap<String, Box<RawValue>> =
        serde_json::from_str(body).map_err(|e| ExtractionError::Format(e.to_string()))?;

    // values decode one by one; an unreadable value drops only its own key
    let fields: Map<String, Value> = raw_fields
        .into_iter()
        .filter_map(|(key, raw)| match serde_json::from_str(raw.get()) {
            Ok(value) => Some((key, value)),
            Err(e) => {
                debug!("Dropping unreadable field '{}': {}", key, e);
                None
            }
        })
        .collect();

    Ok(OfferSettings {
        payment: number_field(&fields, "payment"),
        payment_label: string_field(&fields, "payment_label"),
        term: count_field(&fields, "term"),
        down_payment: number_field(&fields, "down_payment"),
        down_payment_label: string_field(&fields, "down_payment_label"),
        expiration: string_field(&fields, "expiration").and_then(|s| parse_iso_date(&s)),
        price: string_field(&fields, "price"),
        disclaimer: string_field(&fields, "disclaimer").unwrap_or_default(),
        apr: string_field(&fields, "apr"),
        name: string_field(&fields, "name"),
        amount: number_field(&fields, "amount"),
        free_text: string_field(&fields, "free_text"),
        vin: string_field(&fields, "vin"),
        msrp: number_field(&fields, "msrp"),
        full_offer: raw_text.to_string(),
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // info string, e.g. ```json
    rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()).trim()
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn number_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn count_field(fields: &Map<String, Value>, key: &str) -> Option<u32> {
    match fields.get(key)? {
        Value::Number(n) => match n.as_u64() {
            Some(v) => u32::try_from(v).ok(),
            None => n
                .as_f64()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= u32::MAX as f64)
                .map(|v| v as u32),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<CompletionOutput, CompletionError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<CompletionOutput, CompletionError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for std::sync::Arc<Scripted> {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
        ) -> Result<CompletionOutput, CompletionError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(CompletionError::InvalidEnvelope("script exhausted".into())))
        }
    }

    fn reply(content: &str, prompt_tokens: u64, completion_tokens: u64) -> Result<CompletionOutput, CompletionError> {
        Ok(CompletionOutput {
            content: content.to_string(),
            usage: Some(TokenUsage { prompt_tokens, completion_tokens }),
        })
    }

    fn extractor(script: &std::sync::Arc<Scripted>, max_attempts: u32) -> OfferExtractor {
        OfferExtractor::new(
            Box::new(script.clone()),
            TokenPricing { prompt_per_1k: 0.0005, completion_per_1k: 0.0015 },
            RetryPolicy { max_attempts, delay: Duration::ZERO },
        )
    }

    const FINANCE_JSON: &str = r#"{"payment": null, "payment_label": null, "term": 60,
        "down_payment": null, "down_payment_label": null, "expiration": "2024-07-01",
        "price": null, "disclaimer": "Disclaimer(s) : ...", "apr": "3.99%",
        "name": "3.99% APR* For 60 Months", "amount": null, "msrp": null}"#;

    #[test]
    fn parses_full_record_and_keeps_raw_text() {
        let settings = parse_settings(FINANCE_JSON, "3.99% APR for 60 months").unwrap();
        assert_eq!(settings.term, Some(60));
        assert_eq!(settings.apr.as_deref(), Some("3.99%"));
        assert_eq!(settings.expiration.map(|d| d.to_string()).as_deref(), Some("2024-07-01"));
        assert_eq!(settings.full_offer, "3.99% APR for 60 months");
        assert_eq!(settings.down_payment, None);
        assert_eq!(settings.down_payment_label, None);
        assert_eq!(settings.vin, None);
    }

    #[test]
    fn mismatched_or_unknown_fields_become_null() {
        let settings = parse_settings(
            r#"{"term": "sixty", "payment": true, "apr": 3.99, "expiration": "July 1, 2024",
                "amount": "$2,000", "msrp": "45,300", "name": "  ", "bogus": 1}"#,
            "raw",
        )
        .unwrap();
        assert_eq!(settings.term, None);
        assert_eq!(settings.payment, None);
        assert_eq!(settings.apr, None);
        assert_eq!(settings.expiration, None);
        assert_eq!(settings.amount, Some(2000.0));
        assert_eq!(settings.msrp, Some(45300.0));
        assert_eq!(settings.name, None);
        assert_eq!(settings.disclaimer, "");
    }

    #[test]
    fn out_of_range_number_only_nulls_its_field() {
        let settings = parse_settings(r#"{"term": 60, "payment": 1e400, "apr": "3.99%"}"#, "raw").unwrap();
        assert_eq!(settings.payment, None);
        assert_eq!(settings.term, Some(60));
        assert_eq!(settings.apr.as_deref(), Some("3.99%"));
    }

    #[test]
    fn fractional_term_is_rejected_but_integral_float_kept() {
        let settings = parse_settings(r#"{"term": 36.0}"#, "raw").unwrap();
        assert_eq!(settings.term, Some(36));
        let settings = parse_settings(r#"{"term": 36.5}"#, "raw").unwrap();
        assert_eq!(settings.term, None);
    }

    #[test]
    fn code_fence_is_tolerated() {
        let fenced = format!("```json\n{}\n```", FINANCE_JSON);
        let settings = parse_settings(&fenced, "raw").unwrap();
        assert_eq!(settings.term, Some(60));
    }

    #[test]
    fn non_object_response_is_format_error() {
        assert!(matches!(
            parse_settings("Sorry, I cannot help with that.", "raw"),
            Err(ExtractionError::Format(_))
        ));
        assert!(matches!(
            parse_settings("[1, 2, 3]", "raw"),
            Err(ExtractionError::Format(_))
        ));
    }

    #[tokio::test]
    async fn accumulates_cost_across_calls() {
        let script = std::sync::Arc::new(Scripted::new(vec![
            reply(FINANCE_JSON, 1000, 1000),
            reply("not json", 2000, 0),
        ]));
        let mut extractor = extractor(&script, 3);

        extractor.extract(OfferCategory::Finance, "a").await.unwrap();
        assert!(extractor.extract(OfferCategory::Promotion, "b").await.is_err());

        let cost = extractor.cost();
        assert_eq!(cost.calls, 2);
        assert_eq!(cost.prompt_tokens, 3000);
        assert_eq!(cost.completion_tokens, 1000);
        assert!((cost.total_usd - 0.003).abs() < 1e-9);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let script = std::sync::Arc::new(Scripted::new(vec![
            Err(CompletionError::Timeout),
            Err(CompletionError::Status { status: 503, body: String::new() }),
            reply(FINANCE_JSON, 10, 10),
        ]));
        let mut extractor = extractor(&script, 3);

        let settings = extractor.extract(OfferCategory::Finance, "a").await.unwrap();
        assert_eq!(settings.term, Some(60));
        assert_eq!(*script.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let script = std::sync::Arc::new(Scripted::new(vec![
            Err(CompletionError::Http("reset".into())),
            Err(CompletionError::Http("reset".into())),
            reply(FINANCE_JSON, 10, 10),
        ]));
        let mut extractor = extractor(&script, 2);

        let result = extractor.extract(OfferCategory::Finance, "a").await;
        assert!(matches!(result, Err(ExtractionError::Service(CompletionError::Http(_)))));
        assert_eq!(*script.calls.lock().unwrap(), 2);
        assert_eq!(extractor.cost().calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_spaced_by_a_fixed_delay() {
        let script = std::sync::Arc::new(Scripted::new(vec![
            Err(CompletionError::Timeout),
            Err(CompletionError::Timeout),
            Err(CompletionError::Timeout),
        ]));
        let delay = Duration::from_secs(2);
        let mut extractor = OfferExtractor::new(
            Box::new(script.clone()),
            TokenPricing { prompt_per_1k: 0.0005, completion_per_1k: 0.0015 },
            RetryPolicy { max_attempts: 3, delay },
        );

        let started = tokio::time::Instant::now();
        let result = extractor.extract(OfferCategory::Finance, "a").await;

        assert!(matches!(result, Err(ExtractionError::Service(CompletionError::Timeout))));
        assert_eq!(*script.calls.lock().unwrap(), 3);
        // two gaps between three attempts, no growth between them
        assert_eq!(started.elapsed(), delay * 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let script = std::sync::Arc::new(Scripted::new(vec![
            Err(CompletionError::Status { status: 401, body: "bad key".into() }),
            reply(FINANCE_JSON, 10, 10),
        ]));
        let mut extractor = extractor(&script, 3);

        assert!(extractor.extract(OfferCategory::Finance, "a").await.is_err());
        assert_eq!(*script.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn format_errors_are_not_retried() {
        let script = std::sync::Arc::new(Scripted::new(vec![
            reply("garbage", 10, 10),
            reply(FINANCE_JSON, 10, 10),
        ]));
        let mut extractor = extractor(&script, 3);

        let result = extractor.extract(OfferCategory::Finance, "a").await;
        assert!(matches!(result, Err(ExtractionError::Format(_))));
        assert_eq!(*script.calls.lock().unwrap(), 1);
    }
}
