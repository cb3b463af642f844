pub mod completion;
pub mod offer_extractor;
pub mod prompt;

pub use completion::{CompletionClient, CompletionOutput, OpenAiChatClient, TokenUsage};
pub use offer_extractor::{CostLedger, OfferExtractor, RetryPolicy, TokenPricing, parse_settings};
