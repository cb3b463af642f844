//! Harvests vehicle incentive offers from a dealership's incentive search page
//! and normalises each offer block into a structured [`model::Offer`].

pub mod browser;
pub mod config;
pub mod extractor;
pub mod model;
pub mod navigator;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod storage;
pub mod utils;

pub use model::{Offer, OfferSettings};
pub use pipeline::{RunReport, scrape_incentives};
