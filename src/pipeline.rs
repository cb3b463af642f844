// End-to-end run: page load, catalog, traversal, browser shutdown
use crate::browser::{Browser, Locator};
use crate::config::AppConfig;
use crate::extractor::{CostLedger, OfferExtractor};
use crate::model::{Offer, PipelineError};
use crate::navigator::{ModelNavigator, TraversalOutcome, dismiss_consent};
use crate::parser::build_catalog;
use crate::utils::to_kebab_case;

use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Result of a run that got as far as traversing listings.
#[derive(Debug)]
pub struct RunReport {
    pub offers: Vec<Offer>,
    pub outcome: TraversalOutcome,
    pub cost: CostLedger,
    /// Count shown in the results header, when the page has one.
    pub advertised_count: Option<usize>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, TraversalOutcome::Done)
    }
}

/// Harvests every offer on the incentive search page at `config.url`.
///
/// Errors before traversal (page load, facet sidebar) are returned as `Err`.
/// Errors during traversal end up in [`RunReport::outcome`] together with the
/// offers collected so far. The browser is shut down in every case.
pub async fn scrape_incentives(
    browser: &mut dyn Browser,
    extractor: &mut OfferExtractor,
    config: &AppConfig,
) -> Result<RunReport, PipelineError> {
    let result = run(browser, extractor, config).await;

    info!("Quitting browser");
    if let Err(e) = browser.quit().await {
        warn!("Browser did not shut down cleanly: {}", e);
    }
    result
}

async fn run(
    browser: &mut dyn Browser,
    extractor: &mut OfferExtractor,
    config: &AppConfig,
) -> Result<RunReport, PipelineError> {
    let selectors = &config.selectors;

    info!("Loading {}", config.url);
    browser.load(&config.url).await?;
    dismiss_consent(&mut *browser, selectors).await;

    let advertised_count = read_results_count(&*browser, &config.selectors.results_count).await;
    if let Some(count) = advertised_count {
        info!("Results header advertises {} vehicles", count);
    }

    let catalog = match build_catalog(&*browser, selectors).await {
        Ok(catalog) => catalog,
        Err(e) => {
            save_snapshot(&*browser, config.debug_html_dir.as_deref(), "facets").await;
            return Err(e);
        }
    };

    let report = ModelNavigator::new(&mut *browser, &mut *extractor, &catalog, selectors)
        .run()
        .await;

    if let TraversalOutcome::Aborted(PipelineError::ListingIntegrity { .. }) = report.outcome {
        save_snapshot(&*browser, config.debug_html_dir.as_deref(), "listing").await;
    }
    if let (Some(count), TraversalOutcome::Done) = (advertised_count, &report.outcome) {
        if report.vehicles_visited != count {
            warn!(
                "Visited {} vehicles but the header advertised {}",
                report.vehicles_visited, count
            );
        }
    }

    let cost = extractor.cost();
    info!(
        "Extraction usage: {} calls, {} prompt / {} completion tokens, ${:.4}",
        cost.calls, cost.prompt_tokens, cost.completion_tokens, cost.total_usd
    );

    Ok(RunReport {
        offers: report.offers,
        outcome: report.outcome,
        cost,
        advertised_count,
    })
}

async fn read_results_count(browser: &dyn Browser, selector: &str) -> Option<usize> {
    let element = browser.try_find(None, &Locator::css(selector)).await.ok()??;
    let text = browser.text(&element).await.ok()?;
    text.trim().parse().ok()
}

/// Writes the current markup next to the logs so a selector mismatch can be inspected.
async fn save_snapshot(browser: &dyn Browser, dir: Option<&Path>, label: &str) {
    let Some(dir) = dir else {
        return;
    };
    let html = match browser.page_source().await {
        Ok(html) => html,
        Err(e) => {
            warn!("No page to snapshot: {}", e);
            return;
        }
    };
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("Failed to create debug folder: {}", e);
        return;
    }
    let filename = dir.join(format!("debug-{}.html", to_kebab_case(label)));
    if let Err(e) = fs::write(&filename, html) {
        warn!("Failed to write debug HTML: {}", e);
    } else {
        info!("Saved debug HTML: {}", filename.display());
    }
}
