// Per-vehicle traversal: listing -> detail -> offer blocks -> back to listing
use crate::browser::{Browser, Element, Locator};
use crate::config::SelectorConfig;
use crate::extractor::OfferExtractor;
use crate::model::{BrowserError, FacetCatalog, Offer, OfferCategory, PipelineError, RawOfferBlock};
use crate::normalizer::resolve_identity;

use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum TraversalOutcome {
    Done,
    Aborted(PipelineError),
}

/// Offers collected by one traversal, kept even when the traversal aborts.
#[derive(Debug)]
pub struct TraversalReport {
    pub offers: Vec<Offer>,
    pub outcome: TraversalOutcome,
    pub vehicles_visited: usize,
    pub blocks_skipped: usize,
}

enum NavState {
    /// On the results page; `listings` were enumerated after the last navigation.
    Listing { index: usize, listings: Vec<Element> },
    /// On the detail page of listing `index`.
    Detail { index: usize, name: String },
    Done,
    Aborted(PipelineError),
}

pub struct ModelNavigator<'a> {
    browser: &'a mut dyn Browser,
    extractor: &'a mut OfferExtractor,
    catalog: &'a FacetCatalog,
    selectors: &'a SelectorConfig,
}

impl<'a> ModelNavigator<'a> {
    pub fn new(
        browser: &'a mut dyn Browser,
        extractor: &'a mut OfferExtractor,
        catalog: &'a FacetCatalog,
        selectors: &'a SelectorConfig,
    ) -> Self {
        Self {
            browser,
            extractor,
            catalog,
            selectors,
        }
    }

    /// Visits every listed vehicle once, in listing order.
    ///
    /// The listing count read on entry must hold on every return to the
    /// results page; a change aborts the traversal with
    /// [`PipelineError::ListingIntegrity`].
    pub async fn run(mut self) -> TraversalReport {
        let mut report = TraversalReport {
            offers: Vec::new(),
            outcome: TraversalOutcome::Done,
            vehicles_visited: 0,
            blocks_skipped: 0,
        };

        let (expected, mut state) = match self.listings().await {
            Ok(listings) => (listings.len(), NavState::Listing { index: 0, listings }),
            Err(e) => (0, NavState::Aborted(e.into())),
        };
        info!("Vehicles listed: {}", expected);

        loop {
            state = match state {
                NavState::Listing { index, listings } => {
                    self.on_listing(index, listings, expected).await
                }
                NavState::Detail { index, name } => self.on_detail(index, name, &mut report).await,
                NavState::Done => {
                    report.outcome = TraversalOutcome::Done;
                    break;
                }
                NavState::Aborted(e) => {
                    error!(
                        "Traversal aborted after {} vehicles: {}",
                        report.vehicles_visited, e
                    );
                    report.outcome = TraversalOutcome::Aborted(e);
                    break;
                }
            };
        }

        info!(
            "Traversal finished: {} offers from {} vehicles, {} blocks skipped",
            report.offers.len(),
            report.vehicles_visited,
            report.blocks_skipped
        );
        report
    }

    async fn on_listing(&mut self, index: usize, listings: Vec<Element>, expected: usize) -> NavState {
        if listings.len() != expected {
            return NavState::Aborted(PipelineError::ListingIntegrity {
                expected,
                found: listings.len(),
            });
        }
        if index >= expected {
            return NavState::Done;
        }

        match self.open(&listings[index]).await {
            Ok(name) => NavState::Detail { index, name },
            Err(e) => NavState::Aborted(e.into()),
        }
    }

    async fn on_detail(&mut self, index: usize, name: String, report: &mut TraversalReport) -> NavState {
        report.vehicles_visited += 1;

        let blocks = match self.harvest_blocks().await {
            Ok(blocks) => blocks,
            Err(e) => return NavState::Aborted(e.into()),
        };

        // identity comes from the listing name, never from the offer text
        let identity = resolve_identity(&name, self.catalog);
        for block in blocks {
            match self.extractor.extract(block.category, &block.text).await {
                Ok(settings) => {
                    report
                        .offers
                        .push(Offer::new(&name, &identity, block.category, settings));
                }
                Err(e) => {
                    warn!("Skipping {} offer block of '{}': {}", block.category, name, e);
                    report.blocks_skipped += 1;
                }
            }
        }

        if let Err(e) = self.browser.go_back().await {
            return NavState::Aborted(e.into());
        }
        dismiss_consent(&mut *self.browser, self.selectors).await;

        match self.listings().await {
            Ok(listings) => NavState::Listing {
                index: index + 1,
                listings,
            },
            Err(e) => NavState::Aborted(e.into()),
        }
    }

    /// Enumerates listing cards of the current page. A missing container counts as zero cards.
    async fn listings(&self) -> Result<Vec<Element>, BrowserError> {
        let Some(container) = self
            .browser
            .try_find(None, &Locator::css(&self.selectors.listing_container))
            .await?
        else {
            return Ok(Vec::new());
        };
        self.browser
            .find_all(Some(&container), &Locator::css(&self.selectors.listing_item))
            .await
    }

    /// Reads the listing's display name and opens its detail view.
    async fn open(&mut self, listing: &Element) -> Result<String, BrowserError> {
        let title = self
            .browser
            .find_one(Some(listing), &Locator::css(&self.selectors.listing_name))
            .await?;
        let name = self.browser.text(&title).await?;
        info!("Getting all offers for: {}", name);

        let link = self
            .browser
            .find_one(
                Some(listing),
                &Locator::nth_child("a", self.selectors.detail_link_position),
            )
            .await?;
        self.browser.click(&link).await?;
        dismiss_consent(&mut *self.browser, self.selectors).await;
        Ok(name)
    }

    async fn harvest_blocks(&self) -> Result<Vec<RawOfferBlock>, BrowserError> {
        let sections = [
            (OfferCategory::Finance, &self.selectors.finance_section),
            (OfferCategory::Promotion, &self.selectors.promotion_section),
        ];

        let mut blocks = Vec::new();
        for (category, selector) in sections {
            let Some(section) = self.browser.try_find(None, &Locator::css(selector)).await? else {
                info!("No {} offers found", category);
                continue;
            };
            for article in self
                .browser
                .find_all(Some(&section), &Locator::css(&self.selectors.offer_article))
                .await?
            {
                let text = self.browser.text(&article).await?;
                if text.is_empty() {
                    debug!("Ignoring empty {} offer block", category);
                    continue;
                }
                blocks.push(RawOfferBlock { category, text });
            }
        }
        Ok(blocks)
    }
}

/// Clicks the cookie/consent button when one is shown. Every failure is ignored.
pub async fn dismiss_consent(browser: &mut dyn Browser, selectors: &SelectorConfig) {
    match browser
        .try_find(None, &Locator::css(&selectors.consent_button))
        .await
    {
        Ok(Some(button)) => {
            if let Err(e) = browser.click(&button).await {
                debug!("Consent banner could not be dismissed: {}", e);
            }
        }
        Ok(None) => {}
        Err(e) => debug!("Consent banner lookup failed: {}", e),
    }
}
