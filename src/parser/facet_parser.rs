// Facet sidebar parsing: the vocabularies that bound model/trim/year matching
use crate::browser::{Browser, Element, Locator};
use crate::config::SelectorConfig;
use crate::model::{FacetCatalog, PipelineError};

use std::collections::BTreeSet;
use tracing::{info, warn};

/// Reads the year, body style and model groups of the facet sidebar.
///
/// A missing sidebar, group or an empty group is fatal: without a vocabulary
/// nothing downstream can be matched.
pub async fn build_catalog(
    browser: &dyn Browser,
    selectors: &SelectorConfig,
) -> Result<FacetCatalog, PipelineError> {
    info!("Preparing vocabularies for models, body styles and years");
    let sidebar = browser
        .try_find(None, &Locator::css(&selectors.facets_container))
        .await?
        .ok_or_else(|| PipelineError::FacetNotFound("sidebar is missing".into()))?;

    let years: BTreeSet<i32> = read_group(browser, &sidebar, selectors.year_group, selectors)
        .await?
        .into_iter()
        .filter_map(|label| match parse_year(&label) {
            Some(year) => Some(year),
            None => {
                warn!("Ignoring non-numeric year facet '{}'", label);
                None
            }
        })
        .collect();
    let styles: BTreeSet<String> = read_group(browser, &sidebar, selectors.style_group, selectors)
        .await?
        .into_iter()
        .collect();
    let models: BTreeSet<String> = read_group(browser, &sidebar, selectors.model_group, selectors)
        .await?
        .into_iter()
        .collect();

    for (name, len) in [("year", years.len()), ("body style", styles.len()), ("model", models.len())] {
        if len == 0 {
            return Err(PipelineError::FacetNotFound(format!("{} group is empty", name)));
        }
    }

    info!(
        "Catalog ready: {} years, {} body styles, {} models",
        years.len(),
        styles.len(),
        models.len()
    );
    Ok(FacetCatalog {
        years,
        styles,
        models,
    })
}

async fn read_group(
    browser: &dyn Browser,
    sidebar: &Element,
    position: usize,
    selectors: &SelectorConfig,
) -> Result<Vec<String>, PipelineError> {
    let group = browser
        .try_find(Some(sidebar), &Locator::nth_child("div", position))
        .await?
        .ok_or_else(|| PipelineError::FacetNotFound(format!("no facet group at position {}", position)))?;
    let list = browser
        .try_find(Some(&group), &Locator::css(&selectors.facet_list))
        .await?
        .ok_or_else(|| PipelineError::FacetNotFound(format!("facet group {} has no list", position)))?;

    let mut labels = Vec::new();
    for item in browser
        .find_all(Some(&list), &Locator::css(&selectors.facet_item))
        .await?
    {
        let text = browser.text(&item).await?;
        let label = facet_label(&text);
        if !label.is_empty() {
            labels.push(label.to_string());
        }
    }
    Ok(labels)
}

/// Drops the result count some sidebars append, e.g. `Premium (3)`.
fn facet_label(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.rfind('(') else {
        return text;
    };
    match text[open + 1..].strip_suffix(')') {
        Some(count) if !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) => {
            text[..open].trim_end()
        }
        _ => text,
    }
}

fn parse_year(label: &str) -> Option<i32> {
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    label.parse().ok()
}
