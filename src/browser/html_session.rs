// Document session over fetched markup, parsed with `scraper`
use crate::browser::{Browser, Element, Locator, PageLoader};
use crate::model::BrowserError;
use crate::utils::tidy_text;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "br", "dd", "div", "dl", "dt", "footer", "form", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "section", "table",
    "tr", "ul",
];

/// Browser session that follows links by fetching their targets.
///
/// Every navigation bumps the document generation, so element handles read
/// before a `click` or `go_back` are rejected afterwards.
pub struct HtmlSession {
    loader: Box<dyn PageLoader>,
    history: Vec<String>,
    current: Option<String>,
    generation: u64,
}

impl HtmlSession {
    pub fn new(loader: Box<dyn PageLoader>) -> Self {
        Self {
            loader,
            history: Vec::new(),
            current: None,
            generation: 0,
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&Html) -> Result<T, BrowserError>,
    ) -> Result<T, BrowserError> {
        let markup = self.current.as_ref().ok_or(BrowserError::NoPage)?;
        let document = Html::parse_document(markup);
        f(&document)
    }

    fn resolve<'a>(
        &self,
        document: &'a Html,
        element: &Element,
    ) -> Result<ElementRef<'a>, BrowserError> {
        if element.generation() != self.generation {
            return Err(BrowserError::StaleElement);
        }
        let mut node = document.tree.root();
        for &index in element.path() {
            node = node
                .children()
                .nth(index)
                .ok_or(BrowserError::StaleElement)?;
        }
        ElementRef::wrap(node).ok_or(BrowserError::StaleElement)
    }

    fn handle(&self, element: ElementRef<'_>) -> Element {
        let mut path = Vec::new();
        let mut node = *element;
        while let Some(parent) = node.parent() {
            path.push(node.prev_siblings().count());
            node = parent;
        }
        path.reverse();
        Element::new(self.generation, path)
    }

    fn query(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, BrowserError> {
        self.with_document(|document| {
            let root = match scope {
                Some(element) => self.resolve(document, element)?,
                None => document.root_element(),
            };

            let found: Vec<ElementRef<'_>> = match locator {
                Locator::Css(css) => {
                    let selector = Selector::parse(css)
                        .map_err(|e| BrowserError::InvalidSelector(format!("{}: {:?}", css, e)))?;
                    root.select(&selector).collect()
                }
                Locator::NthChild { tag, position } => root
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| child.value().name().eq_ignore_ascii_case(tag))
                    .nth(position.saturating_sub(1))
                    .filter(|_| *position > 0)
                    .into_iter()
                    .collect(),
            };

            Ok(found.into_iter().map(|e| self.handle(e)).collect())
        })
    }

    fn element_text(&self, element: &Element) -> Result<String, BrowserError> {
        self.with_document(|document| {
            let element = self.resolve(document, element)?;
            let mut raw = String::new();
            collect_text(element, &mut raw);
            Ok(tidy_text(raw.lines()))
        })
    }

    /// Absolute URL the element navigates to, `None` for link-less buttons.
    fn link_target(&self, element: &Element) -> Result<Option<String>, BrowserError> {
        let base = self.current_url().ok_or(BrowserError::NoPage)?.to_string();
        self.with_document(|document| {
            let element = self.resolve(document, element)?;
            let Some(href) = element.value().attr("href") else {
                if element.value().name() == "button" {
                    return Ok(None);
                }
                return Err(BrowserError::Navigation(format!(
                    "<{}> element has no link target",
                    element.value().name()
                )));
            };
            let target = Url::parse(&base)
                .and_then(|url| url.join(href))
                .map_err(|e| BrowserError::Navigation(format!("bad link {}: {}", href, e)))?;
            Ok(Some(target.to_string()))
        })
    }

    async fn show(&mut self, url: String) -> Result<(), BrowserError> {
        let markup = self.loader.fetch(&url).await?;
        self.current = Some(markup);
        self.generation += 1;
        self.history.push(url);
        Ok(())
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if matches!(name, "script" | "style" | "noscript" | "template") {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_text(child_element, out);
            if block {
                out.push('\n');
            }
        }
    }
}

#[async_trait::async_trait]
impl Browser for HtmlSession {
    async fn load(&mut self, url: &str) -> Result<(), BrowserError> {
        debug!("Loading {}", url);
        self.show(url.to_string()).await
    }

    async fn find_one(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Element, BrowserError> {
        self.query(scope, locator)?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::NotFound(locator.to_string()))
    }

    async fn find_all(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, BrowserError> {
        self.query(scope, locator)
    }

    async fn text(&self, element: &Element) -> Result<String, BrowserError> {
        self.element_text(element)
    }

    async fn click(&mut self, element: &Element) -> Result<(), BrowserError> {
        match self.link_target(element)? {
            Some(url) => {
                debug!("Following link to {}", url);
                self.show(url).await
            }
            None => Ok(()),
        }
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        if self.history.len() < 2 {
            return Err(BrowserError::Navigation("no previous page".into()));
        }
        self.history.pop();
        let previous = self.history.pop().ok_or(BrowserError::NoPage)?;
        self.show(previous).await
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.current.clone().ok_or(BrowserError::NoPage)
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        self.history.clear();
        self.current = None;
        self.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::StaticPages;

    const LIST: &str = r#"<html><body>
        <div class="cards">
          <div class="card"><h5>First</h5><a href="/img/1">img</a><a href="/detail/1">Offers</a></div>
          <div class="card"><h5>Second</h5><a href="/img/2">img</a><a href="detail/2">Offers</a></div>
        </div>
        <button class="consent">OK</button>
    </body></html>"#;

    const DETAIL: &str = r#"<html><body>
        <article><h3>3.99% APR* For 60 Months.</h3><p>Offer only valid <b>Jun 04, 2024</b> through Jul 01, 2024</p>
        <script>var x = 1;</script></article>
    </body></html>"#;

    async fn session() -> HtmlSession {
        let pages = StaticPages::new()
            .with_page("https://d.test/list/", LIST)
            .with_page("https://d.test/detail/1", DETAIL)
            .with_page("https://d.test/list/detail/2", DETAIL);
        let mut session = HtmlSession::new(Box::new(pages));
        session.load("https://d.test/list/").await.unwrap();
        session
    }

    #[tokio::test]
    async fn finds_scoped_and_positional_elements() {
        let session = session().await;
        let cards = session.find_all(None, &Locator::css(".card")).await.unwrap();
        assert_eq!(cards.len(), 2);

        let name = session
            .find_one(Some(&cards[1]), &Locator::css("h5"))
            .await
            .unwrap();
        assert_eq!(session.text(&name).await.unwrap(), "Second");

        let link = session
            .find_one(Some(&cards[0]), &Locator::nth_child("a", 2))
            .await
            .unwrap();
        assert_eq!(session.text(&link).await.unwrap(), "Offers");

        let missing = session
            .find_one(Some(&cards[0]), &Locator::nth_child("a", 3))
            .await;
        assert!(matches!(missing, Err(BrowserError::NotFound(_))));
        assert!(
            session
                .try_find(None, &Locator::css(".nope"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn invalid_selector_is_not_absence() {
        let session = session().await;
        let result = session.try_find(None, &Locator::css("[[[")).await;
        assert!(matches!(result, Err(BrowserError::InvalidSelector(_))));
    }

    #[tokio::test]
    async fn click_follows_relative_links_and_back_restores_listing() {
        let mut session = session().await;
        let cards = session.find_all(None, &Locator::css(".card")).await.unwrap();
        let link = session
            .find_one(Some(&cards[1]), &Locator::nth_child("a", 2))
            .await
            .unwrap();
        session.click(&link).await.unwrap();
        assert_eq!(session.current_url(), Some("https://d.test/list/detail/2"));

        let article = session.find_one(None, &Locator::css("article")).await.unwrap();
        assert_eq!(
            session.text(&article).await.unwrap(),
            "3.99% APR* For 60 Months.\nOffer only valid Jun 04, 2024 through Jul 01, 2024"
        );

        session.go_back().await.unwrap();
        assert_eq!(session.current_url(), Some("https://d.test/list/"));
        let cards = session.find_all(None, &Locator::css(".card")).await.unwrap();
        assert_eq!(cards.len(), 2);
    }

    #[tokio::test]
    async fn handles_go_stale_after_navigation() {
        let mut session = session().await;
        let cards = session.find_all(None, &Locator::css(".card")).await.unwrap();
        let link = session
            .find_one(Some(&cards[0]), &Locator::nth_child("a", 2))
            .await
            .unwrap();
        session.click(&link).await.unwrap();
        session.go_back().await.unwrap();

        assert!(matches!(
            session.text(&cards[0]).await,
            Err(BrowserError::StaleElement)
        ));
    }

    #[tokio::test]
    async fn clicking_a_plain_button_stays_on_page() {
        let mut session = session().await;
        let button = session.find_one(None, &Locator::css("button.consent")).await.unwrap();
        session.click(&button).await.unwrap();
        assert_eq!(session.current_url(), Some("https://d.test/list/"));
    }

    #[tokio::test]
    async fn back_without_history_fails_and_quit_clears_page() {
        let mut session = session().await;
        assert!(matches!(
            session.go_back().await,
            Err(BrowserError::Navigation(_))
        ));
        session.quit().await.unwrap();
        assert!(matches!(
            session.page_source().await,
            Err(BrowserError::NoPage)
        ));
    }
}
