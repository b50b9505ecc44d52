use crate::config::SourceConfig;
use crate::fetcher::Fetcher;
use crate::types::{AnalyzerError, ExtractedListing, PagePosition, RawCandidate, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

struct CompiledSelectors {
    list: Option<Selector>,
    title: Option<Selector>,
    url: Option<Selector>,
    category: Option<Selector>,
    image: Option<Selector>,
    timestamp: Option<Selector>,
    full_text: Option<Selector>,
}

/// Configuration-driven field extraction for one source: enumerates listing
/// candidates, pulls the configured fields per candidate, and optionally
/// follows each candidate's URL for full body text. A single malformed
/// element is dropped and counted, never fatal for the pass.
pub struct FieldExtractor<'a> {
    config: &'a SourceConfig,
    fetcher: &'a Fetcher,
    selectors: CompiledSelectors,
    base: Url,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(config: &'a SourceConfig, fetcher: &'a Fetcher) -> Result<Self> {
        let items = &config.news_item_selectors;
        let selectors = CompiledSelectors {
            list: compile(config.news_list_selector.as_deref())?,
            title: compile(items.title.as_deref())?,
            url: compile(items.url.as_deref())?,
            category: compile(items.category.as_deref())?,
            image: compile(items.main_image.as_deref())?,
            timestamp: compile(items.publication_timestamp.as_deref())?,
            full_text: compile(items.full_text.as_deref())?,
        };
        Ok(Self {
            config,
            fetcher,
            selectors,
            base: config.base()?,
        })
    }

    /// Run one extraction pass: fetch the listing page, extract every
    /// candidate, then fetch detail pages for full text where configured.
    pub async fn extract(&self) -> Result<ExtractedListing> {
        let html = self.fetcher.fetch_page(&self.config.base_url).await?;
        let mut listing = self.parse_listing(&html);

        if self.selectors.full_text.is_some() {
            for candidate in &mut listing.candidates {
                candidate.full_text = self.fetch_full_text(&candidate.url).await;
            }
        }

        info!(
            "Scraped {} candidates from {} ({} dropped)",
            listing.candidates.len(),
            self.config.name,
            listing.dropped
        );
        Ok(listing)
    }

    /// Parse the listing page into candidates. Synchronous on purpose: the
    /// parsed document never crosses an await point.
    pub(crate) fn parse_listing(&self, html: &str) -> ExtractedListing {
        let document = Html::parse_document(html);
        let mut candidates = Vec::new();
        let mut dropped = 0;

        match &self.selectors.list {
            Some(list) => {
                let elements: Vec<ElementRef> = document.select(list).collect();
                let total = elements.len();
                for (index, element) in elements.into_iter().enumerate() {
                    let position = PagePosition::classify(index, total);
                    match self.extract_candidate(element, position) {
                        Some(candidate) => candidates.push(candidate),
                        None => dropped += 1,
                    }
                }
            }
            None => {
                // No listing selector: the whole page is one candidate
                // scope and its position cannot be determined.
                let scope = document.root_element();
                match self.extract_candidate(scope, PagePosition::Unknown) {
                    Some(candidate) => candidates.push(candidate),
                    None => dropped += 1,
                }
            }
        }

        ExtractedListing { candidates, dropped }
    }

    fn extract_candidate(
        &self,
        scope: ElementRef<'_>,
        position: PagePosition,
    ) -> Option<RawCandidate> {
        // Title is mandatory; its absence silently drops the candidate.
        let title = select_text(scope, self.selectors.title.as_ref())?;

        let href = select_attr(scope, self.selectors.url.as_ref(), "href")?;
        let url = match self.base.join(&href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!("Unresolvable candidate URL {href:?}: {e}");
                return None;
            }
        };

        let image_url = select_attr(scope, self.selectors.image.as_ref(), "src")
            .and_then(|src| self.base.join(&src).ok())
            .map(|u| u.to_string());

        Some(RawCandidate {
            title,
            url,
            raw_timestamp: select_text(scope, self.selectors.timestamp.as_ref()),
            category: select_text(scope, self.selectors.category.as_ref()),
            image_url,
            position,
            full_text: None,
        })
    }

    /// Fetch and extract a candidate's detail page. Failure degrades to no
    /// full text, never to a candidate failure.
    async fn fetch_full_text(&self, url: &str) -> Option<String> {
        let selector = self.selectors.full_text.as_ref()?;
        match self.fetcher.fetch_page(url).await {
            Ok(body) => extract_full_text(&body, selector),
            Err(e) => {
                warn!("Failed to fetch full text from {url}: {e}");
                None
            }
        }
    }
}

fn compile(selector: Option<&str>) -> Result<Option<Selector>> {
    selector
        .map(|s| {
            Selector::parse(s)
                .map_err(|e| AnalyzerError::InvalidConfig(format!("selector {s:?}: {e}")))
        })
        .transpose()
}

/// Text of the first element matching `selector` inside `scope`, trimmed
/// and whitespace-collapsed. None when the selector is absent, matches
/// nothing, or the match holds no text.
fn select_text(scope: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let element = scope.select(selector?).next()?;
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

fn select_attr(
    scope: ElementRef<'_>,
    selector: Option<&Selector>,
    attribute: &str,
) -> Option<String> {
    scope
        .select(selector?)
        .next()?
        .value()
        .attr(attribute)
        .map(|s| s.to_string())
}

/// Space-joined text of every element matching the full-text selector.
fn extract_full_text(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    let parts: Vec<String> = document
        .select(selector)
        .map(|element| {
            element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}
