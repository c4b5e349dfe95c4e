use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::USER_AGENT;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::BrowseError;

/// The narrow slice of a browser the watcher needs.
pub trait Browser {
    async fn load(&mut self, url: &str) -> Result<(), BrowseError>;
    async fn refresh(&mut self) -> Result<(), BrowseError>;
    fn find_element(&self, selector: &str) -> Result<Option<Element>, BrowseError>;
    /// Release whatever the session holds. Safe to call more than once.
    async fn close(&mut self);
}

/// Detached snapshot of one DOM element.
#[derive(Debug, Clone)]
pub struct Element {
    outer_html: String,
    attrs: BTreeMap<String, String>,
    text_content: String,
    base: Option<Url>,
}

impl Element {
    /// Attribute value. `href` and `src` are resolved against the page URL,
    /// the way a browser reports them.
    pub fn attribute(&self, name: &str) -> Option<String> {
        let raw = self.attrs.get(name)?;
        match (name, &self.base) {
            ("href" | "src", Some(base)) => base
                .join(raw)
                .map(|u| u.to_string())
                .ok()
                .or_else(|| Some(raw.clone())),
            _ => Some(raw.clone()),
        }
    }

    pub fn text_content(&self) -> &str {
        &self.text_content
    }

    /// First descendant matching `selector`. The element itself never
    /// matches, same as a browser's element-scoped lookup.
    pub fn find(&self, selector: &str) -> Result<Option<Element>, BrowseError> {
        let sel = parse_selector(selector)?;
        let fragment = Html::parse_fragment(&self.outer_html);
        let own_id = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .map(|el| el.id());
        Ok(fragment
            .select(&sel)
            .find(|el| Some(el.id()) != own_id)
            .map(|el| snapshot(el, self.base.as_ref())))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowseError> {
    Selector::parse(selector).map_err(|e| BrowseError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn select_first(
    doc: &Html,
    selector: &str,
    base: Option<&Url>,
) -> Result<Option<Element>, BrowseError> {
    let sel = parse_selector(selector)?;
    Ok(doc.select(&sel).next().map(|el| snapshot(el, base)))
}

fn snapshot(el: ElementRef<'_>, base: Option<&Url>) -> Element {
    Element {
        outer_html: el.html(),
        attrs: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        text_content: el.text().collect(),
        base: base.cloned(),
    }
}

/// Find the first element in a full HTML document.
pub fn find_in_document(
    html: &str,
    base: Option<&Url>,
    selector: &str,
) -> Result<Option<Element>, BrowseError> {
    select_first(&Html::parse_document(html), selector, base)
}

/// Plain HTTP page session: `load` and `refresh` GET the page and keep the
/// body; element lookups run against that snapshot.
pub struct HttpBrowser {
    client: reqwest::Client,
    user_agent: String,
    url: Option<Url>,
    html: Option<String>,
}

impl HttpBrowser {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self, BrowseError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BrowseError::Client)?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
            url: None,
            html: None,
        })
    }

    async fn fetch(&self, url: &Url) -> Result<String, BrowseError> {
        let http = |source| BrowseError::Http {
            url: url.to_string(),
            source,
        };
        let body = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http)?
            .text()
            .await
            .map_err(http)?;
        debug!(url = %url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

impl Browser for HttpBrowser {
    async fn load(&mut self, url: &str) -> Result<(), BrowseError> {
        let parsed = Url::parse(url).map_err(|_| BrowseError::BadUrl(url.to_string()))?;
        let body = self.fetch(&parsed).await?;
        self.url = Some(parsed);
        self.html = Some(body);
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), BrowseError> {
        let url = self.url.clone().ok_or(BrowseError::NotLoaded)?;
        self.html = Some(self.fetch(&url).await?);
        Ok(())
    }

    fn find_element(&self, selector: &str) -> Result<Option<Element>, BrowseError> {
        let html = self.html.as_deref().ok_or(BrowseError::NotLoaded)?;
        find_in_document(html, self.url.as_ref(), selector)
    }

    async fn close(&mut self) {
        if self.url.take().is_some() {
            debug!("Closed browsing session");
        }
        self.html = None;
    }
}
