use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::browser::{Browser, Element};
use crate::compose::compose;
use crate::config::Settings;
use crate::detector::ChangeDetector;
use crate::document::DocumentSource;
use crate::error::{BrowseError, CycleFault};
use crate::matcher::{match_ids, MatchResult};
use crate::notify::{Delivery, Notifier, ParseMode};
use crate::registry::IdentifierRegistry;
use crate::store::StateStore;

/// Where on the page the tracked link and its marker live.
#[derive(Debug, Clone)]
pub struct Target {
    pub page_url: String,
    pub link_selector: String,
    pub marker_selector: String,
}

impl From<&Settings> for Target {
    fn from(s: &Settings) -> Self {
        Self {
            page_url: s.page_url.clone(),
            link_selector: s.link_selector.clone(),
            marker_selector: s.marker_selector.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Unchanged {
        marker: String,
    },
    Notified {
        marker: String,
        result: MatchResult,
        delivery: Delivery,
    },
}

/// Marker is whatever follows the last `/` in the sub-element text, e.g.
/// "PDF, 120 KB / 05.03.2024" gives "05.03.2024".
pub fn parse_marker(raw: &str) -> Option<String> {
    let marker = raw.rsplit('/').next().unwrap_or_default().trim();
    (!marker.is_empty()).then(|| marker.to_string())
}

/// The poll loop. Owns every collaborator for the life of the process.
pub struct Watcher<B, D, N, S> {
    browser: B,
    documents: D,
    notifier: N,
    detector: ChangeDetector<S>,
    registry: IdentifierRegistry,
    target: Target,
    interval: Duration,
    parse_mode: ParseMode,
}

impl<B, D, N, S> Watcher<B, D, N, S>
where
    B: Browser,
    D: DocumentSource,
    N: Notifier,
    S: StateStore,
{
    pub fn new(
        browser: B,
        documents: D,
        notifier: N,
        detector: ChangeDetector<S>,
        registry: IdentifierRegistry,
        target: Target,
    ) -> Self {
        Self {
            browser,
            documents,
            notifier,
            detector,
            registry,
            target,
            interval: Duration::from_secs(5),
            parse_mode: ParseMode::Plain,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Open the page. A failure here is a setup fault, not a cycle fault.
    pub async fn start(&mut self) -> Result<(), BrowseError> {
        self.browser.load(&self.target.page_url).await?;
        info!(
            url = %self.target.page_url,
            ids = self.registry.len(),
            last = ?self.detector.last(),
            "Bot started. Monitoring the page for date changes"
        );
        Ok(())
    }

    pub async fn close(&mut self) {
        self.browser.close().await;
    }

    /// Start, loop until `shutdown` flips to true, then close the browser
    /// whatever happened.
    pub async fn watch(&mut self, shutdown: watch::Receiver<bool>) -> Result<(), BrowseError> {
        let started = self.start().await;
        if started.is_ok() {
            self.run(shutdown).await;
        }
        self.close().await;
        started
    }

    /// Cycle, sleep, repeat. Shutdown is only honoured between cycles.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(CycleOutcome::Unchanged { .. }) => {}
                Ok(CycleOutcome::Notified { marker, result, delivery }) => info!(
                    marker,
                    found = result.found.len(),
                    missing = result.missing.len(),
                    ?delivery,
                    "Change handled"
                ),
                Err(fault) => warn!(kind = fault.kind(), "Something went wrong: {}", fault),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    // Sender gone: nobody can stop us any more, keep pacing.
                    if changed.is_err() {
                        tokio::time::sleep(self.interval).await;
                    }
                }
            }
        }
        info!("Bot stopped");
    }

    /// One refresh-and-compare pass. State is committed only after delivery
    /// succeeds or is skipped for lack of credentials.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleFault> {
        self.browser.refresh().await?;

        let link = self.find_link()?;
        let marker = link
            .find(&self.target.marker_selector)?
            .and_then(|sub| parse_marker(sub.text_content()))
            .ok_or(CycleFault::MarkerUnavailable)?;
        info!(marker, "Date: {}", marker);

        if !self.detector.should_notify(&marker) {
            return Ok(CycleOutcome::Unchanged { marker });
        }

        let doc_url = link
            .attribute("href")
            .filter(|h| !h.trim().is_empty())
            .ok_or(CycleFault::LinkMissing)?;

        let text = self.documents.extract_text(&doc_url).await?;
        if text.is_empty() {
            warn!(url = %doc_url, "Document has no extractable text");
        }

        let result = match_ids(&text, &self.registry);
        let message = compose(&marker, &self.target.page_url, &result, &self.registry);
        let delivery = self.notifier.send(&message, self.parse_mode).await?;

        self.detector
            .commit(&marker)
            .map_err(|source| CycleFault::Persist {
                marker: marker.clone(),
                source,
            })?;

        Ok(CycleOutcome::Notified {
            marker,
            result,
            delivery,
        })
    }

    fn find_link(&self) -> Result<Element, CycleFault> {
        self.browser
            .find_element(&self.target.link_selector)?
            .ok_or(CycleFault::LinkNotFound)
    }
}
