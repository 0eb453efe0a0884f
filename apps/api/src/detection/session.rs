//! Detection Session: one scan over a document snapshot, plus the per-client
//! store the HTTP layer debounces against.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scraper::ElementRef;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::detection::document::{locator, Document};
use crate::detection::engine::DetectionEngine;
use crate::detection::features::{extract, is_candidate};
use crate::detection::models::{DetectionSummary, MatchResult};
use crate::detection::overrides::{override_hits, SiteOverrideRule};
use crate::detection::scoring::classify;
use crate::errors::ScanError;

/// What the host gets back from a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub hostname: String,
    /// True when the request fell inside the cooldown and the previous result set was returned.
    pub debounced: bool,
    pub summary: DetectionSummary,
    pub matches: Vec<MatchResult>,
}

pub struct DetectionSession {
    engine: Arc<DetectionEngine>,
    results: Vec<MatchResult>,
    last_scan: Option<Instant>,
    scan_id: Uuid,
    scanned_at: DateTime<Utc>,
    hostname: String,
}

impl DetectionSession {
    pub fn new(engine: Arc<DetectionEngine>) -> Self {
        Self {
            engine,
            results: Vec::new(),
            last_scan: None,
            scan_id: Uuid::nil(),
            scanned_at: Utc::now(),
            hostname: String::new(),
        }
    }

    /// Replaces the result set with a fresh classification of `doc`, in document order.
    pub fn scan(&mut self, doc: &Document, hostname: &str) -> &[MatchResult] {
        self.results.clear();

        let engine = Arc::clone(&self.engine);
        let active = engine.overrides().active_for(hostname);

        let candidates: Vec<_> = doc
            .elements()
            .enumerate()
            .filter(|(_, el)| is_candidate(el))
            .map(|(ordinal, el)| (ordinal, el.id()))
            .collect();

        let mut skipped = 0usize;
        for &(ordinal, node_id) in &candidates {
            let element = doc.html().tree.get(node_id).and_then(ElementRef::wrap);
            match classify_element(&engine, doc, ordinal, element, &active) {
                Ok(Some(matched)) => {
                    debug!(
                        field_type = %matched.field_type,
                        score = matched.score,
                        confidence = matched.confidence,
                        element = %matched.element.hint,
                        "Field matched"
                    );
                    self.results.push(matched);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping element: {e}");
                    skipped += 1;
                }
            }
        }

        self.last_scan = Some(Instant::now());
        self.scan_id = Uuid::new_v4();
        self.scanned_at = Utc::now();
        self.hostname = hostname.to_string();

        info!(
            scan_id = %self.scan_id,
            hostname,
            candidates = candidates.len(),
            matched = self.results.len(),
            skipped,
            site_overrides = active.len(),
            "Scan complete"
        );

        &self.results
    }

    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }

    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary::from_matches(&self.results, self.engine.weights().high_confidence)
    }

    /// True while `now` is within `cooldown` of the last scan.
    pub fn is_cooling_down(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_scan
            .is_some_and(|last| now.saturating_duration_since(last) < cooldown)
    }

    pub fn report(&self, debounced: bool) -> ScanReport {
        ScanReport {
            scan_id: self.scan_id,
            scanned_at: self.scanned_at,
            hostname: self.hostname.clone(),
            debounced,
            summary: self.summary(),
            matches: self.results().to_vec(),
        }
    }
}

/// Extracts, scores and picks the best rule for one candidate. `element` is the
/// candidate re-resolved from its locator; `None` means it is gone.
pub fn classify_element(
    engine: &DetectionEngine,
    doc: &Document,
    ordinal: usize,
    element: Option<ElementRef<'_>>,
    active: &[&SiteOverrideRule],
) -> Result<Option<MatchResult>, ScanError> {
    let element = element.ok_or(ScanError::Detached { ordinal })?;

    let features = extract(doc, &element, engine.label_bounds());
    let hits = override_hits(active, &element);

    Ok(
        classify(engine.registry(), &features, &hits, engine.weights()).map(|c| MatchResult {
            field_type: c.field_type,
            element: locator(ordinal, &element),
            score: c.score,
            confidence: c.confidence,
            category: c.category,
            match_reason: c.match_reason,
        }),
    )
}

/// Outcome of asking the store for a client's session.
pub enum Checkout {
    /// Inside the cooldown: the cached report, flagged `debounced`.
    Cached(ScanReport),
    /// A session to scan with. Hand it back through `SessionStore::check_in`.
    Ready(DetectionSession),
}

/// Sessions keyed by host client id, capped at `max_sessions`.
///
/// A session is removed while its scan runs, so the lock is never held across
/// the blocking work. A second request for the same client that arrives while
/// the first is still scanning is not debounced: it gets a fresh session and
/// scans too, and whichever scan checks in last is the one kept.
pub struct SessionStore {
    engine: Arc<DetectionEngine>,
    cooldown: Duration,
    max_sessions: usize,
    sessions: Mutex<HashMap<String, DetectionSession>>,
}

impl SessionStore {
    pub fn new(engine: Arc<DetectionEngine>, cooldown: Duration, max_sessions: usize) -> Self {
        Self {
            engine,
            cooldown,
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check_out(&self, client_id: Option<&str>) -> Checkout {
        let Some(client_id) = client_id else {
            return Checkout::Ready(DetectionSession::new(Arc::clone(&self.engine)));
        };

        let mut sessions = self.sessions.lock().await;
        match sessions.remove(client_id) {
            Some(session) if session.is_cooling_down(Instant::now(), self.cooldown) => {
                debug!(client_id, "Scan debounced");
                let report = session.report(true);
                sessions.insert(client_id.to_string(), session);
                Checkout::Cached(report)
            }
            Some(session) => Checkout::Ready(session),
            None => Checkout::Ready(DetectionSession::new(Arc::clone(&self.engine))),
        }
    }

    /// Stores a scanned session and returns its report. Without a client id the
    /// session is dropped.
    pub async fn check_in(&self, client_id: Option<&str>, session: DetectionSession) -> ScanReport {
        let report = session.report(false);
        let Some(client_id) = client_id else {
            return report;
        };

        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(client_id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_scan)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!(client_id = %oldest, "Evicting least recently scanned session");
                sessions.remove(&oldest);
            }
        }
        sessions.insert(client_id.to_string(), session);
        report
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::labels::LabelBounds;
    use crate::detection::overrides::{SiteOverrideSpec, SiteOverrideTable};
    use crate::detection::registry::FieldRegistry;
    use crate::detection::scoring::ScoringWeights;

    const FORM: &str = r#"
        <html><body>
          <form action="/apply">
            <input type="hidden" name="email_token" value="t">
            <input type="email" id="user_email" placeholder="Your email">
            <input type="text" name="email_backup" disabled>
            <input type="text" id="zz">
            <input type="tel" name="mobile">
          </form>
        </body></html>"#;

    fn engine() -> Arc<DetectionEngine> {
        Arc::new(DetectionEngine::load(None, None).unwrap())
    }

    fn engine_with_override(selector: &str) -> Arc<DetectionEngine> {
        let registry = FieldRegistry::builtin().unwrap();
        let spec = SiteOverrideSpec {
            name: "jobs".to_string(),
            domains: vec!["jobs.test".to_string()],
            fields: [("fullName".to_string(), vec![selector.to_string()])].into(),
        };
        let overrides = SiteOverrideTable::from_specs(vec![spec], &registry).unwrap();
        Arc::new(
            DetectionEngine::new(
                registry,
                overrides,
                ScoringWeights::default(),
                LabelBounds::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_scan_classifies_visible_candidates_in_document_order() {
        let doc = Document::parse(FORM);
        let mut session = DetectionSession::new(engine());
        let results = session.scan(&doc, "");

        let types: Vec<&str> = results.iter().map(|m| m.field_type.as_str()).collect();
        assert_eq!(types, vec!["email", "phone"]);
        assert!(results[0].element.ordinal < results[1].element.ordinal);
        assert_eq!(results[0].element.hint, "#user_email");
        assert_eq!(results[1].element.hint, "input[name=\"mobile\"]");
    }

    #[test]
    fn test_repeated_scans_are_identical() {
        let doc = Document::parse(FORM);
        let mut session = DetectionSession::new(engine());
        let first = session.scan(&doc, "").to_vec();
        let second = session.scan(&doc, "").to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rescan_replaces_previous_results() {
        let mut session = DetectionSession::new(engine());
        session.scan(&Document::parse(FORM), "");
        assert_eq!(session.results().len(), 2);

        session.scan(&Document::parse("<p>No form here</p>"), "");
        assert!(session.results().is_empty());
        assert_eq!(session.summary().total_fields, 0);
    }

    #[test]
    fn test_summary_counts() {
        let mut session = DetectionSession::new(engine());
        session.scan(&Document::parse(FORM), "");
        let summary = session.summary();
        assert_eq!(summary.total_fields, 2);
        assert_eq!(summary.field_types.get("email"), Some(&1));
        assert_eq!(summary.high_confidence_fields, 2);
    }

    #[test]
    fn test_detached_element_is_an_error_not_a_panic() {
        let engine = engine();
        let doc = Document::parse(FORM);
        let err = classify_element(&engine, &doc, 42, None, &[]).unwrap_err();
        assert_eq!(err, ScanError::Detached { ordinal: 42 });
    }

    #[test]
    fn test_site_override_applies_only_on_matching_host() {
        let engine = engine_with_override("input.xq-7");
        let doc = Document::parse(r#"<form><input type="text" class="xq-7"></form>"#);
        let mut session = DetectionSession::new(engine);

        assert!(session.scan(&doc, "example.org").is_empty());

        let results = session.scan(&doc, "careers.jobs.test");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].field_type, "fullName");
        assert!(results[0].match_reason.contains("site override x1"));
    }

    #[test]
    fn test_cooldown_window() {
        let mut session = DetectionSession::new(engine());
        let cooldown = Duration::from_millis(1000);
        assert!(!session.is_cooling_down(Instant::now(), cooldown));

        session.scan(&Document::parse(FORM), "");
        let now = Instant::now();
        assert!(session.is_cooling_down(now, cooldown));
        assert!(!session.is_cooling_down(now + Duration::from_millis(1500), cooldown));
    }

    #[tokio::test]
    async fn test_store_debounces_within_cooldown() {
        let store = SessionStore::new(engine(), Duration::from_secs(60), 16);
        let doc = Document::parse(FORM);

        let Checkout::Ready(mut session) = store.check_out(Some("tab-1")).await else {
            panic!("first checkout should be ready");
        };
        session.scan(&doc, "");
        let first = store.check_in(Some("tab-1"), session).await;
        assert!(!first.debounced);

        match store.check_out(Some("tab-1")).await {
            Checkout::Cached(report) => {
                assert!(report.debounced);
                assert_eq!(report.scan_id, first.scan_id);
                assert_eq!(report.matches, first.matches);
            }
            Checkout::Ready(_) => panic!("expected a debounced report"),
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_overlapping_scans_for_one_client_last_check_in_wins() {
        let store = SessionStore::new(engine(), Duration::from_secs(60), 16);

        let Checkout::Ready(mut first) = store.check_out(Some("tab-1")).await else {
            panic!("first checkout should be ready");
        };
        // First scan still in flight: nothing cached, so the second request scans too.
        let Checkout::Ready(mut second) = store.check_out(Some("tab-1")).await else {
            panic!("in-flight session is not debounced");
        };

        first.scan(&Document::parse(FORM), "");
        second.scan(&Document::parse("<p>No form here</p>"), "");
        store.check_in(Some("tab-1"), first).await;
        let last = store.check_in(Some("tab-1"), second).await;

        assert_eq!(store.len().await, 1);
        match store.check_out(Some("tab-1")).await {
            Checkout::Cached(report) => {
                assert_eq!(report.scan_id, last.scan_id);
                assert!(report.matches.is_empty());
            }
            Checkout::Ready(_) => panic!("expected the cached report"),
        }
    }

    #[tokio::test]
    async fn test_store_without_client_id_keeps_nothing() {
        let store = SessionStore::new(engine(), Duration::from_secs(60), 16);
        let Checkout::Ready(session) = store.check_out(None).await else {
            panic!("anonymous checkout should be ready");
        };
        store.check_in(None, session).await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_store_evicts_least_recently_scanned() {
        let store = SessionStore::new(engine(), Duration::ZERO, 2);
        let doc = Document::parse(FORM);

        for client in ["a", "b", "c"] {
            let Checkout::Ready(mut session) = store.check_out(Some(client)).await else {
                panic!("zero cooldown never debounces");
            };
            session.scan(&doc, "");
            store.check_in(Some(client), session).await;
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(store.len().await, 2);
        let sessions = store.sessions.lock().await;
        assert!(!sessions.contains_key("a"));
        assert!(sessions.contains_key("c"));
    }
}
