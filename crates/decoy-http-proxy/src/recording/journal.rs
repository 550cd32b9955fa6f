//! Append-only journal of real upstream exchanges.

use super::mode::Mode;
use crate::predicate::RequestMatcher;
use crate::request::RequestDetails;
use crate::simulation::ResponseTemplate;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;

pub const DEFAULT_ENTRY_LIMIT: usize = 1000;

/// One recorded exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub request: RequestDetails,
    pub response: ResponseTemplate,
    pub mode: Mode,
    pub time_started: DateTime<Utc>,
    pub latency_ms: u64,
}

/// Bounded, ordered journal. The oldest entries are evicted past the limit.
pub struct Journal {
    entries: Mutex<VecDeque<JournalEntry>>,
    entry_limit: Option<usize>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(Some(DEFAULT_ENTRY_LIMIT))
    }
}

impl Journal {
    /// `None` or `Some(0)` disables the limit.
    pub fn new(entry_limit: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            entry_limit: entry_limit.filter(|limit| *limit > 0),
        }
    }

    pub fn append(&self, entry: JournalEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        if let Some(limit) = self.entry_limit {
            while entries.len() > limit {
                entries.pop_front();
            }
        }
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Entries whose request is accepted by `matcher`, oldest first.
    pub fn find(&self, matcher: &RequestMatcher) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| matcher.matches(&entry.request))
            .cloned()
            .collect()
    }

    /// Remove and return every entry.
    pub fn drain(&self) -> Vec<JournalEntry> {
        self.entries.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry_limit(&self) -> Option<usize> {
        self.entry_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::FieldSpec;
    use std::sync::Arc;

    fn entry(path: &str) -> JournalEntry {
        JournalEntry {
            request: RequestDetails {
                method: "GET".into(),
                path: path.into(),
                ..Default::default()
            },
            response: ResponseTemplate::new(200, "ok"),
            mode: Mode::Capture,
            time_started: Utc::now(),
            latency_ms: 3,
        }
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let journal = Journal::new(Some(2));
        journal.append(entry("/1"));
        journal.append(entry("/2"));
        journal.append(entry("/3"));
        let paths: Vec<_> = journal.entries().into_iter().map(|e| e.request.path).collect();
        assert_eq!(paths, vec!["/2", "/3"]);
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        let journal = Journal::new(Some(0));
        assert_eq!(journal.entry_limit(), None);
        for i in 0..5 {
            journal.append(entry(&format!("/{i}")));
        }
        assert_eq!(journal.len(), 5);
    }

    #[test]
    fn test_find_uses_request_matcher() {
        let journal = Journal::default();
        journal.append(entry("/a"));
        journal.append(entry("/b"));
        let matcher = RequestMatcher {
            path: FieldSpec::exact("/b"),
            ..Default::default()
        };
        let found = journal.find(&matcher);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].request.path, "/b");
    }

    #[test]
    fn test_drain_and_clear() {
        let journal = Journal::default();
        journal.append(entry("/a"));
        assert_eq!(journal.drain().len(), 1);
        assert!(journal.is_empty());
        journal.append(entry("/b"));
        journal.clear();
        assert!(journal.is_empty());
    }

    #[test]
    fn test_concurrent_appends() {
        let journal = Arc::new(Journal::new(None));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let journal = journal.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        journal.append(entry(&format!("/{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(journal.len(), 200);
    }
}
