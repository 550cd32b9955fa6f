//! Pair store: the active simulation, published copy-on-write.

use crate::behaviors::{DelayRule, LogNormalDelayRule};
use crate::error::ProxyError;
use crate::simulation::{self, Pair, Simulation};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered pairs plus global delay rules.
///
/// Readers take one immutable snapshot per scan without locking. Writers
/// serialize on a mutex, build a modified copy and swap it in, so a scan
/// never sees a half-applied import.
pub struct PairStore {
    current: ArcSwap<Simulation>,
    write_lock: Mutex<()>,
}

impl Default for PairStore {
    fn default() -> Self {
        Self::new(Simulation::default())
    }
}

impl PairStore {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            current: ArcSwap::from_pointee(simulation),
            write_lock: Mutex::new(()),
        }
    }

    /// Current simulation snapshot.
    pub fn snapshot(&self) -> Arc<Simulation> {
        self.current.load_full()
    }

    /// Replace the whole simulation in one step.
    pub fn replace(&self, simulation: Simulation) {
        let _guard = self.write_lock.lock();
        self.current.store(Arc::new(simulation));
    }

    /// Import a document. On error the previous contents stay active.
    pub fn import_json(&self, document: &str) -> Result<usize, ProxyError> {
        let simulation = simulation::import_json(document)?;
        let count = simulation.pairs.len();
        self.replace(simulation);
        info!(
            pairs = count,
            delays = self.snapshot().delays.len(),
            log_normal_delays = self.snapshot().delays_log_normal.len(),
            "Imported simulation"
        );
        Ok(count)
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        simulation::export_json(&self.snapshot())
    }

    fn update<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        let _guard = self.write_lock.lock();
        let mut next = Simulation::clone(&self.current.load());
        let result = f(&mut next);
        self.current.store(Arc::new(next));
        result
    }

    /// Replace the pairs, keeping delay rules and metadata.
    pub fn replace_pairs(&self, pairs: Vec<Pair>) {
        self.update(|sim| sim.pairs = pairs);
    }

    pub fn set_delays(&self, delays: Vec<DelayRule>) {
        self.update(|sim| sim.delays = delays);
    }

    pub fn set_log_normal_delays(&self, delays: Vec<LogNormalDelayRule>) {
        self.update(|sim| sim.delays_log_normal = delays);
    }

    pub fn append(&self, pair: Pair) {
        self.update(|sim| sim.pairs.push(pair));
    }

    /// Append a captured pair. With `overwrite_duplicate`, a pair whose matcher
    /// equals an existing one replaces it in place. Returns true on replacement.
    pub fn record(&self, pair: Pair, overwrite_duplicate: bool) -> bool {
        self.update(|sim| {
            if overwrite_duplicate {
                if let Some(existing) = sim.pairs.iter_mut().find(|p| p.matcher == pair.matcher) {
                    debug!(pair_id = %existing.id, "Overwriting duplicate captured pair");
                    *existing = pair;
                    return true;
                }
            }
            sim.pairs.push(pair);
            false
        })
    }

    pub fn pairs(&self) -> Vec<Pair> {
        self.snapshot().pairs.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all pairs and delay rules.
    pub fn clear(&self) {
        self.replace(Simulation::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{FieldSpec, RequestMatcher};
    use crate::simulation::ResponseTemplate;
    use std::time::Duration;

    fn pair(path: &str, body: &str) -> Pair {
        Pair::new(
            RequestMatcher {
                path: FieldSpec::exact(path),
                ..Default::default()
            },
            ResponseTemplate::new(200, body),
        )
    }

    const DOC: &str = r#"{"data": {"pairs": [
        {"request": {"path": {"exactMatch": "/a"}}, "response": {"body": "a"}},
        {"request": {"path": {"exactMatch": "/b"}}, "response": {"body": "b"}}]}}"#;

    #[test]
    fn test_import_replaces_contents() {
        let store = PairStore::default();
        store.append(pair("/old", "old"));
        assert_eq!(store.import_json(DOC).unwrap(), 2);
        let bodies: Vec<_> = store.pairs().iter().map(|p| p.response.body.clone()).collect();
        assert_eq!(bodies, vec!["a", "b"]);
    }

    #[test]
    fn test_failed_import_keeps_previous_contents() {
        let store = PairStore::default();
        store.import_json(DOC).unwrap();
        let before = store.snapshot();

        let bad = r#"{"data": {"pairs": [{"request": {"path": {"nope": "/a"}}, "response": {}}]}}"#;
        assert!(store.import_json(bad).is_err());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_writes() {
        let store = PairStore::default();
        store.append(pair("/a", "a"));
        let snapshot = store.snapshot();
        store.append(pair("/b", "b"));
        assert_eq!(snapshot.pairs.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_record_with_overwrite_duplicate() {
        let store = PairStore::default();
        assert!(!store.record(pair("/a", "first"), true));
        assert!(store.record(pair("/a", "second"), true));
        assert_eq!(store.len(), 1);
        assert_eq!(store.pairs()[0].response.body, "second");

        assert!(!store.record(pair("/a", "third"), false));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_replace_pairs_keeps_delays() {
        let store = PairStore::default();
        store.set_delays(vec![DelayRule::new("*", None, Duration::from_millis(5)).unwrap()]);
        store.set_log_normal_delays(vec![LogNormalDelayRule::new(
            "*",
            None,
            crate::behaviors::LogNormalBounds {
                mean: 20,
                median: 10,
                ..Default::default()
            },
        )
        .unwrap()]);
        store.replace_pairs(vec![pair("/x", "x")]);
        assert_eq!(store.snapshot().delays.len(), 1);
        assert_eq!(store.snapshot().delays_log_normal.len(), 1);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
        assert!(store.snapshot().delays.is_empty());
        assert!(store.snapshot().delays_log_normal.is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(PairStore::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.append(pair(&format!("/{i}/{j}"), "x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }
}
