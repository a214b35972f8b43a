//! Holder of the latest batch analysis result.

use crate::model::AnalysisResult;
use std::sync::Arc;

/// A view derived from the stored result.
pub trait ResultView {
    /// Rebuild from a freshly published result.
    fn on_publish(&mut self, result: &AnalysisResult);
}

/// Latest successful `AnalysisResult`.
///
/// `publish` replaces the whole value and notifies the views before returning,
/// so no caller can observe the new result with stale views. A failed
/// submission never reaches the store, so the last good result is kept.
#[derive(Debug, Default)]
pub struct ResultStore {
    current: Option<Arc<AnalysisResult>>,
    generation: u64,
}

impl ResultStore {
    pub fn publish(&mut self, result: AnalysisResult, views: &mut [&mut dyn ResultView]) -> Arc<AnalysisResult> {
        let result = Arc::new(result);
        self.current = Some(Arc::clone(&result));
        self.generation += 1;
        log::info!(
            "Published result #{}: {} flows, {} benign, {} attacks",
            self.generation,
            result.total_flows,
            result.benign_count,
            result.attack_count
        );
        for view in views.iter_mut() {
            view.on_publish(&result);
        }
        result
    }

    pub fn current(&self) -> Option<&Arc<AnalysisResult>> {
        self.current.as_ref()
    }

    /// Number of results published so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<u64>,
    }

    impl ResultView for Recorder {
        fn on_publish(&mut self, result: &AnalysisResult) {
            self.seen.push(result.total_flows);
        }
    }

    fn result(total: u64) -> AnalysisResult {
        AnalysisResult {
            total_flows: total,
            benign_count: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_publish_replaces_and_notifies() {
        let mut store = ResultStore::default();
        let mut a = Recorder::default();
        let mut b = Recorder::default();
        assert!(store.current().is_none());

        {
            let mut views: [&mut dyn ResultView; 2] = [&mut a, &mut b];
            store.publish(result(5), &mut views);
            store.publish(result(7), &mut views);
        }

        assert_eq!(store.current().unwrap().total_flows, 7);
        assert_eq!(store.generation(), 2);
        assert_eq!(a.seen, vec![5, 7]);
        assert_eq!(b.seen, vec![5, 7]);
    }
}
