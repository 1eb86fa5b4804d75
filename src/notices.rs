use std::sync::Mutex;

/// Warnings collected at startup or by collaborators, delivered to the next
/// requester and then forgotten.
#[derive(Debug, Default)]
pub struct Notices {
    pending: Mutex<Vec<String>>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(initial: Vec<String>) -> Self {
        Self { pending: Mutex::new(initial) }
    }

    /// Queue a notice. Identical pending notices are not queued twice.
    pub fn push(&self, notice: impl Into<String>) {
        let notice = notice.into();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if !pending.contains(&notice) {
            pending.push(notice);
        }
    }

    /// Read and clear everything queued so far.
    pub fn take_all(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_all_clears_pending() {
        let notices = Notices::with(vec!["Missing OPENAI_API_KEY".to_string()]);
        notices.push("Finnhub key invalid for news");
        notices.push("Finnhub key invalid for news");

        let drained = notices.take_all();
        assert_eq!(drained.len(), 2);
        assert!(notices.is_empty());
        assert!(notices.take_all().is_empty());
    }
}
