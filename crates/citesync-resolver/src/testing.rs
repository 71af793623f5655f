//! Scripted sources for exercising the coordinator and reconciler.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use citesync_core::RecordFields;

use crate::identifiers::Identifier;
use crate::sources::{FetchOutcome, SourceClient};

pub(crate) struct ScriptedSource {
    name: String,
    script: Mutex<VecDeque<FetchOutcome>>,
    fallback: FetchOutcome,
    delay: Option<Duration>,
    delay_for: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// Answers `outcome` on every call.
    pub(crate) fn always(name: &str, outcome: FetchOutcome) -> Self {
        Self::scripted(name, Vec::new(), outcome)
    }

    /// Answers from `script` in order, then `fallback` forever.
    pub(crate) fn scripted(name: &str, script: Vec<FetchOutcome>, fallback: FetchOutcome) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            fallback,
            delay: None,
            delay_for: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only the calls for one identifier.
    pub(crate) fn with_delay_for(mut self, identifier: &str, delay: Duration) -> Self {
        self.delay_for.insert(identifier.to_string(), delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, identifier: &Identifier) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_for.get(identifier.as_str()).copied().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .script
            .lock()
            .expect("script lock")
            .pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub(crate) fn record(title: &str, authors: &[&str], journal: Option<&str>, year: Option<i32>) -> RecordFields {
    RecordFields {
        title: (!title.is_empty()).then(|| title.to_string()),
        authors: authors.iter().map(|a| a.to_string()).collect(),
        journal: journal.map(ToOwned::to_owned),
        year,
        ..Default::default()
    }
}

pub(crate) fn complete_record(title: &str) -> RecordFields {
    record(title, &["Doe, Jane"], Some("Journal of Tests"), Some(2021))
}
