use super::config::ResultType;
use crate::protocol::{FullResult, Utterance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Ordered final utterances plus the current interim hypothesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    finals: Vec<Utterance>,
    interim: Option<Utterance>,
}

/// Immutable copy of a transcript, safe to hand to other tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    pub finals: Vec<String>,
    pub interim: Option<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremental update: interim utterances overwrite the interim slot,
    /// final ones are appended and clear it.
    pub fn apply(&mut self, utterances: &[Utterance]) {
        for utterance in utterances {
            if utterance.is_final {
                self.finals.push(utterance.clone());
                self.interim = None;
            } else {
                self.interim = Some(utterance.clone());
            }
        }
    }

    /// Full update: `utterances` is everything recognized so far.
    pub fn replace(&mut self, utterances: &[Utterance]) {
        self.finals = utterances.iter().filter(|u| u.is_final).cloned().collect();
        self.interim = utterances
            .last()
            .filter(|u| !u.is_final)
            .cloned();
    }

    /// Fold one successful response into the transcript.
    ///
    /// In full mode without `show_utterances` the server only sends the
    /// running text, which then stands in as the single final utterance.
    pub fn update(&mut self, result_type: ResultType, result: &FullResult) {
        match result_type {
            ResultType::Single => self.apply(&result.utterances),
            ResultType::Full if !result.utterances.is_empty() => self.replace(&result.utterances),
            ResultType::Full if !result.text.is_empty() => {
                self.finals = vec![Utterance::final_text(result.text.clone())];
                self.interim = None;
            }
            // Nothing recognized yet
            ResultType::Full => {}
        }
    }

    pub fn finals(&self) -> &[Utterance] {
        &self.finals
    }

    pub fn interim(&self) -> Option<&Utterance> {
        self.interim.as_ref()
    }

    /// Final texts joined without separator
    pub fn text(&self) -> String {
        self.finals.iter().map(|u| u.text.as_str()).collect()
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            finals: self.finals.iter().map(|u| u.text.clone()).collect(),
            interim: self.interim.as_ref().map(|u| u.text.clone()),
        }
    }
}

/// Read access to a session's transcript from other tasks.
#[derive(Debug, Clone, Default)]
pub struct TranscriptHandle(Arc<Mutex<Transcript>>);

impl TranscriptHandle {
    pub async fn snapshot(&self) -> TranscriptSnapshot {
        self.0.lock().await.snapshot()
    }

    pub(crate) async fn update(&self, result_type: ResultType, result: &FullResult) {
        self.0.lock().await.update(result_type, result);
    }

    pub(crate) async fn final_count(&self) -> usize {
        self.0.lock().await.finals().len()
    }
}
