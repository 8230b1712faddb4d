use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::harness::{count_passed, TestResult};

/// How a submission came to be finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Finalization {
    Confirmed,
    Expired,
}

/// Finalized payload handed to the interview session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub question_number: u32,
    pub code: String,
    #[serde(rename = "testCases")]
    pub results: Vec<TestResult>,
    pub finalized_at: DateTime<Local>,
    pub finalization: Finalization,
}

impl SubmissionRecord {
    pub fn num_passed(&self) -> usize {
        count_passed(&self.results)
    }
}

/// Receives each finalized submission exactly once. The engine expects no answer.
pub trait SubmissionSink: Send + Sync {
    fn deliver(&self, record: SubmissionRecord);
}

impl SubmissionSink for mpsc::UnboundedSender<SubmissionRecord> {
    fn deliver(&self, record: SubmissionRecord) {
        if self.send(record).is_err() {
            log::warn!("Submission receiver is gone; dropping the submission");
        }
    }
}
