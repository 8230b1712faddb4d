use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    controller::SubmissionController,
    timer::{QuestionTimer, TimerStatus},
};

/// The active question: a controller plus the countdown that can force its
/// submission. Dropping or dismissing the session stops the countdown.
#[derive(Debug)]
pub struct QuestionSession {
    controller: Arc<SubmissionController>,
    timer: QuestionTimer,
}

impl QuestionSession {
    /// Starts the countdown. Must be called inside a tokio runtime.
    pub fn start(controller: Arc<SubmissionController>) -> Self {
        let limit = controller.question().time_limit_seconds;
        let on_expire = {
            let controller = controller.clone();
            move || {
                if controller.force_submit().is_none() {
                    log::debug!("Timer expired after the question was already submitted");
                }
            }
        };
        log::info!(
            "Question {} started ({}s)",
            controller.question().question_number,
            limit
        );
        Self {
            timer: QuestionTimer::start(limit, on_expire),
            controller,
        }
    }

    pub fn question_number(&self) -> u32 {
        self.controller.question().question_number
    }

    pub fn time_limit_seconds(&self) -> u64 {
        self.controller.question().time_limit_seconds
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.timer.remaining_seconds()
    }

    pub fn status(&self) -> TimerStatus {
        self.timer.status()
    }

    pub fn subscribe_remaining(&self) -> watch::Receiver<u64> {
        self.timer.subscribe()
    }

    pub fn controller(&self) -> &Arc<SubmissionController> {
        &self.controller
    }

    /// Resolves when the countdown runs out (and the forced submission has happened).
    pub async fn expired(&self) {
        self.timer.expired().await
    }

    /// Tears the session down before expiry. Nothing already submitted is undone.
    pub fn dismiss(self) {
        self.timer.cancel();
        self.controller.discard_in_flight();
        log::info!("Question {} dismissed", self.question_number());
    }
}
