use chrono::{DateTime, Utc};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::dispatch::{Dispatcher, SendReport};
use crate::error::GenerationError;
use crate::llm::MessageGenerator;
use crate::logging::Stage;

/// What one run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub message: String,
    pub reports: Vec<SendReport>,
}

impl RunSummary {
    pub fn delivered(&self) -> usize {
        self.reports.iter().filter(|r| r.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.delivered()
    }
}

/// Generate today's message once and hand it to every whitelisted chat.
///
/// Generation failure ends the run before anything is sent. Send failures
/// are reported per recipient and never turn into an `Err`.
pub async fn run(
    config: &Config,
    generator: &dyn MessageGenerator,
    dispatcher: &Dispatcher,
) -> Result<RunSummary, GenerationError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id);

    async move {
        let started_at = Utc::now();
        info!(stage = %Stage::Start, recipients = config.recipient_ids.len(), "----- Inspiring bot run started -----");

        info!(
            stage = %Stage::Generate,
            "Requesting inspiring message from {} using model {}",
            config.provider_base_url,
            config.model_id
        );
        let message = match generator.generate().await {
            Ok(message) => {
                info!(stage = %Stage::Generate, outcome = "ok", "Generated message: {}", message);
                message
            }
            Err(e) => {
                error!(stage = %Stage::Generate, outcome = "failed", "Failed to get inspiring message: {}", e);
                if let Some(hint) = e.hint() {
                    error!(stage = %Stage::Generate, "Hint: {}", hint);
                }
                warn!(stage = %Stage::Finish, "Nothing was sent");
                return Err(e);
            }
        };

        let reports = dispatcher.dispatch(&config.recipient_ids, &message).await;

        let summary = RunSummary {
            run_id,
            started_at,
            message,
            reports,
        };

        let elapsed = Utc::now() - summary.started_at;
        info!(
            stage = %Stage::Finish,
            attempted = summary.reports.len(),
            succeeded = summary.delivered(),
            failed = summary.failed(),
            elapsed_ms = elapsed.num_milliseconds(),
            "Finished sending messages. Attempted: {}, Succeeded: {}.",
            summary.reports.len(),
            summary.delivered()
        );

        Ok(summary)
    }
    .instrument(span)
    .await
}
