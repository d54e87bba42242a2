//! Unattended runs over many users. One user's failure never stops the batch.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Outcome, OutcomeTally};
use crate::models::Id;
use crate::portfolio::{window_start, DailyCapture, ReconstructionReport, Reconstructor};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Ok,
    Degraded,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRun {
    pub user_id: Id,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub tally: OutcomeTally,
    pub users: Vec<UserRun>,
}

impl BatchReport {
    fn record<T>(&mut self, user_id: Id, outcome: &Outcome<T>) {
        self.tally.record(outcome);
        let status = match outcome {
            Outcome::Ok(_) => UserStatus::Ok,
            Outcome::Degraded(..) => UserStatus::Degraded,
            Outcome::Skipped(_) => UserStatus::Skipped,
        };
        self.users.push(UserRun {
            user_id,
            status,
            reason: outcome.reason().map(str::to_string),
        });
    }
}

pub struct BatchRunner {
    reconstructor: Arc<Reconstructor>,
    capture: Arc<DailyCapture>,
    max_concurrent_users: usize,
    clock: Arc<dyn Clock>,
}

impl BatchRunner {
    pub fn new(reconstructor: Arc<Reconstructor>, capture: Arc<DailyCapture>) -> Self {
        Self {
            reconstructor,
            capture,
            max_concurrent_users: 4,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_max_concurrent_users(mut self, max: usize) -> Self {
        self.max_concurrent_users = max.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reconstruct the last `days` completed days for each user.
    pub async fn reconstruct_all(&self, users: &[Id], days: u32) -> BatchReport {
        let end = self.clock.yesterday();
        let start = window_start(end, days);
        self.for_each_user(users, "reconstruct", move |user| async move {
            summarize(self.reconstructor.reconstruct(user, start, end).await)
        })
        .await
    }

    /// Record today's end-of-day snapshot for each user.
    pub async fn capture_all(&self, users: &[Id]) -> BatchReport {
        self.for_each_user(users, "capture", move |user| async move {
            match self.capture.capture(user).await {
                Ok(outcome) => outcome.map(|_| ()),
                Err(err) => Outcome::Skipped(format!("{err:#}")),
            }
        })
        .await
    }

    /// Rebuild a user's history from `since` after upstream data changed,
    /// e.g. a broker webhook reporting backfilled transactions.
    pub async fn refresh_user(&self, user_id: &Id, since: NaiveDate) -> Result<ReconstructionReport> {
        let end = self.clock.yesterday();
        info!(user_id = %user_id, since = %since, "refreshing history");
        self.reconstructor.reconstruct(user_id, since, end).await
    }

    async fn for_each_user<'a, F, Fut>(&'a self, users: &'a [Id], job: &'static str, run: F) -> BatchReport
    where
        F: Fn(&'a Id) -> Fut,
        Fut: Future<Output = Outcome<()>> + 'a,
    {
        let gate = Arc::new(Semaphore::new(self.max_concurrent_users.max(1)));
        let run = &run;
        let results = join_all(users.iter().map(|user| {
            let gate = gate.clone();
            async move {
                let _permit = gate.acquire_owned().await;
                (user, run(user).await)
            }
        }))
        .await;

        let mut report = BatchReport::default();
        for (user, outcome) in results {
            if let Outcome::Skipped(reason) = &outcome {
                warn!(job, user_id = %user, reason = %reason, "user skipped");
            }
            report.record(user.clone(), &outcome);
        }
        info!(
            job,
            ok = report.tally.ok,
            degraded = report.tally.degraded,
            skipped = report.tally.skipped,
            "batch finished"
        );
        report
    }
}

fn summarize(result: Result<ReconstructionReport>) -> Outcome<()> {
    let report = match result {
        Ok(report) => report,
        Err(err) => return Outcome::Skipped(format!("{err:#}")),
    };
    let mut problems = Vec::new();
    if !report.accounts_skipped.is_empty() {
        problems.push(format!("{} accounts skipped", report.accounts_skipped.len()));
    }
    if !report.degraded_dates.is_empty() {
        problems.push(format!("{} dates priced with fallbacks", report.degraded_dates.len()));
    }
    if !report.failed_dates.is_empty() {
        problems.push(format!("{} dates not stored", report.failed_dates.len()));
    }
    if !report.unresolved.is_empty() {
        problems.push(format!("{} unresolved securities", report.unresolved.len()));
    }
    if problems.is_empty() {
        Outcome::Ok(())
    } else {
        Outcome::Degraded((), problems.join(", "))
    }
}
