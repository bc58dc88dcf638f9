use futures::stream::{self, StreamExt};

use crate::matcher::matches;
use crate::models::{SubscriberFilter, SubscriberId, TenderRecord};
use crate::notify::{format_tender, NotificationChannel, OutgoingMessage};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

struct Job<'a> {
    tender_id: &'a str,
    recipient: SubscriberId,
    message: &'a OutgoingMessage,
}

/// Cross-join `records` with `filters` and send one message per matching
/// pair. Sends run with at most `concurrency` in flight; a failed send is
/// logged and counted, never retried, and never stops the others.
pub async fn dispatch(
    records: &[TenderRecord],
    filters: &[SubscriberFilter],
    channel: &dyn NotificationChannel,
    concurrency: usize,
) -> DispatchReport {
    let messages: Vec<OutgoingMessage> = records.iter().map(format_tender).collect();

    let jobs: Vec<Job<'_>> = records
        .iter()
        .zip(&messages)
        .flat_map(|(record, message)| {
            filters
                .iter()
                .filter(move |filter| matches(record, filter))
                .map(move |filter| Job {
                    tender_id: &record.id,
                    recipient: filter.subscriber_id,
                    message,
                })
        })
        .collect();

    let mut report = DispatchReport {
        matched: jobs.len(),
        ..Default::default()
    };
    if jobs.is_empty() {
        return report;
    }

    let outcomes: Vec<bool> = stream::iter(jobs)
        .map(|job| async move {
            match channel.send(job.recipient, job.message).await {
                Ok(()) => {
                    tracing::debug!(tender = job.tender_id, recipient = job.recipient, "notified");
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        tender = job.tender_id,
                        recipient = job.recipient,
                        "delivery failed: {}",
                        e
                    );
                    false
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for delivered in outcomes {
        if delivered {
            report.delivered += 1;
        } else {
            report.failed += 1;
        }
    }
    report
}
