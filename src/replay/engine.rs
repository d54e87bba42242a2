use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{Position, PositionBook, ReplayOptions, ReplayResult, ReplayWarning, SameDayOrder};
use crate::error::Outcome;
use crate::models::Transaction;

/// Transactions paired with their effective date, in application order.
fn ordered<'a>(
    transactions: &'a [Transaction],
    options: &ReplayOptions,
) -> Vec<(NaiveDate, &'a Transaction)> {
    let mut events: Vec<(NaiveDate, &Transaction)> = transactions
        .iter()
        .map(|tx| (options.effective_date(tx), tx))
        .collect();

    // Stable sorts keep provider order wherever the key ties.
    match options.same_day_order {
        SameDayOrder::Provider => events.sort_by_key(|(date, _)| *date),
        SameDayOrder::Timestamp => events.sort_by_key(|(date, tx)| {
            (*date, tx.timestamp.is_none(), tx.timestamp)
        }),
    }
    events
}

fn note(
    outcome: Outcome<()>,
    date: NaiveDate,
    tx: &Transaction,
    warnings: &mut Vec<ReplayWarning>,
) {
    if let Some(reason) = outcome.reason() {
        warn!(
            account_id = %tx.account_id,
            transaction_id = %tx.id,
            security_id = %tx.security_id,
            date = %date,
            reason,
            "transaction data inconsistency"
        );
        warnings.push(ReplayWarning {
            date,
            transaction_id: tx.id.clone(),
            security_id: tx.security_id.clone(),
            message: reason.to_string(),
        });
    }
}

/// Replay `transactions` on top of `initial` and emit one holdings state per
/// date in the window.
///
/// Events before the window start are folded into the opening state; events
/// after the window end are ignored. Dates on which nothing is held are not
/// emitted, but the walk continues through them.
pub fn replay(
    transactions: &[Transaction],
    initial: &BTreeMap<String, Position>,
    options: &ReplayOptions,
) -> ReplayResult {
    let events = ordered(transactions, options);
    let mut result = ReplayResult::default();

    let (start, end) = match options.window {
        Some(window) => window,
        None => match (events.first(), events.last()) {
            (Some((first, _)), Some((last, _))) => (*first, *last),
            _ => return result,
        },
    };
    if end < start {
        return result;
    }

    let mut book = PositionBook::from_positions(initial.clone());
    let mut pending = events.into_iter().peekable();

    while let Some((date, tx)) = pending.next_if(|(date, _)| *date < start) {
        let outcome = book.apply(tx);
        note(outcome, date, tx, &mut result.warnings);
    }

    for date in start.iter_days().take_while(|d| *d <= end) {
        while let Some((_, tx)) = pending.next_if(|(effective, _)| *effective == date) {
            let outcome = book.apply(tx);
            note(outcome, date, tx, &mut result.warnings);
        }
        if !book.is_empty() {
            result.states.push(book.state_on(date));
        }
    }

    debug!(
        start = %start,
        end = %end,
        states = result.states.len(),
        warnings = result.warnings.len(),
        "replayed transactions"
    );
    result
}

/// Walk `current` holdings backwards through every transaction whose
/// effective date is on or after `since`, giving the opening state to replay
/// forward from.
pub fn unwind_to_opening(
    current: &BTreeMap<String, Position>,
    transactions: &[Transaction],
    since: NaiveDate,
    options: &ReplayOptions,
) -> (BTreeMap<String, Position>, Vec<ReplayWarning>) {
    let mut book = PositionBook::from_positions(current.clone());
    let mut warnings = Vec::new();

    for (date, tx) in ordered(transactions, options).into_iter().rev() {
        if date < since {
            break;
        }
        let outcome = book.unapply(tx);
        note(outcome, date, tx, &mut warnings);
    }

    (book.into_positions(), warnings)
}
