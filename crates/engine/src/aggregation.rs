//! Monthly view derived from the live snapshot.
//!
//! [`aggregate`] is a pure function of `(month, search query, snapshot)`;
//! [`Aggregation`] recomputes it whenever any of the three inputs changes.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};

use crate::{EngineError, MoneyCents, ResultEngine, Transaction, TransactionSnapshot};

/// A calendar month. Only year and month matter; days never overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthCursor {
    first_day: NaiveDate,
}

impl MonthCursor {
    pub fn new(year: i32, month: u32) -> ResultEngine<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| EngineError::Validation(format!("invalid month {year}-{month:02}")))
    }

    pub fn containing(at: DateTime<Utc>) -> Self {
        let date = at.date_naive();
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn year(self) -> i32 {
        self.first_day.year()
    }

    pub fn month(self) -> u32 {
        self.first_day.month()
    }

    /// Saturates at the end of the supported calendar range.
    pub fn next(self) -> Self {
        Self {
            first_day: self
                .first_day
                .checked_add_months(Months::new(1))
                .unwrap_or(self.first_day),
        }
    }

    pub fn previous(self) -> Self {
        Self {
            first_day: self
                .first_day
                .checked_sub_months(Months::new(1))
                .unwrap_or(self.first_day),
        }
    }

    /// First instant of the month.
    pub fn start(self) -> DateTime<Utc> {
        self.first_day.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Last millisecond of the month's actual last day.
    pub fn end(self) -> DateTime<Utc> {
        let next_start = self.next().start();
        if next_start == self.start() {
            return DateTime::<Utc>::MAX_UTC;
        }
        next_start - TimeDelta::milliseconds(1)
    }

    /// Inclusive on both bounds.
    pub fn contains(self, at: DateTime<Utc>) -> bool {
        self.start() <= at && at <= self.end()
    }
}

/// Which list the monthly totals are computed over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsScope {
    /// The month list after the search filter: totals follow the query.
    #[default]
    Filtered,
    /// The month list regardless of the search query.
    Month,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub income: MoneyCents,
    pub expense: MoneyCents,
    pub net: MoneyCents,
}

impl Totals {
    pub fn of<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut totals = Totals::default();
        for tx in transactions {
            if tx.is_income {
                totals.income += tx.amount;
            } else {
                totals.expense += tx.amount;
            }
        }
        totals.net = totals.income - totals.expense;
        totals
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyView {
    pub month: MonthCursor,
    pub query: String,
    /// Newest first.
    pub transactions: Vec<Transaction>,
    pub totals: Totals,
}

impl MonthlyView {
    pub fn empty(month: MonthCursor) -> Self {
        Self {
            month,
            query: String::new(),
            transactions: Vec::new(),
            totals: Totals::default(),
        }
    }
}

/// Case-insensitive match on category or note. A blank query matches
/// everything; a missing note never matches a non-blank query.
pub fn matches_search(tx: &Transaction, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    tx.category.to_lowercase().contains(&needle)
        || tx
            .note
            .as_deref()
            .is_some_and(|note| note.to_lowercase().contains(&needle))
}

/// Filters, sorts and totals one snapshot.
///
/// Sorting is by timestamp, newest first; ties keep the snapshot (insertion)
/// order.
pub fn aggregate(
    month: MonthCursor,
    query: &str,
    transactions: &[Transaction],
    scope: TotalsScope,
) -> MonthlyView {
    let in_month: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| month.contains(tx.occurred_at))
        .collect();

    let mut listed: Vec<Transaction> = in_month
        .iter()
        .copied()
        .filter(|tx| matches_search(tx, query))
        .cloned()
        .collect();
    listed.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

    let totals = match scope {
        TotalsScope::Filtered => Totals::of(&listed),
        TotalsScope::Month => Totals::of(in_month.iter().copied()),
    };

    MonthlyView {
        month,
        query: query.to_string(),
        transactions: listed,
        totals,
    }
}

/// The reactive node: month cursor and search query in, monthly view out.
#[derive(Clone, Debug)]
pub struct Aggregation {
    month: Arc<watch::Sender<MonthCursor>>,
    query: Arc<watch::Sender<String>>,
    view: Arc<watch::Sender<MonthlyView>>,
    scope: TotalsScope,
}

impl Aggregation {
    pub fn new(month: MonthCursor, scope: TotalsScope) -> Self {
        let (month_tx, _) = watch::channel(month);
        let (query, _) = watch::channel(String::new());
        let (view, _) = watch::channel(MonthlyView::empty(month));
        Self {
            month: Arc::new(month_tx),
            query: Arc::new(query),
            view: Arc::new(view),
            scope,
        }
    }

    pub fn scope(&self) -> TotalsScope {
        self.scope
    }

    pub fn month(&self) -> MonthCursor {
        *self.month.borrow()
    }

    pub fn set_month(&self, month: MonthCursor) {
        self.month.send_if_modified(|current| {
            let changed = *current != month;
            *current = month;
            changed
        });
    }

    pub fn next_month(&self) {
        self.month.send_modify(|current| *current = current.next());
    }

    pub fn previous_month(&self) {
        self.month.send_modify(|current| *current = current.previous());
    }

    pub fn search_query(&self) -> String {
        self.query.borrow().clone()
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.query.send_if_modified(|current| {
            if *current == query {
                return false;
            }
            *current = query;
            true
        });
    }

    pub fn view(&self) -> MonthlyView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonthlyView> {
        self.view.subscribe()
    }

    /// Spawns the recompute loop over `snapshots`. The loop ends when the
    /// snapshot source is dropped.
    pub fn spawn(&self, mut snapshots: watch::Receiver<TransactionSnapshot>) -> JoinHandle<()> {
        let mut month = self.month.subscribe();
        let mut query = self.query.subscribe();
        let view = self.view.clone();
        let scope = self.scope;

        tokio::spawn(async move {
            loop {
                let next = {
                    let month = *month.borrow_and_update();
                    let query = query.borrow_and_update().clone();
                    let snapshot = snapshots.borrow_and_update();
                    aggregate(month, &query, &snapshot.transactions, scope)
                };
                view.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    *current = next;
                    true
                });

                tokio::select! {
                    changed = month.changed() => if changed.is_err() { break },
                    changed = query.changed() => if changed.is_err() { break },
                    changed = snapshots.changed() => if changed.is_err() { break },
                }
            }
        })
    }
}
