use tokio::sync::watch;

use crate::{MonthCursor, MonthlyView, TotalsScope};

use super::Engine;

impl Engine {
    pub fn month(&self) -> MonthCursor {
        self.aggregation.month()
    }

    pub fn set_month(&self, month: MonthCursor) {
        self.aggregation.set_month(month);
    }

    pub fn next_month(&self) {
        self.aggregation.next_month();
    }

    pub fn previous_month(&self) {
        self.aggregation.previous_month();
    }

    pub fn search_query(&self) -> String {
        self.aggregation.search_query()
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.aggregation.set_search_query(query);
    }

    pub fn totals_scope(&self) -> TotalsScope {
        self.aggregation.scope()
    }

    /// Last computed view. It may lag an input change by one recompute.
    pub fn monthly_view(&self) -> MonthlyView {
        self.aggregation.view()
    }

    pub fn subscribe_monthly_view(&self) -> watch::Receiver<MonthlyView> {
        self.aggregation.subscribe()
    }
}
