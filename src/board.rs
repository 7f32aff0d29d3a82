use tracing::debug;

use crate::fetcher::FetchError;
use crate::filters::{normalize, DraftFilters, NormalizedQuery};
use crate::models::JobListing;
use crate::source::JobSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub page: u32,
    pub jobs: Vec<JobListing>,
    pub phase: Phase,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub query: NormalizedQuery,
    pub page: u32,
}

pub struct JobBoard {
    draft: DraftFilters,
    active: NormalizedQuery,
    state: PageState,
    issued: u64,
    page_size: u32,
}

impl JobBoard {
    pub fn new(source: JobSource, page_size: u32) -> Self {
        Self {
            draft: DraftFilters::new(source),
            active: NormalizedQuery::default(),
            state: PageState {
                page: 1,
                jobs: Vec::new(),
                phase: Phase::Idle,
                error: None,
            },
            issued: 0,
            page_size,
        }
    }

    pub fn source(&self) -> JobSource {
        self.draft.source()
    }

    pub fn draft_mut(&mut self) -> &mut DraftFilters {
        &mut self.draft
    }

    pub fn active_query(&self) -> &NormalizedQuery {
        &self.active
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn page(&self) -> u32 {
        self.state.page
    }

    pub fn apply_filters(&mut self) -> FetchTicket {
        self.active = normalize(&self.draft);
        self.state.page = 1;
        self.issue()
    }

    pub fn reset_filters(&mut self) -> FetchTicket {
        self.draft.reset();
        self.active = NormalizedQuery::default();
        self.state.page = 1;
        self.issue()
    }

    /// Only offered while the last page came back full.
    pub fn next_page(&mut self) -> Option<FetchTicket> {
        if !self.has_next() {
            return None;
        }
        self.state.page += 1;
        Some(self.issue())
    }

    pub fn prev_page(&mut self) -> Option<FetchTicket> {
        if !self.has_prev() {
            return None;
        }
        self.state.page -= 1;
        Some(self.issue())
    }

    pub fn go_to_page(&mut self, page: u32) -> FetchTicket {
        self.state.page = page.max(1);
        self.issue()
    }

    pub fn refresh(&mut self) -> FetchTicket {
        self.issue()
    }

    pub fn has_next(&self) -> bool {
        self.state.phase == Phase::Success && self.state.jobs.len() >= self.page_size as usize
    }

    pub fn has_prev(&self) -> bool {
        self.state.page > 1
    }

    pub fn is_latest(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.issued
    }

    /// Apply a fetch outcome. Returns false when the ticket has been
    /// superseded and the result was dropped.
    pub fn complete(&mut self, ticket: &FetchTicket, result: Result<Vec<JobListing>, FetchError>) -> bool {
        if !self.is_latest(ticket) {
            debug!(
                generation = ticket.generation,
                latest = self.issued,
                page = ticket.page,
                "discarding stale listing response"
            );
            return false;
        }

        match result {
            Ok(jobs) => {
                self.state.jobs = jobs;
                self.state.error = None;
                self.state.phase = Phase::Success;
            }
            Err(e) => {
                self.state.jobs.clear();
                self.state.error = Some(e.to_string());
                self.state.phase = Phase::Failed;
            }
        }
        true
    }

    fn issue(&mut self) -> FetchTicket {
        self.issued += 1;
        self.state.phase = Phase::Loading;
        FetchTicket {
            generation: self.issued,
            query: self.active.clone(),
            page: self.state.page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::listings;
    use crate::fetcher::PAGE_SIZE;
    use crate::filters::QueryValue;

    fn board() -> JobBoard {
        JobBoard::new(JobSource::Ats, PAGE_SIZE)
    }

    fn advance(board: &mut JobBoard, pages: u32) {
        for _ in 0..pages {
            let ticket = board.refresh();
            board.complete(&ticket, Ok(listings(PAGE_SIZE as usize)));
            board.next_page().unwrap();
        }
    }

    #[test]
    fn test_fresh_board_is_idle_on_page_one() {
        let board = board();
        assert_eq!(board.state().phase, Phase::Idle);
        assert_eq!(board.page(), 1);
        assert!(board.active_query().is_empty());
    }

    #[test]
    fn test_refresh_issues_loading_ticket() {
        let mut board = board();
        let ticket = board.refresh();
        assert_eq!(ticket.page, 1);
        assert_eq!(ticket.generation, 1);
        assert_eq!(board.state().phase, Phase::Loading);
    }

    #[test]
    fn test_short_page_disables_next() {
        let mut board = board();
        let ticket = board.refresh();
        board.complete(&ticket, Ok(listings(99)));
        assert!(!board.has_next());
        assert!(board.next_page().is_none());
        assert_eq!(board.page(), 1);
    }

    #[test]
    fn test_full_page_enables_next() {
        let mut board = board();
        let ticket = board.refresh();
        board.complete(&ticket, Ok(listings(100)));
        assert!(board.has_next());

        let next = board.next_page().unwrap();
        assert_eq!(next.page, 2);
        assert!(!board.has_next(), "next stays disabled while loading");
    }

    #[test]
    fn test_apply_filters_resets_to_page_one() {
        let mut board = board();
        advance(&mut board, 4);
        assert_eq!(board.page(), 5);

        board.draft_mut().set("remote", "remote").unwrap();
        let ticket = board.apply_filters();
        assert_eq!(ticket.page, 1);
        assert_eq!(board.page(), 1);
        assert_eq!(ticket.query.get("remote"), Some(&QueryValue::Bool(true)));
        assert_eq!(board.active_query(), &ticket.query);
    }

    #[test]
    fn test_reset_clears_draft_and_query() {
        let mut board = board();
        board.draft_mut().set("title_filter", "Rust").unwrap();
        board.apply_filters();
        advance(&mut board, 2);

        let ticket = board.reset_filters();
        assert!(ticket.query.is_empty());
        assert_eq!(ticket.page, 1);
        assert_eq!(board.draft_mut(), &DraftFilters::new(JobSource::Ats));
    }

    #[test]
    fn test_failure_clears_results_and_success_clears_error() {
        let mut board = board();
        let ticket = board.refresh();
        board.complete(&ticket, Ok(listings(10)));
        assert_eq!(board.state().jobs.len(), 10);

        let ticket = board.refresh();
        board.complete(&ticket, Err(FetchError::Network("Network Error".into())));
        assert_eq!(board.state().phase, Phase::Failed);
        assert!(board.state().jobs.is_empty());
        assert_eq!(board.state().error.as_deref(), Some("Network Error"));

        let ticket = board.refresh();
        board.complete(&ticket, Ok(listings(3)));
        assert_eq!(board.state().phase, Phase::Success);
        assert_eq!(board.state().error, None);
        assert_eq!(board.state().jobs.len(), 3);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut board = board();
        let first = board.refresh();
        board.draft_mut().set("title_filter", "SRE").unwrap();
        let second = board.apply_filters();

        // newest resolves first, then the stale one arrives
        assert!(board.complete(&second, Ok(listings(7))));
        assert!(!board.complete(&first, Ok(listings(100))));
        assert_eq!(board.state().jobs.len(), 7);
        assert_eq!(board.state().phase, Phase::Success);

        // a stale failure doesn't clobber good results either
        assert!(!board.complete(&first, Err(FetchError::Network("boom".into()))));
        assert_eq!(board.state().error, None);
    }

    #[test]
    fn test_prev_page_stops_at_one() {
        let mut board = board();
        assert!(board.prev_page().is_none());
        advance(&mut board, 1);
        assert_eq!(board.prev_page().unwrap().page, 1);
        assert!(board.prev_page().is_none());
    }

    #[test]
    fn test_go_to_page_keeps_query() {
        let mut board = board();
        board.draft_mut().set("salary_unit", "YEAR").unwrap();
        board.apply_filters();
        let ticket = board.go_to_page(3);
        assert_eq!(ticket.page, 3);
        assert_eq!(ticket.query.len(), 1);
        assert_eq!(board.go_to_page(0).page, 1);
    }
}
