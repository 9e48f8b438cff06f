use std::collections::VecDeque;

use docstore_backend::{Entity, Query};
use tracing::debug;

use crate::error::ClientResult;
use crate::wrapper::DatastoreWrapper;

/// Lazy, finite sequence of query results.
///
/// Pages are fetched from the backend only when the buffered entities run
/// out, following the cursor of the previous page. The sequence is single
/// pass; re-run the query to start over. After an error the sequence ends.
pub struct QueryResults<'a> {
    wrapper: &'a DatastoreWrapper,
    query: Query,
    buffer: VecDeque<Entity>,
    exhausted: bool,
    pages: usize,
}

impl<'a> QueryResults<'a> {
    pub(crate) fn new(wrapper: &'a DatastoreWrapper, query: Query) -> Self {
        Self {
            wrapper,
            query,
            buffer: VecDeque::new(),
            exhausted: false,
            pages: 0,
        }
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn fetch_page(&mut self) -> ClientResult<()> {
        let page = self.wrapper.query_page(&self.query)?;
        self.pages += 1;
        debug!(
            kind = %self.query.kind,
            page = self.pages,
            size = page.entities.len(),
            more = page.more_results,
            "query page fetched"
        );
        if let Some(limit) = self.query.limit.as_mut() {
            *limit = limit.saturating_sub(page.entities.len());
        }
        self.exhausted = !page.more_results;
        self.query.start_cursor = Some(page.end_cursor);
        self.buffer.extend(page.entities);
        Ok(())
    }
}

impl Iterator for QueryResults<'_> {
    type Item = ClientResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.buffer.pop_front() {
                return Some(Ok(entity));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}
