//! Lazy page iteration
//!
//! [`PageStream`] issues one request per call to [`PageStream::next_page`]
//! and never requests a page nobody asked for. Once a page fails or the
//! paginator reports the last page, the stream is exhausted for good.

use super::types::{NextPage, PaginationState, Paginator};
use crate::error::Result;
use crate::http::{HttpClient, RequestConfig};
use crate::path::Selector;
use futures::Stream;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// The part of every page request that does not change between pages
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Path relative to the client's base URL
    pub path: String,
    /// Query parameters sent on every page (limit, watermark, fixed params)
    pub params: BTreeMap<String, String>,
}

impl PageRequest {
    /// Create a request for a path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter sent on every page
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number within this stream
    pub number: u32,
    /// Records selected from the page body
    pub records: Vec<Value>,
    /// Token for the following page, if there is one
    pub next_token: Option<String>,
}

impl Page {
    /// True when this was the last page
    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

/// Sequential, on-demand page fetcher
pub struct PageStream {
    client: Arc<HttpClient>,
    request: PageRequest,
    selector: Selector,
    paginator: Box<dyn Paginator>,
    state: PaginationState,
}

impl PageStream {
    /// Create a stream; nothing is fetched until the first `next_page`
    pub fn new(
        client: Arc<HttpClient>,
        request: PageRequest,
        selector: Selector,
        paginator: Box<dyn Paginator>,
    ) -> Self {
        Self {
            client,
            request,
            selector,
            paginator,
            state: PaginationState::new(),
        }
    }

    /// Pagination progress so far
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Token that the next request will carry, if any
    pub fn pending_token(&self) -> Option<&str> {
        if self.state.done {
            None
        } else {
            self.state.cursor.as_deref()
        }
    }

    /// Fetch the next page, or `None` once the last page has been returned
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.state.done {
            return Ok(None);
        }

        match self.fetch().await {
            Ok(page) => Ok(Some(page)),
            Err(e) => {
                self.state.mark_done();
                Err(e)
            }
        }
    }

    async fn fetch(&mut self) -> Result<Page> {
        let mut config = RequestConfig::new();
        for (key, value) in &self.request.params {
            config = config.query(key, value);
        }
        for (key, value) in self.paginator.request_params(&self.state) {
            config = config.query(key, value);
        }

        let body = self.client.get_json(&self.request.path, &config).await?;
        let records = self.selector.select(&body)?;
        let next = self.paginator.process_response(&body, &mut self.state)?;
        self.state.add_page(records.len());

        let next_token = match next {
            NextPage::Continue { .. } => self.state.cursor.clone(),
            NextPage::Done => None,
        };

        debug!(
            path = %self.request.path,
            page = self.state.pages,
            records = records.len(),
            next_token = ?next_token,
            "fetched page"
        );

        Ok(Page {
            number: self.state.pages,
            records,
            next_token,
        })
    }

    /// Flatten the pages into a stream of records
    pub fn into_records(self) -> impl Stream<Item = Result<Value>> + Send {
        futures::stream::try_unfold(
            (self, VecDeque::new()),
            |(mut pages, mut buffer)| async move {
                loop {
                    if let Some(record) = buffer.pop_front() {
                        return Ok(Some((record, (pages, buffer))));
                    }
                    match pages.next_page().await? {
                        Some(page) => buffer.extend(page.records),
                        None => return Ok(None),
                    }
                }
            },
        )
    }
}

impl std::fmt::Debug for PageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStream")
            .field("request", &self.request)
            .field("selector", &self.selector)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
