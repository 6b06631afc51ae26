//! Pagination module
//!
//! Supports: cursor (next-page token read from the response envelope) and
//! single-page endpoints.
//!
//! # Overview
//!
//! A [`Paginator`] decides, from each response, whether another page
//! exists and which query parameters fetch it. A [`PageStream`] drives a
//! paginator against the HTTP client and yields pages strictly in order,
//! because every request depends on the token returned by the previous one.

mod stream;
mod strategies;
mod types;

pub use stream::{Page, PageRequest, PageStream};
pub use strategies::{from_config, CursorPaginator, SinglePagePaginator};
pub use types::{NextPage, PaginationConfig, PaginationState, Paginator};
