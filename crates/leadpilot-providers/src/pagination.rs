//! Cursor pagination.
//!
//! HubSpot list endpoints return `{results, paging: {next: {after}}}`.
//! [`collect_pages`] keeps requesting until a page carries no cursor and
//! returns every item in request order. No backoff between pages.

use std::future::Future;

use leadpilot_core::Result;
use serde::Deserialize;

/// One page of results plus the cursor for the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Wire shape of a HubSpot list response.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextPage {
    pub after: String,
}

impl<T> From<ListResponse<T>> for Page<T> {
    fn from(resp: ListResponse<T>) -> Self {
        Self {
            items: resp.results,
            next: resp.paging.and_then(|p| p.next).map(|n| n.after),
        }
    }
}

/// Drive `fetch_page` from the first page (`None` cursor) to the last.
pub async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = None;
    loop {
        let page = fetch_page(cursor.take()).await?;
        items.extend(page.items);
        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(items),
        }
    }
}
