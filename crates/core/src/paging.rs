//! Lazy iteration over token-paginated listings

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::Result;

/// Turn a page fetcher into a flat stream of items
///
/// `fetch` receives the continuation token (`None` for the first page) and
/// returns the page's items plus the next token. Nothing is requested until
/// the stream is polled, and the stream ends after the first page without a
/// next token.
pub(crate) fn paginate<T, F, Fut>(fetch: F) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: FnMut(Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(Vec<T>, Option<String>)>> + Send + 'static,
{
    stream::try_unfold((fetch, Some(None)), |(mut fetch, cursor)| async move {
        let Some(token) = cursor else {
            return Ok(None);
        };
        let (items, next) = fetch(token).await?;
        Ok(Some((items, (fetch, next.map(Some)))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}
