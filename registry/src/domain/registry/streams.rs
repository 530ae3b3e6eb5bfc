//! Lazy keyset-paginated sequences over the driven ports.

use std::future::Future;

use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::domain::ports::Page;

enum Cursor<C> {
    Start,
    After(C),
    Exhausted,
}

/// Stream every record reachable through `fetch`, one page per poll past the
/// end of the previous page.
///
/// `fetch` receives the cursor to resume after (`None` for the first page).
/// Errors end the sequence after being yielded.
pub(super) fn keyset_stream<T, C, E, F, Fut>(fetch: F) -> BoxStream<'static, Result<T, E>>
where
    T: Send + 'static,
    C: Send + 'static,
    E: Send + 'static,
    F: FnMut(Option<C>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page<T, C>, E>> + Send + 'static,
{
    stream::try_unfold((Cursor::Start, fetch), |(cursor, mut fetch)| async move {
        let after = match cursor {
            Cursor::Exhausted => return Ok(None),
            Cursor::Start => None,
            Cursor::After(key) => Some(key),
        };
        let page = fetch(after).await?;
        let next = page.next.map_or(Cursor::Exhausted, Cursor::After);
        Ok(Some((page.items, (next, fetch))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}
