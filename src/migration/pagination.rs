//! Cursor-paginated collection traversal
//!
//! Used for registry catalogs and tag lists as well as Quay repositories and
//! UCP organizations, teams and members. The caller supplies how to fetch a
//! page for a cursor and how to fold a page into the result; this module only
//! drives the cursor.

use crate::error::Result;
use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;

/// One page of a paginated collection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, C = String> {
    pub items: Vec<T>,
    /// Cursor for the following page, `None` on the last page
    pub next: Option<C>,
}

impl<T, C> Page<T, C> {
    pub fn new(items: Vec<T>, next: Option<C>) -> Self {
        Self { items, next }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Fetch every page of a collection, folding each page into the result.
///
/// The first fetch receives `None`. A fetch error stops the traversal at once
/// and is returned as is; pages collected so far are dropped with it.
///
/// A cursor handed out a second time ends the traversal with what has been
/// collected, so a server cycling through cursors cannot keep it running.
pub async fn traverse<T, C, R, F, Fut, A>(mut fetch_page: F, mut accumulate: A) -> Result<Vec<R>>
where
    C: Clone + Eq + Hash,
    F: FnMut(Option<C>) -> Fut,
    Fut: Future<Output = Result<Page<T, C>>>,
    A: FnMut(&mut Vec<R>, Vec<T>),
{
    let mut result = Vec::new();
    let mut cursor = None;
    let mut seen = HashSet::new();

    loop {
        let page = fetch_page(cursor).await?;
        accumulate(&mut result, page.items);

        match page.next {
            Some(next) if !seen.insert(next.clone()) => return Ok(result),
            Some(next) => cursor = Some(next),
            None => return Ok(result),
        }
    }
}

/// Accumulator that keeps every item of a page unchanged
pub fn collect_all<T>(result: &mut Vec<T>, items: Vec<T>) {
    result.extend(items);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use std::sync::{Arc, Mutex};

    fn pages() -> Vec<Page<&'static str, usize>> {
        vec![
            Page::new(vec!["a", "b"], Some(1)),
            Page::new(vec![], Some(2)),
            Page::new(vec!["c"], Some(3)),
            Page::last(vec!["d", "e"]),
        ]
    }

    #[tokio::test]
    async fn test_traverse_collects_pages_in_order() {
        let pages = pages();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let result = traverse(
            |cursor: Option<usize>| {
                calls.lock().unwrap().push(cursor);
                let page = pages[cursor.unwrap_or(0)].clone();
                async move { Ok(page) }
            },
            collect_all,
        )
        .await
        .unwrap();

        assert_eq!(result, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(*calls.lock().unwrap(), vec![None, Some(1), Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn test_traverse_aborts_on_fetch_error() {
        let pages = pages();
        let mut fetched = Vec::new();

        let result: Result<Vec<&str>> = traverse(
            |cursor: Option<usize>| {
                let index = cursor.unwrap_or(0);
                fetched.push(index);
                let page = if index == 2 {
                    Err(RegistryError::Network("connection reset".to_string()))
                } else {
                    Ok(pages[index].clone())
                };
                async move { page }
            },
            collect_all,
        )
        .await;

        assert!(matches!(result, Err(RegistryError::Network(_))));
        assert_eq!(fetched, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_accumulator_filters_items() {
        let result = traverse(
            |cursor: Option<u32>| async move {
                Ok(match cursor {
                    None => Page::new(vec![(1, true), (2, false)], Some(10)),
                    Some(_) => Page::last(vec![(3, true)]),
                })
            },
            |result: &mut Vec<i32>, items: Vec<(i32, bool)>| {
                result.extend(items.into_iter().filter(|(_, keep)| *keep).map(|(id, _)| id));
            },
        )
        .await
        .unwrap();

        assert_eq!(result, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_single_empty_page() {
        let result: Vec<String> = traverse(
            |_: Option<String>| async { Ok(Page::last(Vec::new())) },
            collect_all,
        )
        .await
        .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_traverse_stops_when_cursors_cycle() {
        // 0 -> 1 -> 2 -> 1 -> ...
        let pages = vec![
            Page::new(vec!["a"], Some(1)),
            Page::new(vec!["b"], Some(2)),
            Page::new(vec!["c"], Some(1)),
        ];
        let mut fetched = Vec::new();

        let result = traverse(
            |cursor: Option<usize>| {
                let index = cursor.unwrap_or(0);
                fetched.push(index);
                let page = pages[index].clone();
                async move { Ok(page) }
            },
            collect_all,
        )
        .await
        .unwrap();

        assert_eq!(result, vec!["a", "b", "c"]);
        assert_eq!(fetched, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_traverse_stops_when_cursor_repeats_immediately() {
        let mut calls = 0;

        let result = traverse(
            |_: Option<String>| {
                calls += 1;
                async { Ok(Page::new(vec![1, 2], Some("same".to_string()))) }
            },
            collect_all,
        )
        .await
        .unwrap();

        assert_eq!(result, vec![1, 2, 1, 2]);
        assert_eq!(calls, 2);
    }
}
