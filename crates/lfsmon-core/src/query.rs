//! Filtering and pagination shared by the event, alert and log listings.

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Conjunction of optional filter clauses. No clauses matches everything.
pub struct Predicate<'a, T> {
    clauses: Vec<Box<dyn Fn(&T) -> bool + Send + Sync + 'a>>,
}

impl<'a, T> Predicate<'a, T> {
    /// A predicate with no clauses.
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Adds an unconditional clause.
    pub fn and<F>(mut self, clause: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'a,
    {
        self.clauses.push(Box::new(clause));
        self
    }

    /// Adds a clause only when the filter value is present.
    pub fn and_some<V, F>(self, value: Option<V>, clause: F) -> Self
    where
        V: Send + Sync + 'a,
        F: Fn(&T, &V) -> bool + Send + Sync + 'a,
    {
        match value {
            Some(v) => self.and(move |item| clause(item, &v)),
            None => self,
        }
    }

    /// True when every clause accepts `item`.
    pub fn matches(&self, item: &T) -> bool {
        self.clauses.iter().all(|clause| clause(item))
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// True when no clause was added.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl<T> Default for Predicate<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw page window as supplied by a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Index of the first item; none means zero.
    pub offset: Option<i64>,
    /// Maximum item count; none or zero means the rest.
    pub size: Option<usize>,
}

impl PageRequest {
    /// Builds a request from raw query values.
    pub fn new(offset: Option<i64>, size: Option<usize>) -> Self {
        Self { offset, size }
    }

    /// Fills in a page size when the caller left it out.
    pub fn with_default_size(mut self, size: Option<usize>) -> Self {
        if self.size.is_none() {
            self.size = size;
        }
        self
    }

    /// Start index and optional item limit. Size zero means no limit.
    pub fn window(&self) -> MonitorResult<(usize, Option<usize>)> {
        let offset = match self.offset {
            None => 0,
            Some(o) if o < 0 => {
                return Err(MonitorError::invalid(
                    o.to_string(),
                    "page offset must not be negative",
                ))
            }
            Some(o) => usize::try_from(o)
                .map_err(|_| MonitorError::invalid(o.to_string(), "page offset out of range"))?,
        };
        let limit = self.size.filter(|&s| s > 0);
        Ok((offset, limit))
    }
}

/// One page of formatted records plus collection counts.
///
/// Field names follow the DataTables protocol the dashboard speaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<R> {
    /// Size of the collection after filtering.
    #[serde(rename = "iTotalRecords")]
    pub total_count: usize,
    /// Same as `total_count`; kept for the dashboard.
    #[serde(rename = "iTotalDisplayRecords")]
    pub filtered_count: usize,
    /// The formatted window.
    #[serde(rename = "aaData")]
    pub items: Vec<R>,
}

/// Slices an already filtered and ordered collection and formats the slice.
///
/// `format` runs once per returned item; items outside the window are never
/// formatted.
pub fn paginate<I, R, F>(request: PageRequest, collection: I, format: F) -> MonitorResult<Page<R>>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
    F: FnMut(I::Item) -> R,
{
    let (offset, limit) = request.window()?;
    let iter = collection.into_iter();
    let total = iter.len();

    let window = iter.skip(offset);
    let items: Vec<R> = match limit {
        Some(limit) => window.take(limit).map(format).collect(),
        None => window.map(format).collect(),
    };

    Ok(Page {
        total_count: total,
        // No secondary filtering stage yet, so both counts agree.
        filtered_count: total,
        items,
    })
}

/// Applies a predicate, then orders the survivors with `compare`.
pub fn select<'t, T, C>(items: &'t [T], predicate: &Predicate<'_, T>, mut compare: C) -> Vec<&'t T>
where
    C: FnMut(&T, &T) -> std::cmp::Ordering,
{
    let mut selected: Vec<&T> = items.iter().filter(|i| predicate.matches(i)).collect();
    selected.sort_by(|a, b| compare(a, b));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn numbers(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_first_page() {
        let page = paginate(PageRequest::new(Some(0), Some(10)), numbers(25), |x| x).unwrap();
        assert_eq!(page.total_count, 25);
        assert_eq!(page.filtered_count, 25);
        assert_eq!(page.items, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_last_partial_page() {
        let page = paginate(PageRequest::new(Some(20), Some(10)), numbers(25), |x| x).unwrap();
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let page = paginate(PageRequest::new(Some(40), Some(10)), numbers(25), |x| x).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 25);
    }

    #[test]
    fn test_negative_offset_rejected() {
        let err = paginate(PageRequest::new(Some(-1), Some(10)), numbers(5), |x| x).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidArgument { .. }));
    }

    #[test]
    fn test_missing_offset_defaults_to_zero() {
        let page = paginate(PageRequest::new(None, Some(3)), numbers(5), |x| x).unwrap();
        assert_eq!(page.items, vec![0, 1, 2]);
    }

    #[test]
    fn test_no_page_size_returns_rest() {
        let page = paginate(PageRequest::new(Some(3), None), numbers(5), |x| x).unwrap();
        assert_eq!(page.items, vec![3, 4]);
        let page = paginate(PageRequest::new(Some(3), Some(0)), numbers(5), |x| x).unwrap();
        assert_eq!(page.items, vec![3, 4]);
    }

    #[test]
    fn test_format_only_runs_on_page() {
        let calls = Cell::new(0);
        let page = paginate(PageRequest::new(Some(5), Some(4)), numbers(1000), |x| {
            calls.set(calls.get() + 1);
            x * 2
        })
        .unwrap();
        assert_eq!(calls.get(), 4);
        assert_eq!(page.items, vec![10, 12, 14, 16]);
    }

    #[test]
    fn test_page_wire_names() {
        let page = paginate(PageRequest::default(), vec!["a"], |x| x).unwrap();
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["iTotalRecords"], 1);
        assert_eq!(json["iTotalDisplayRecords"], 1);
        assert_eq!(json["aaData"][0], "a");
    }

    #[test]
    fn test_default_size_only_fills_missing() {
        assert_eq!(PageRequest::new(None, None).with_default_size(Some(50)).size, Some(50));
        assert_eq!(PageRequest::new(None, Some(5)).with_default_size(Some(50)).size, Some(5));
    }

    #[test]
    fn test_predicate_and_semantics() {
        let pred = Predicate::new()
            .and(|x: &i32| *x > 2)
            .and_some(Some(10), |x: &i32, max: &i32| x < max)
            .and_some(None::<i32>, |_: &i32, _: &i32| false);
        assert_eq!(pred.len(), 2);
        assert!(pred.matches(&5));
        assert!(!pred.matches(&1));
        assert!(!pred.matches(&11));
    }

    #[test]
    fn test_empty_predicate_matches_all() {
        let items = vec![3, 1, 2];
        let pred: Predicate<'_, i32> = Predicate::new();
        assert!(pred.is_empty());
        let selected = select(&items, &pred, |a, b| b.cmp(a));
        assert_eq!(selected, vec![&3, &2, &1]);
    }
}
