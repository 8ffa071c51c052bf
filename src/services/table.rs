//! Client-side table state: search, sort, pagination and row selection.
//!
//! Registry views fetch a whole collection once and then shape it in
//! memory. The functions here are pure; [`TableState`] holds the
//! per-view state and keeps its invariants (`page >= 1`, selection scoped
//! to one table).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

/// Default number of rows per page.
pub const DEFAULT_PER_PAGE: usize = 20;

/// A row that can be searched, sorted and selected.
pub trait TableRow {
    /// Fields a free-text query can be matched against.
    type Field: Copy + Eq + fmt::Debug;

    /// Columns the table can be sorted by.
    type Column: Copy + Eq + fmt::Debug;

    /// Text of `field` for this row; `None` never matches a query.
    fn field_value(&self, field: Self::Field) -> Option<&str>;

    fn compare_by(&self, other: &Self, column: Self::Column) -> Ordering;

    /// Identifier used by the selection set.
    fn row_id(&self) -> String;
}

/// Free-text query against one named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState<F> {
    pub query: String,
    pub field: F,
}

impl<F> SearchState<F> {
    pub fn new(field: F) -> Self {
        Self {
            query: String::new(),
            field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState<C> {
    pub column: C,
    pub direction: SortDirection,
}

/// Rows matching `search`, in input order.
///
/// An empty query matches everything. Otherwise a row matches when the
/// searched field contains the query as a case-sensitive substring.
pub fn filter_rows<'a, T: TableRow>(rows: &'a [T], search: &SearchState<T::Field>) -> Vec<&'a T> {
    if search.query.is_empty() {
        return rows.iter().collect();
    }

    rows.iter()
        .filter(|row| {
            row.field_value(search.field)
                .is_some_and(|value| value.contains(search.query.as_str()))
        })
        .collect()
}

/// Stable sort of already-filtered rows.
pub fn sort_rows<T: TableRow>(rows: &mut [&T], sort: &SortState<T::Column>) {
    rows.sort_by(|a, b| {
        let ord = a.compare_by(b, sort.column);
        match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

/// Number of pages needed for `total` rows; zero rows need zero pages.
pub fn page_count(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

/// The 1-based `page` of `rows`; empty when the page is out of range.
pub fn paginate<T>(rows: &[T], page: usize, per_page: usize) -> &[T] {
    if page == 0 || per_page == 0 {
        return &[];
    }

    let start = (page - 1).saturating_mul(per_page);
    if start >= rows.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(rows.len());

    &rows[start..end]
}

/// One rendered page of a table.
#[derive(Debug)]
pub struct TableSlice<'a, T> {
    /// Rows on the current page.
    pub visible: Vec<&'a T>,

    /// Rows matching the search, across all pages.
    pub total_count: usize,

    pub page_count: usize,
}

/// Search, sort, pagination and selection state of one table view.
#[derive(Debug, Clone)]
pub struct TableState<T: TableRow> {
    search: SearchState<T::Field>,
    sort: Option<SortState<T::Column>>,
    page: usize,
    per_page: usize,
    selected: BTreeSet<String>,
    _rows: PhantomData<fn() -> T>,
}

impl<T: TableRow> TableState<T> {
    pub fn new(default_field: T::Field) -> Self {
        Self::with_per_page(default_field, DEFAULT_PER_PAGE)
    }

    pub fn with_per_page(default_field: T::Field, per_page: usize) -> Self {
        Self {
            search: SearchState::new(default_field),
            sort: None,
            page: 1,
            per_page: per_page.max(1),
            selected: BTreeSet::new(),
            _rows: PhantomData,
        }
    }

    pub fn search(&self) -> &SearchState<T::Field> {
        &self.search
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn sort(&self) -> Option<&SortState<T::Column>> {
        self.sort.as_ref()
    }

    /// Change the query; the view returns to the first page.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.search.query {
            self.search.query = query;
            self.page = 1;
        }
    }

    /// Change the searched field; the view returns to the first page.
    pub fn set_field(&mut self, field: T::Field) {
        if field != self.search.field {
            self.search.field = field;
            self.page = 1;
        }
    }

    /// Pages are 1-based; zero is treated as one.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn set_per_page(&mut self, per_page: usize) {
        let per_page = per_page.max(1);
        if per_page != self.per_page {
            self.per_page = per_page;
            self.page = 1;
        }
    }

    pub fn set_sort(&mut self, sort: Option<SortState<T::Column>>) {
        self.sort = sort;
    }

    /// Filter, sort and slice `rows` for display.
    pub fn apply<'a>(&self, rows: &'a [T]) -> TableSlice<'a, T> {
        let mut matching = filter_rows(rows, &self.search);
        if let Some(sort) = &self.sort {
            sort_rows(&mut matching, sort);
        }

        let total_count = matching.len();
        let visible = paginate(&matching, self.page, self.per_page).to_vec();

        TableSlice {
            visible,
            total_count,
            page_count: page_count(total_count, self.per_page),
        }
    }

    pub fn select(&mut self, row: &T) {
        self.selected.insert(row.row_id());
    }

    pub fn deselect(&mut self, row: &T) {
        self.selected.remove(&row.row_id());
    }

    /// Flip the selection of `row`; returns whether it is now selected.
    pub fn toggle(&mut self, row: &T) -> bool {
        let id = row.row_id();
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    pub fn is_selected(&self, row: &T) -> bool {
        self.selected.contains(&row.row_id())
    }

    /// Select every row on the current page of `rows`.
    pub fn select_page(&mut self, rows: &[T]) {
        let ids: Vec<String> = self.apply(rows).visible.iter().map(|r| r.row_id()).collect();
        self.selected.extend(ids);
    }

    /// Select every row matching the current search.
    pub fn select_all(&mut self, rows: &[T]) {
        let ids: Vec<String> = filter_rows(rows, &self.search)
            .iter()
            .map(|r| r.row_id())
            .collect();
        self.selected.extend(ids);
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    /// Selected identifiers in ascending order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    /// Rows of `rows` that are currently selected, in input order.
    pub fn selected_rows<'a>(&self, rows: &'a [T]) -> Vec<&'a T> {
        rows.iter().filter(|r| self.is_selected(r)).collect()
    }

    /// The user left the view: selection does not survive navigation.
    pub fn navigate_away(&mut self) {
        self.selected.clear();
        self.page = 1;
    }
}
