use tracing::{debug, trace};

use crate::filter::{self, FilterSet};
use crate::pagination::{self, Page, paginate};
use crate::record::{Attachment, Record};
use crate::sort::{self, SortConfig};

/// State changes of a table view.
#[derive(Debug, Clone)]
pub enum ViewEvent<R: Record> {
    ToggleSort(R::Field),
    SetFilter(R::Field, Vec<String>),
    ClearFilters,
    SetPage(usize),
    NextPage,
    PreviousPage,
    SetPageSize(usize),
    CyclePageSize { forward: bool },
    ReplaceRows(Vec<R>),
}

/// The rows of the current page plus what page controls need.
#[derive(Debug)]
pub struct ViewSlice<'a, R> {
    pub rows: Vec<&'a R>,
    pub total: usize,
    pub page: Page,
    pub page_count: usize,
}

/// A filtered, sorted and paged view over an owned row collection.
///
/// `order` maps view positions to positions in `rows` and is rebuilt
/// (filter, then sort) after every change; pagination windows over it.
pub struct ViewOrchestrator<R: Record> {
    name: String,
    rows: Vec<R>,
    order: Vec<usize>,
    sort: SortConfig<R::Field>,
    filters: FilterSet<R::Field>,
    page: Page,
    options: Vec<(R::Field, Vec<String>)>,
}

impl<R: Record> ViewOrchestrator<R> {
    pub fn new(name: impl Into<String>, page_size: usize) -> Self {
        ViewOrchestrator {
            name: name.into(),
            rows: Vec::new(),
            order: Vec::new(),
            sort: SortConfig::new(R::default_sort_field()),
            filters: FilterSet::new(),
            page: Page::new(0, page_size),
            options: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<R>) -> Self {
        self.handle(ViewEvent::ReplaceRows(rows));
        self
    }

    /// Applies an event and rebuilds the view. Returns false for events that
    /// were ignored.
    pub fn handle(&mut self, event: ViewEvent<R>) -> bool {
        trace!("View {}: {:?}", self.name, event);
        match event {
            ViewEvent::ToggleSort(field) => {
                if !R::is_sortable(field) {
                    debug!("View {}: {:?} is not sortable", self.name, field);
                    return false;
                }
                self.sort = self.sort.toggle(field);
            }
            ViewEvent::SetFilter(key, values) => {
                if !R::filter_keys().contains(&key) {
                    debug!("View {}: {:?} is not filterable", self.name, key);
                    return false;
                }
                self.filters.set(key, values);
            }
            ViewEvent::ClearFilters => self.filters.clear(),
            ViewEvent::SetPage(index) => {
                self.page.set_index(index);
                return true;
            }
            ViewEvent::NextPage => {
                self.page.next(self.order.len());
                return true;
            }
            ViewEvent::PreviousPage => {
                self.page.previous();
                return true;
            }
            ViewEvent::SetPageSize(size) => {
                self.page.set_size(size);
                return true;
            }
            ViewEvent::CyclePageSize { forward } => {
                self.page.cycle_size(forward);
                return true;
            }
            ViewEvent::ReplaceRows(rows) => {
                self.rows = rows;
                self.options = filter::options(&self.rows, &R::filter_keys());
            }
        }
        self.rebuild();
        true
    }

    fn rebuild(&mut self) {
        let matching = filter::matching_indices(&self.rows, &self.filters);
        self.order = sort::order(&self.rows, &matching, &self.sort);
        trace!(
            "View {}: {} of {} rows after filtering",
            self.name,
            self.order.len(),
            self.rows.len()
        );
    }

    pub fn visible(&self) -> ViewSlice<'_, R> {
        let window = paginate(&self.order, &self.page);
        ViewSlice {
            rows: window.visible.iter().map(|&idx| &self.rows[idx]).collect(),
            total: window.total,
            page: self.page,
            page_count: pagination::page_count(window.total, self.page.size()),
        }
    }

    /// Number of rows passing the filters.
    pub fn total(&self) -> usize {
        self.order.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&R> {
        self.rows.iter().find(|r| r.id() == id)
    }

    pub fn sort_config(&self) -> SortConfig<R::Field> {
        self.sort
    }

    pub fn filters(&self) -> &FilterSet<R::Field> {
        &self.filters
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Selectable values per filter key, taken from the unfiltered rows.
    pub fn options(&self) -> &[(R::Field, Vec<String>)] {
        &self.options
    }

    pub fn options_for(&self, key: R::Field) -> &[String] {
        self.options
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }
}

impl<R: Attachment> ViewOrchestrator<R> {
    /// Points the file reference of the row with `id` at `path`. No other row
    /// is touched. Returns false when no row has that id.
    pub fn apply_upload(&mut self, id: &str, path: &str) -> bool {
        let Some(row) = self.rows.iter_mut().find(|r| r.id() == id) else {
            debug!("View {}: no row {} for uploaded file {}", self.name, id, path);
            return false;
        };
        row.set_file_ref(path.to_string());
        self.rebuild();
        true
    }
}
