pub const PAGE_SIZE_OPTIONS: [usize; 3] = [5, 10, 25];
pub const DEFAULT_PAGE_SIZE: usize = PAGE_SIZE_OPTIONS[0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    index: usize,
    size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            index: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct PageWindow<'a, T> {
    pub visible: &'a [T],
    pub total: usize,
}

impl Page {
    /// A size of 0 is raised to 1.
    pub fn new(index: usize, size: usize) -> Self {
        Page {
            index,
            size: size.max(1),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Changing the size always returns to the first page.
    pub fn set_size(&mut self, size: usize) {
        self.size = size.max(1);
        self.index = 0;
    }

    /// Steps forward, stopping at the last page of `total` rows.
    pub fn next(&mut self, total: usize) {
        let last = page_count(total, self.size).saturating_sub(1);
        self.index = (self.index + 1).min(last);
    }

    pub fn previous(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    /// Cycles through `PAGE_SIZE_OPTIONS`.
    pub fn cycle_size(&mut self, forward: bool) {
        let pos = PAGE_SIZE_OPTIONS
            .iter()
            .position(|&s| s == self.size)
            .unwrap_or(0);
        let n = PAGE_SIZE_OPTIONS.len();
        let next = if forward { (pos + 1) % n } else { (pos + n - 1) % n };
        self.set_size(PAGE_SIZE_OPTIONS[next]);
    }

    /// Position of the first row of this page in the full collection.
    pub fn offset(&self) -> usize {
        self.index.saturating_mul(self.size)
    }
}

pub fn page_count(total: usize, size: usize) -> usize {
    total.div_ceil(size.max(1))
}

/// Slices out the rows of `page`. Pages past the end are empty, never an error.
pub fn paginate<'a, T>(rows: &'a [T], page: &Page) -> PageWindow<'a, T> {
    let begin = std::cmp::min(page.offset(), rows.len());
    let end = std::cmp::min(begin.saturating_add(page.size), rows.len());
    PageWindow {
        visible: &rows[begin..end],
        total: rows.len(),
    }
}
