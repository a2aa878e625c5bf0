//! Page-number pagination shared by every timeline.
//!
//! Requested page numbers come straight from the query string, so resolution
//! never fails: anything that is not a positive integer lands on the first
//! page and numbers past the end land on the last one.

use std::num::IntErrorKind;

use serde::Serialize;

/// Posts shown per timeline page.
pub const PAGE_SIZE: u32 = 10;

/// Offset/limit pair handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(offset: u64, limit: u32) -> Self {
        Self { offset, limit }
    }
}

/// Splits `total_items` into pages of `per_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    total_items: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(total_items: u64, per_page: u32) -> Self {
        Self {
            total_items,
            per_page: per_page.max(1),
        }
    }

    /// Number of pages; an empty collection still has one (empty) page.
    pub fn num_pages(&self) -> u64 {
        self.total_items.div_ceil(u64::from(self.per_page)).max(1)
    }

    /// Resolve the raw `page` query value into a concrete window.
    pub fn page(&self, raw: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            Some(Err(err))
                if matches!(err.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) =>
            {
                num_pages
            }
            None | Some(Err(_)) => 1,
            Some(Ok(value)) if value < 1 => num_pages,
            Some(Ok(value)) => (value as u64).min(num_pages),
        };
        self.window(number)
    }

    fn window(&self, number: u64) -> PageWindow {
        let per_page = u64::from(self.per_page);
        let offset = (number - 1) * per_page;
        let items_on_page = self.total_items.saturating_sub(offset).min(per_page);
        PageWindow {
            number,
            num_pages: self.num_pages(),
            total_items: self.total_items,
            offset,
            limit: self.per_page,
            items_on_page,
        }
    }
}

/// A resolved page: where it starts, how big it is and what surrounds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub total_items: u64,
    pub offset: u64,
    pub limit: u32,
    items_on_page: u64,
}

impl PageWindow {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.offset, self.limit)
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then_some(self.number - 1)
    }

    /// 1-based index of the first item on this page, or 0 when empty.
    pub fn start_index(&self) -> u64 {
        if self.items_on_page == 0 {
            0
        } else {
            self.offset + 1
        }
    }

    /// 1-based index of the last item on this page, or 0 when empty.
    pub fn end_index(&self) -> u64 {
        self.offset + self.items_on_page
    }
}

/// Items of one page plus its window.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self { items, window }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            window: self.window,
        }
    }
}
