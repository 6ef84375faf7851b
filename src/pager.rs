//! # Pager Module
//!
//! Generic pagination used at every menu level and for search results.
//! Pure and deterministic: no I/O, no allocation beyond the returned slice.

/// One page of an ordered item sequence plus the metadata the keyboards need
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in source order
    pub items: Vec<T>,
    /// 1-based page number, always within `[1, total_pages]`
    pub number: u32,
    /// Total page count, at least 1 even for an empty sequence
    pub total_pages: u32,
    /// Length of the full sequence
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn previous_page_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_page_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    /// Whether a navigation row is worth rendering at all
    pub fn has_other_pages(&self) -> bool {
        self.total_pages > 1
    }
}

/// Slice `items` into the requested page
///
/// # Arguments
///
/// * `items` - Ordered sequence to paginate
/// * `page` - Requested 1-based page; out-of-range values (including zero and
///   negatives) are clamped into `[1, total_pages]`
/// * `page_size` - Items per page; zero is treated as one
///
/// # Examples
///
/// ```rust
/// use content_nav_bot::pager::paginate;
///
/// let page = paginate((1..=10).collect(), 2, 4);
/// assert_eq!(page.items, vec![5, 6, 7, 8]);
/// assert_eq!(page.total_pages, 3);
/// assert!(page.has_previous() && page.has_next());
/// ```
pub fn paginate<T>(items: Vec<T>, page: i64, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);

    let number = page.clamp(1, i64::from(total_pages)) as u32;
    let start = (number as usize - 1).saturating_mul(page_size);

    let items = items.into_iter().skip(start).take(page_size).collect();

    Page {
        items,
        number,
        total_pages,
        total_items,
    }
}
