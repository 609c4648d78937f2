//! Page-tuple helpers shared by the listing and search paths.

use mediateca_api_types::Pagination;

/// Builds the response pagination tuple. A negative `total` means the
/// caller never counted; the tuple then reports `-1` records and zero
/// pages. The requested page is clamped silently into the computed
/// range rather than rejected.
pub fn paginate(total: i64, page_size: u32, requested_page: u32) -> Pagination {
    let page_size = page_size.max(1);
    let requested_page = requested_page.max(1);
    let total_pages = if total > 0 {
        // `total` is client-reported and may sit anywhere in i64 range;
        // the ceiling must not add past it and the page count saturates.
        let size = i64::from(page_size);
        let pages = total / size + i64::from(total % size != 0);
        u32::try_from(pages).unwrap_or(u32::MAX)
    } else {
        0
    };
    let page_number = if total_pages > 0 {
        requested_page.min(total_pages)
    } else {
        requested_page
    };
    Pagination {
        total_records: total,
        total_pages,
        page_size,
        page_number,
    }
}
