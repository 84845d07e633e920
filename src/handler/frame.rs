//! Frame request detection
//!
//! The `<data-frame>` client component marks its fetches with a custom header
//! so the server can answer with a page fragment.

use hyper::HeaderMap;

/// Header set by the `<data-frame>` component on every request it issues
pub const FRAME_REQUEST_HEADER: &str = "X-Frame-Request";

/// True only when the header value is exactly `true` (case-sensitive)
pub fn is_frame_request(headers: &HeaderMap) -> bool {
    headers
        .get(FRAME_REQUEST_HEADER)
        .is_some_and(|value| value.as_bytes() == b"true")
}
