//! Page handlers for the three site routes.

use hyper::{HeaderMap, Method};

use super::frame::is_frame_request;
use crate::pages::Page;

/// `/`
pub fn home(headers: &HeaderMap) -> Page {
    Page::Home {
        frame_request: is_frame_request(headers),
    }
}

/// `/about`
pub fn about(headers: &HeaderMap) -> Page {
    Page::About {
        frame_request: is_frame_request(headers),
    }
}

/// `/feedback`
///
/// Any POST counts as a completed submission. The form fields are neither
/// validated nor stored.
pub fn feedback(method: &Method, headers: &HeaderMap) -> Page {
    Page::Feedback {
        frame_request: is_frame_request(headers),
        complete: *method == Method::POST,
    }
}
