//! Page templates
//!
//! Each page is compiled from `templates/` at build time. All of them extend
//! `layout.html`, which drops the document chrome for frame requests.

use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
struct HomeTemplate {
    frame_request: bool,
}

#[derive(Template)]
#[template(path = "about.html")]
struct AboutTemplate {
    frame_request: bool,
}

#[derive(Template)]
#[template(path = "feedback.html")]
struct FeedbackTemplate {
    frame_request: bool,
    complete: bool,
}

/// A page chosen by a route handler, together with its render context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home { frame_request: bool },
    About { frame_request: bool },
    Feedback { frame_request: bool, complete: bool },
}

impl Page {
    /// Template file the page renders from
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::Home { .. } => "index.html",
            Self::About { .. } => "about.html",
            Self::Feedback { .. } => "feedback.html",
        }
    }

    pub fn render(self) -> askama::Result<String> {
        match self {
            Self::Home { frame_request } => HomeTemplate { frame_request }.render(),
            Self::About { frame_request } => AboutTemplate { frame_request }.render(),
            Self::Feedback {
                frame_request,
                complete,
            } => FeedbackTemplate {
                frame_request,
                complete,
            }
            .render(),
        }
    }
}
