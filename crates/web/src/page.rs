//! The embedded chat page.

pub const INDEX_HTML: &str = include_str!("../static/index.html");
