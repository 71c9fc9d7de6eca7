mod context;
mod delimiters;
mod errors;
mod parsing;
mod reporting;
mod template;
mod tmplet;
mod utils;
pub(crate) mod value;
pub(crate) mod vm;

pub use context::Context;
pub use delimiters::Delimiters;
pub use errors::{Error, ErrorKind, ReportError, TmpletResult};
pub use serde_json::Value;
pub use template::Template;
pub use tmplet::Tmplet;

/// Renders `template` against the JSON `payload` using the default `<% %>`
/// delimiters.
///
/// ```
/// let out = tmplet::render("Hi <%= name %>", r#"{"name": "Ada"}"#).unwrap();
/// assert_eq!(out, "Hi Ada");
/// ```
pub fn render(template: &str, payload: &str) -> TmpletResult<String> {
    Tmplet::new().render(template, payload)
}
