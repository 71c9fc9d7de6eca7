use crate::context::Context;
use crate::delimiters::Delimiters;
use crate::errors::TmpletResult;
use crate::template::Template;

/// The name given to templates rendered in one shot
static ONE_OFF_TEMPLATE_NAME: &str = "__tmplet_one_off";

/// The engine: a delimiter configuration that renders templates in one shot.
///
/// Nothing is cached between calls. To compile once and render many times,
/// use [`Template`] directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tmplet {
    delimiters: Delimiters,
}

impl Tmplet {
    /// An engine using the default `<% %>` delimiters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiters(delimiters: Delimiters) -> Self {
        Self { delimiters }
    }

    /// Compiles `source` and renders it against the JSON payload
    pub fn render(&self, source: &str, payload: &str) -> TmpletResult<String> {
        let template = Template::new(ONE_OFF_TEMPLATE_NAME, source, self.delimiters)?;
        template.render_json(payload)
    }

    /// Compiles `source` and renders it against an already built context
    pub fn render_with_context(&self, source: &str, context: &Context) -> TmpletResult<String> {
        let template = Template::new(ONE_OFF_TEMPLATE_NAME, source, self.delimiters)?;
        template.render(context)
    }
}
