use crate::context::Context;
use crate::delimiters::Delimiters;
use crate::errors::{Error, ErrorKind, TmpletResult};
use crate::parsing::compiler::Compiler;
use crate::parsing::instructions::Chunk;
use crate::parsing::parser::Parser;
use crate::vm::interpreter::VirtualMachine;

/// A compiled template.
///
/// Compiling is the expensive part; a `Template` can be rendered any number
/// of times, against a different payload each time.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub(crate) source: String,
    pub(crate) chunk: Chunk,
    /// The number of bytes of raw content, used to size the output buffer
    pub(crate) raw_content_num_bytes: usize,
}

impl Template {
    /// Lexes, parses and compiles the given source.
    ///
    /// The name is only used in error reports.
    pub fn new(name: &str, source: &str, delimiters: Delimiters) -> TmpletResult<Self> {
        delimiters.validate()?;

        let parser = Parser::new(source, delimiters);
        let nodes = match parser.parse() {
            Ok(nodes) => nodes,
            Err(e) => match e.kind {
                ErrorKind::SyntaxError(mut s) => {
                    s.set_source(name, source);
                    return Err(Error::new(ErrorKind::SyntaxError(s)));
                }
                _ => unreachable!("Parser got something other than a SyntaxError: {e}"),
            },
        };

        let mut compiler = Compiler::new(name);
        compiler.compile(nodes);

        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            chunk: compiler.chunk,
            raw_content_num_bytes: compiler.raw_content_num_bytes,
        })
    }

    /// Renders the template against an already built context.
    pub fn render(&self, context: &Context) -> TmpletResult<String> {
        VirtualMachine::new(self).render(context)
    }

    /// Parses the JSON payload into a context and renders against it.
    pub fn render_json(&self, payload: &str) -> TmpletResult<String> {
        let context = Context::from_json(payload)?;
        self.render(&context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_compile_and_render_twice() {
        let tpl = Template::new("tpl", "Hello <%= name %>!", Delimiters::default()).unwrap();

        assert_eq!(tpl.render_json(r#"{"name": "Bob"}"#).unwrap(), "Hello Bob!");
        assert_eq!(
            tpl.render_json(r#"{"name": "Alice"}"#).unwrap(),
            "Hello Alice!"
        );
    }

    #[test]
    fn syntax_error_report_carries_the_source() {
        let err = Template::new("tpl", "<%= 1 + %>", Delimiters::default()).unwrap_err();
        match err.kind {
            ErrorKind::SyntaxError(report) => {
                let report = report.generate_report();
                assert!(report.contains("tpl"), "{report}");
                assert!(report.contains("<%= 1 + %>"), "{report}");
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn errors_on_invalid_delimiters() {
        let err = Template::new(
            "tpl",
            "hello",
            Delimiters {
                start: "[[",
                end: "[[",
            },
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Msg(_)));
    }
}
