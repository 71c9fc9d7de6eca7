use std::cmp::Ordering;
use std::io::Write;

use serde_json::Value;

use crate::context::Context;
use crate::errors::{Error, ErrorKind, ReportError, TmpletResult};
use crate::parsing::instructions::Instruction;
use crate::template::Template;
use crate::utils::Span;
use crate::value;
use crate::vm::state::State;

pub(crate) struct VirtualMachine<'t> {
    template: &'t Template,
}

impl<'t> VirtualMachine<'t> {
    pub(crate) fn new(template: &'t Template) -> Self {
        Self { template }
    }

    pub(crate) fn render(&self, context: &'t Context) -> TmpletResult<String> {
        let mut output = Vec::with_capacity(self.template.raw_content_num_bytes + 32);
        let mut state = State::new(context);
        self.interpret(&mut state, &mut output)?;
        Ok(String::from_utf8(output)?)
    }

    fn interpret(&self, state: &mut State<'t>, output: &mut impl Write) -> TmpletResult<()> {
        let mut ip = 0;
        let chunk = &self.template.chunk;

        macro_rules! rendering_error {
            ($kind:ident, $msg:expr, $span:expr) => {{
                let span: Option<&Span> = $span;
                // Fall back to the span of the current instruction
                let span = span
                    .or_else(|| chunk.get_span(ip))
                    .cloned()
                    .unwrap_or_default();
                let err =
                    ReportError::new($msg, &self.template.name, &self.template.source, &span);
                return Err(Error::new(ErrorKind::$kind(err)));
            }};
        }

        macro_rules! math_binop {
            ($fn:ident) => {{
                let (b, b_span) = state.stack.pop();
                let (a, a_span) = state.stack.pop();
                match value::$fn(&a, &b) {
                    Ok(c) => state.stack.push(c, a_span),
                    Err(e) => {
                        let err_msg = e.to_string();
                        if err_msg.contains("divide by 0") {
                            rendering_error!(RenderingError, err_msg, b_span);
                        } else {
                            rendering_error!(RenderingError, err_msg, None);
                        }
                    }
                }
            }};
        }

        macro_rules! cmp_binop {
            ($pat:pat) => {{
                let (b, _) = state.stack.pop();
                let (a, a_span) = state.stack.pop();
                match value::compare(&a, &b) {
                    Ok(ord) => state.stack.push(Value::Bool(matches!(ord, $pat)), a_span),
                    Err(e) => rendering_error!(RenderingError, e.to_string(), None),
                }
            }};
        }

        while let Some((instr, _)) = chunk.get(ip) {
            match instr {
                Instruction::LoadConst(v) => {
                    state.stack.push(v.clone(), chunk.get_span(ip));
                }
                Instruction::LoadName(name) => match state.get(name) {
                    Some(v) => state.stack.push(v, chunk.get_span(ip)),
                    None => {
                        rendering_error!(
                            UndefinedVariable,
                            format!("Variable `{name}` is not defined"),
                            None
                        );
                    }
                },
                Instruction::LoadAttr(attr) => {
                    let (a, a_span) = state.stack.pop();
                    let val = match a.get(attr.as_str()) {
                        Some(v) => Some(v.clone()),
                        // `.length` works on arrays and strings, like in the
                        // scripts these templates were written for
                        None if attr == "length" => match &a {
                            Value::Array(items) => Some(Value::from(items.len())),
                            Value::String(s) => Some(Value::from(s.chars().count())),
                            _ => None,
                        },
                        None => None,
                    };
                    match val {
                        Some(v) => state.stack.push(v, chunk.get_span(ip)),
                        None => {
                            if a.is_object() {
                                rendering_error!(
                                    RenderingError,
                                    format!("Field `{attr}` is not defined"),
                                    None
                                );
                            }
                            rendering_error!(
                                RenderingError,
                                format!(
                                    "Tried to get field `{attr}` of a `{}`",
                                    value::name(&a)
                                ),
                                a_span
                            );
                        }
                    }
                }
                Instruction::BinarySubscript => {
                    let (sub, sub_span) = state.stack.pop();
                    let (val, val_span) = state.stack.pop();
                    let item = match &sub {
                        Value::String(s) => val.get(s.as_str()),
                        Value::Number(n) => n.as_u64().and_then(|i| val.get(i as usize)),
                        _ => None,
                    };
                    match item {
                        Some(v) => state.stack.push(v.clone(), chunk.get_span(ip)),
                        None => match (&val, &sub) {
                            (Value::Object(_), Value::String(s)) => {
                                rendering_error!(
                                    RenderingError,
                                    format!("Field `{s}` is not defined"),
                                    sub_span
                                );
                            }
                            (Value::Array(_), Value::Number(n)) => {
                                rendering_error!(
                                    RenderingError,
                                    format!("Index `{n}` is out of bounds"),
                                    sub_span
                                );
                            }
                            (Value::Object(_) | Value::Array(_), _) => {
                                rendering_error!(
                                    RenderingError,
                                    format!("Cannot index with a `{}`", value::name(&sub)),
                                    sub_span
                                );
                            }
                            _ => {
                                rendering_error!(
                                    RenderingError,
                                    format!("Cannot index a `{}`", value::name(&val)),
                                    val_span
                                );
                            }
                        },
                    }
                }
                Instruction::WriteText(t) => {
                    output.write_all(t.as_bytes())?;
                }
                Instruction::WriteTop => {
                    let (top, _) = state.stack.pop();
                    value::format(&top, output)?;
                }
                Instruction::Print(num_args) => {
                    let mut args = Vec::with_capacity(*num_args);
                    for _ in 0..*num_args {
                        args.push(state.stack.pop().0);
                    }
                    for arg in args.iter().rev() {
                        value::format(arg, output)?;
                    }
                }
                Instruction::Set(name) => {
                    let (val, _) = state.stack.pop();
                    state.store(name, val);
                }
                Instruction::Jump(target_ip) => {
                    ip = *target_ip;
                    continue;
                }
                Instruction::PopJumpIfFalse(target_ip) => {
                    let (val, _) = state.stack.pop();
                    if !value::is_truthy(&val) {
                        ip = *target_ip;
                        continue;
                    }
                }
                Instruction::JumpIfFalseOrPop(target_ip) => {
                    let (peeked, _) = state.stack.peek();
                    if !value::is_truthy(peeked) {
                        ip = *target_ip;
                        continue;
                    } else {
                        state.stack.pop();
                    }
                }
                Instruction::JumpIfTrueOrPop(target_ip) => {
                    let (peeked, _) = state.stack.peek();
                    if value::is_truthy(peeked) {
                        ip = *target_ip;
                        continue;
                    } else {
                        state.stack.pop();
                    }
                }
                Instruction::Mul => math_binop!(mul),
                Instruction::Div => math_binop!(div),
                Instruction::Mod => math_binop!(rem),
                Instruction::Plus => math_binop!(add),
                Instruction::Minus => math_binop!(sub),
                Instruction::LessThan => cmp_binop!(Ordering::Less),
                Instruction::GreaterThan => cmp_binop!(Ordering::Greater),
                Instruction::LessThanOrEqual => cmp_binop!(Ordering::Less | Ordering::Equal),
                Instruction::GreaterThanOrEqual => {
                    cmp_binop!(Ordering::Greater | Ordering::Equal)
                }
                Instruction::Equal => {
                    let (b, _) = state.stack.pop();
                    let (a, a_span) = state.stack.pop();
                    state.stack.push(Value::Bool(value::equal(&a, &b)), a_span);
                }
                Instruction::NotEqual => {
                    let (b, _) = state.stack.pop();
                    let (a, a_span) = state.stack.pop();
                    state.stack.push(Value::Bool(!value::equal(&a, &b)), a_span);
                }
                Instruction::Not => {
                    let (a, a_span) = state.stack.pop();
                    state.stack.push(Value::Bool(!value::is_truthy(&a)), a_span);
                }
                Instruction::Negative => {
                    let (a, a_span) = state.stack.pop();
                    match value::negate(&a) {
                        Ok(b) => state.stack.push(b, a_span),
                        Err(e) => rendering_error!(RenderingError, e.to_string(), a_span),
                    }
                }
            }

            ip += 1;
        }

        Ok(())
    }
}
