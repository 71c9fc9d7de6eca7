//! AST -> bytecode
use crate::parsing::ast::{BinaryOperator, Expression, Node, Set, UnaryOperator};
use crate::parsing::instructions::{Chunk, Instruction};

/// We need to handle some pc jumps but we only know to where after we are done processing it
#[derive(Debug)]
enum ProcessingBody {
    /// if/else
    Branch(usize),
    /// and/or
    ShortCircuit(Vec<usize>),
    /// while/for. The jumps are patched once the loop layout is known.
    Loop {
        break_jumps: Vec<usize>,
        continue_jumps: Vec<usize>,
    },
}

/// Literal text is normalized the way the original templating scheme did it:
/// every CR, LF and tab becomes a single space.
fn normalize_content(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\r' | '\n' | '\t' => ' ',
            c => c,
        })
        .collect()
}

pub(crate) struct Compiler {
    pub(crate) chunk: Chunk,
    processing_bodies: Vec<ProcessingBody>,
    pub(crate) raw_content_num_bytes: usize,
}

impl Compiler {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            chunk: Chunk::new(name),
            processing_bodies: Vec::new(),
            raw_content_num_bytes: 0,
        }
    }

    fn compile_expr(&mut self, expr: Expression) {
        match expr {
            Expression::Const(e) => {
                let (val, span) = e.into_parts();
                self.chunk.add(Instruction::LoadConst(val), Some(span));
            }
            Expression::Var(e) => {
                let (val, span) = e.into_parts();
                self.chunk.add(Instruction::LoadName(val.name), Some(span));
            }
            Expression::GetAttr(e) => {
                let (attr, span) = e.into_parts();
                self.compile_expr(attr.expr);
                self.chunk.add(Instruction::LoadAttr(attr.name), Some(span));
            }
            Expression::GetItem(e) => {
                let (item, span) = e.into_parts();
                self.compile_expr(item.expr);
                self.compile_expr(item.sub_expr);
                self.chunk.add(Instruction::BinarySubscript, Some(span));
            }
            Expression::UnaryOperation(e) => {
                let (op, span) = e.into_parts();
                self.compile_expr(op.expr);
                match op.op {
                    UnaryOperator::Not => self.chunk.add(Instruction::Not, Some(span)),
                    UnaryOperator::Minus => self.chunk.add(Instruction::Negative, Some(span)),
                };
            }
            Expression::BinaryOperation(e) => {
                let (op, span) = e.into_parts();
                let instr = match op.op {
                    BinaryOperator::Mul => Instruction::Mul,
                    BinaryOperator::Div => Instruction::Div,
                    BinaryOperator::Mod => Instruction::Mod,
                    BinaryOperator::Plus => Instruction::Plus,
                    BinaryOperator::Minus => Instruction::Minus,
                    BinaryOperator::LessThan => Instruction::LessThan,
                    BinaryOperator::GreaterThan => Instruction::GreaterThan,
                    BinaryOperator::LessThanOrEqual => Instruction::LessThanOrEqual,
                    BinaryOperator::GreaterThanOrEqual => Instruction::GreaterThanOrEqual,
                    BinaryOperator::Equal => Instruction::Equal,
                    BinaryOperator::NotEqual => Instruction::NotEqual,
                    BinaryOperator::And | BinaryOperator::Or => {
                        self.processing_bodies
                            .push(ProcessingBody::ShortCircuit(vec![]));
                        self.compile_expr(op.left);
                        if let Some(ProcessingBody::ShortCircuit(ref mut instr)) =
                            self.processing_bodies.last_mut()
                        {
                            instr.push(self.chunk.add(
                                if op.op == BinaryOperator::And {
                                    Instruction::JumpIfFalseOrPop(0)
                                } else {
                                    Instruction::JumpIfTrueOrPop(0)
                                },
                                None,
                            ));
                        } else {
                            unreachable!();
                        }
                        self.compile_expr(op.right);
                        let end = self.chunk.len();
                        if let Some(ProcessingBody::ShortCircuit(instr)) =
                            self.processing_bodies.pop()
                        {
                            for i in instr {
                                match self.chunk.get_mut(i) {
                                    Some((Instruction::JumpIfFalseOrPop(ref mut target), _))
                                    | Some((Instruction::JumpIfTrueOrPop(ref mut target), _)) => {
                                        *target = end;
                                    }
                                    _ => {}
                                }
                            }
                        } else {
                            unreachable!()
                        }
                        return;
                    }
                };
                self.compile_expr(op.left);
                self.compile_expr(op.right);
                self.chunk.add(instr, Some(span));
            }
        }
    }

    fn compile_set(&mut self, set: Set) {
        self.compile_expr(set.value);
        self.chunk.add(Instruction::Set(set.name), None);
    }

    fn end_branch(&mut self, idx: usize) {
        match self.processing_bodies.pop() {
            Some(ProcessingBody::Branch(instr)) => self.patch_jump(instr, idx),
            _ => unreachable!(),
        }
    }

    fn patch_jump(&mut self, idx: usize, target: usize) {
        match self.chunk.get_mut(idx) {
            Some((Instruction::Jump(ref mut t), _))
            | Some((Instruction::PopJumpIfFalse(ref mut t), _)) => {
                *t = target;
            }
            _ => {}
        }
    }

    fn current_loop_mut(&mut self) -> Option<&mut ProcessingBody> {
        self.processing_bodies
            .iter_mut()
            .rev()
            .find(|b| matches!(b, ProcessingBody::Loop { .. }))
    }

    /// Patches the pending loop jumps: exits and breaks go past the loop,
    /// continues go to the step/condition.
    fn end_loop(&mut self, exit_jump: Option<usize>, end: usize, continue_target: usize) {
        match self.processing_bodies.pop() {
            Some(ProcessingBody::Loop {
                break_jumps,
                continue_jumps,
            }) => {
                if let Some(idx) = exit_jump {
                    self.patch_jump(idx, end);
                }
                for idx in break_jumps {
                    self.patch_jump(idx, end);
                }
                for idx in continue_jumps {
                    self.patch_jump(idx, continue_target);
                }
            }
            _ => unreachable!(),
        }
    }

    pub(crate) fn compile_node(&mut self, node: Node) {
        match node {
            Node::Content(text) => {
                let text = normalize_content(&text);
                self.raw_content_num_bytes += text.as_bytes().len();
                self.chunk.add(Instruction::WriteText(text), None);
            }
            Node::Expression(expr) => {
                self.compile_expr(expr);
                self.chunk.add(Instruction::WriteTop, None);
            }
            Node::Print(args) => {
                let (args, span) = args.into_parts();
                let num_args = args.len();
                for arg in args {
                    self.compile_expr(arg);
                }
                self.chunk.add(Instruction::Print(num_args), Some(span));
            }
            Node::Set(set) => {
                self.compile_set(set);
            }
            Node::If(i) => {
                self.compile_expr(i.condition);

                let idx = self.chunk.add(Instruction::PopJumpIfFalse(0), None);
                self.processing_bodies.push(ProcessingBody::Branch(idx));
                for node in i.body {
                    self.compile_node(node);
                }

                if !i.false_body.is_empty() {
                    let idx = self.chunk.add(Instruction::Jump(0), None);
                    self.end_branch(self.chunk.len());
                    self.processing_bodies.push(ProcessingBody::Branch(idx));

                    for node in i.false_body {
                        self.compile_node(node);
                    }
                }
                self.end_branch(self.chunk.len());
            }
            Node::While(w) => {
                let cond_idx = self.chunk.len();
                self.compile_expr(w.condition);
                let exit_jump = self.chunk.add(Instruction::PopJumpIfFalse(0), None);

                self.processing_bodies.push(ProcessingBody::Loop {
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                for node in w.body {
                    self.compile_node(node);
                }
                self.chunk.add(Instruction::Jump(cond_idx), None);

                let end = self.chunk.len();
                self.end_loop(Some(exit_jump), end, cond_idx);
            }
            Node::ForC(f) => {
                if let Some(init) = f.init {
                    self.compile_set(init);
                }
                let cond_idx = self.chunk.len();
                let exit_jump = f.condition.map(|condition| {
                    self.compile_expr(condition);
                    self.chunk.add(Instruction::PopJumpIfFalse(0), None)
                });

                self.processing_bodies.push(ProcessingBody::Loop {
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                for node in f.body {
                    self.compile_node(node);
                }

                // `continue` runs the step before re-testing the condition
                let step_idx = self.chunk.len();
                if let Some(step) = f.step {
                    self.compile_set(step);
                }
                self.chunk.add(Instruction::Jump(cond_idx), None);

                let end = self.chunk.len();
                self.end_loop(exit_jump, end, step_idx);
            }
            Node::Break => {
                let idx = self.chunk.add(Instruction::Jump(0), None);
                if let Some(ProcessingBody::Loop {
                    ref mut break_jumps,
                    ..
                }) = self.current_loop_mut()
                {
                    break_jumps.push(idx);
                }
            }
            Node::Continue => {
                let idx = self.chunk.add(Instruction::Jump(0), None);
                if let Some(ProcessingBody::Loop {
                    ref mut continue_jumps,
                    ..
                }) = self.current_loop_mut()
                {
                    continue_jumps.push(idx);
                }
            }
        }
    }

    pub(crate) fn compile(&mut self, nodes: Vec<Node>) {
        for node in nodes {
            self.compile_node(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delimiters::Delimiters;
    use crate::parsing::parser::Parser;

    fn compile(source: &str) -> Chunk {
        let nodes = Parser::new(source, Delimiters::default()).parse().unwrap();
        let mut compiler = Compiler::new("tpl");
        compiler.compile(nodes);
        compiler.chunk
    }

    fn instructions(chunk: &Chunk) -> Vec<Instruction> {
        (0..chunk.len())
            .map(|i| chunk.get(i).unwrap().0.clone())
            .collect()
    }

    #[test]
    fn content_is_normalized() {
        let chunk = compile("a\r\n\tb");
        assert_eq!(
            instructions(&chunk),
            vec![Instruction::WriteText("a   b".to_string())]
        );
    }

    #[test]
    fn interpolation_writes_top() {
        let chunk = compile("<%= name %>");
        assert_eq!(
            instructions(&chunk),
            vec![
                Instruction::LoadName("name".to_string()),
                Instruction::WriteTop,
            ]
        );
    }

    #[test]
    fn if_else_jumps_past_the_other_branch() {
        let chunk = compile("<% if (ok) { %>a<% } else { %>b<% } %>");
        assert_eq!(
            instructions(&chunk),
            vec![
                Instruction::LoadName("ok".to_string()),
                Instruction::PopJumpIfFalse(4),
                Instruction::WriteText("a".to_string()),
                Instruction::Jump(5),
                Instruction::WriteText("b".to_string()),
            ]
        );
    }

    #[test]
    fn while_loops_back_to_the_condition() {
        let chunk = compile("<% while (x < 3) { x++ } %>");
        assert_eq!(
            instructions(&chunk),
            vec![
                Instruction::LoadName("x".to_string()),
                Instruction::LoadConst(3.into()),
                Instruction::LessThan,
                Instruction::PopJumpIfFalse(9),
                Instruction::LoadName("x".to_string()),
                Instruction::LoadConst(1.into()),
                Instruction::Plus,
                Instruction::Set("x".to_string()),
                Instruction::Jump(0),
            ]
        );
    }

    #[test]
    fn break_jumps_past_the_loop_end() {
        let chunk = compile("<% while (true) { break } %>");
        assert_eq!(
            instructions(&chunk),
            vec![
                Instruction::LoadConst(true.into()),
                Instruction::PopJumpIfFalse(4),
                Instruction::Jump(4),
                Instruction::Jump(0),
            ]
        );
    }

    #[test]
    fn for_continue_jumps_to_the_step() {
        let chunk = compile("<% for (i = 0; i < 2; i++) { continue } %>");
        assert_eq!(
            instructions(&chunk),
            vec![
                Instruction::LoadConst(0.into()),
                Instruction::Set("i".to_string()),
                Instruction::LoadName("i".to_string()),
                Instruction::LoadConst(2.into()),
                Instruction::LessThan,
                Instruction::PopJumpIfFalse(12),
                Instruction::Jump(7),
                Instruction::LoadName("i".to_string()),
                Instruction::LoadConst(1.into()),
                Instruction::Plus,
                Instruction::Set("i".to_string()),
                Instruction::Jump(2),
            ]
        );
    }

    #[test]
    fn and_short_circuits() {
        let chunk = compile("<%= a && b %>");
        assert_eq!(
            instructions(&chunk),
            vec![
                Instruction::LoadName("a".to_string()),
                Instruction::JumpIfFalseOrPop(3),
                Instruction::LoadName("b".to_string()),
                Instruction::WriteTop,
            ]
        );
    }

    #[test]
    fn print_pops_all_arguments() {
        let chunk = compile("<% print('a', 'b') %>");
        assert_eq!(
            instructions(&chunk),
            vec![
                Instruction::LoadConst("a".into()),
                Instruction::LoadConst("b".into()),
                Instruction::Print(2),
            ]
        );
    }
}
