use crate::diagnostic::Diagnostic;
use crate::item::{AddressingMode, BranchTarget, D2Operand, DataValue, Item, Operand, SectionKind};
use crate::mnemonics::{data_op, load_store_op};
use crate::number::{parse_number_literal, validate_immediate};
use crate::token::{Token, TokenKind};
use m20_isa::{dp_operand_width, DataOp};

fn register_index(word: &str) -> Option<u8> {
    match word {
        "sp" => Some(13),
        "lp" => Some(14),
        "pc" => Some(15),
        _ => word.strip_prefix('r').and_then(|rest| rest.parse::<u8>().ok()).filter(|n| *n <= 12),
    }
}

/// Decodes a `db` string literal's body (quotes included in `raw`), per
/// §4.2's escape table. `\xHH` is reserved syntax the original tool
/// asserted on; here it is a regular diagnostic instead.
fn decode_string_literal(raw: &str) -> Result<Vec<u8>, String> {
    let inner = &raw[1..raw.len().saturating_sub(1)];
    let mut out = Vec::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('\'') => out.push(b'\''),
            Some('"') => out.push(b'"'),
            Some('\\') => out.push(b'\\'),
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0u8),
            Some('x') => return Err("`\\x` escapes are reserved and not supported".to_owned()),
            Some(other) => return Err(format!("unknown escape sequence `\\{}`", other)),
            None => return Err("unterminated escape sequence".to_owned()),
        }
    }
    Ok(out)
}

/// Recursive-descent parser producing a flat `Vec<Item>`. One error does
/// not abort the file: `parse` records the diagnostic and resumes scanning
/// at the next token that looks like a statement start, rather than
/// unwinding via a non-local jump the way the original tool did.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

pub fn parse(tokens: Vec<Token>) -> (Vec<Item>, Vec<Diagnostic>) {
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Vec<Item>, Vec<Diagnostic>) {
        let mut items = Vec::new();
        while self.pos < self.tokens.len() {
            match self.parse_statement() {
                Ok(item) => items.push(item),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.skip_to_next_statement();
                }
            }
        }
        (items, self.diagnostics)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_to_next_statement(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        while let Some(t) = self.peek() {
            match t.kind {
                TokenKind::Label
                | TokenKind::Keyword
                | TokenKind::D3Instr
                | TokenKind::D2Instr
                | TokenKind::D1Instr
                | TokenKind::EmptyInstr
                | TokenKind::MemInstr
                | TokenKind::Instruction => break,
                _ => self.pos += 1,
            }
        }
    }

    fn error(&self, line: u32, column: u32, message: impl Into<String>) -> Diagnostic {
        Diagnostic::syntax(line, column, message.into())
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> Result<Token, Diagnostic> {
        match self.peek() {
            Some(t) if t.kind == kind => Ok(self.advance().unwrap()),
            Some(t) => Err(self.error(t.line, t.column, format!("{}, found `{}`", what, t.raw))),
            None => Err(self.error(0, 0, format!("{}, found end of input", what))),
        }
    }

    fn expect_comma(&mut self) -> Result<(), Diagnostic> {
        self.expect_kind(TokenKind::Comma, "expected `,`")?;
        Ok(())
    }

    fn expect_register(&mut self) -> Result<u8, Diagnostic> {
        let tok = self.expect_kind(TokenKind::Register, "expected a register")?;
        register_index(&tok.text.to_ascii_lowercase())
            .ok_or_else(|| self.error(tok.line, tok.column, format!("`{}` is not a general-purpose register", tok.raw)))
    }

    fn parse_statement(&mut self) -> Result<Item, Diagnostic> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error(0, 0, "unexpected end of input"))?;
        match token.kind {
            TokenKind::Keyword => self.parse_directive(),
            TokenKind::Label => self.parse_label_def(),
            TokenKind::D3Instr => self.parse_d3(),
            TokenKind::D2Instr => self.parse_d2(),
            TokenKind::D1Instr => self.parse_d1(),
            TokenKind::EmptyInstr => self.parse_empty(),
            TokenKind::MemInstr => self.parse_mem(),
            TokenKind::Instruction => self.parse_instruction_kind(),
            _ => Err(self.error(token.line, token.column, format!("unexpected token `{}`", token.raw))),
        }
    }

    fn parse_label_def(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        match self.peek() {
            Some(next) if next.kind == TokenKind::Declare => {
                self.advance();
                Ok(Item::LabelDef {
                    name: tok.text.clone(),
                    line: tok.line,
                    column: tok.column,
                })
            }
            _ => Err(self.error(tok.line, tok.column, format!("expected `:` after label `{}`", tok.raw))),
        }
    }

    fn parse_directive(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        match tok.text.to_ascii_lowercase().as_str() {
            "global" => self.parse_single_label_directive(&tok, |label, line, column| Item::Global { label, line, column }),
            "extern" => self.parse_single_label_directive(&tok, |label, line, column| Item::Extern { label, line, column }),
            "entry" => self.parse_single_label_directive(&tok, |label, line, column| Item::Entry { label, line, column }),
            "section" => self.parse_section(&tok),
            "space" => self.parse_space(&tok),
            "db" => self.parse_data(&tok, 1),
            "dh" => self.parse_data(&tok, 2),
            "dw" => self.parse_data(&tok, 4),
            "dd" => self.parse_data(&tok, 8),
            _ => Err(self.error(tok.line, tok.column, format!("unknown directive `{}`", tok.raw))),
        }
    }

    fn parse_single_label_directive(
        &mut self,
        tok: &Token,
        build: impl Fn(String, u32, u32) -> Item,
    ) -> Result<Item, Diagnostic> {
        let label_tok = self.expect_kind(TokenKind::Label, "expected a label name")?;
        Ok(build(label_tok.text.clone(), tok.line, tok.column))
    }

    fn parse_section(&mut self, tok: &Token) -> Result<Item, Diagnostic> {
        let kw = self.expect_kind(TokenKind::Keyword, "expected `.text` or `.data`")?;
        let kind = match kw.text.to_ascii_lowercase().as_str() {
            ".text" => SectionKind::Text,
            ".data" => SectionKind::Data,
            _ => return Err(self.error(kw.line, kw.column, format!("expected `.text` or `.data`, found `{}`", kw.raw))),
        };
        Ok(Item::Section {
            kind,
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_space(&mut self, tok: &Token) -> Result<Item, Diagnostic> {
        let num_tok = self.expect_kind(TokenKind::Number, "expected a byte count")?;
        let parsed = parse_number_literal(&num_tok.raw).map_err(|e| self.error(num_tok.line, num_tok.column, e))?;
        if parsed.value < 0 {
            return Err(self.error(num_tok.line, num_tok.column, "space count cannot be negative"));
        }
        Ok(Item::Space {
            count: parsed.value as u32,
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_numeric_value(&mut self, width: u8) -> Result<u64, Diagnostic> {
        let tok = self.expect_kind(TokenKind::Number, "expected a numeric literal")?;
        let parsed = parse_number_literal(&tok.raw).map_err(|e| self.error(tok.line, tok.column, e))?;
        let bits = (width as u32) * 8;
        let value = parsed.value as u64;
        let masked = if bits >= 64 { value } else { value & ((1u64 << bits) - 1) };
        Ok(masked)
    }

    fn parse_data(&mut self, tok: &Token, width: u8) -> Result<Item, Diagnostic> {
        if width == 1 {
            if let Some(t) = self.peek() {
                if t.kind == TokenKind::String {
                    let string_tok = self.advance().unwrap();
                    let bytes = decode_string_literal(&string_tok.raw)
                        .map_err(|e| self.error(string_tok.line, string_tok.column, e))?;
                    return Ok(Item::Data {
                        width,
                        values: vec![DataValue::Bytes(bytes)],
                        line: tok.line,
                        column: tok.column,
                    });
                }
            }
        }

        let mut values = Vec::new();
        loop {
            let value_tok = self
                .peek()
                .cloned()
                .ok_or_else(|| self.error(tok.line, tok.column, "expected a literal"))?;
            if width == 4 && value_tok.kind == TokenKind::Label {
                self.advance();
                values.push(DataValue::Address(Some(value_tok.text.clone())));
            } else if width == 4 && value_tok.kind == TokenKind::Keyword && value_tok.raw == "$" {
                self.advance();
                values.push(DataValue::Address(None));
            } else {
                let n = self.parse_numeric_value(width)?;
                values.push(DataValue::Int(n));
            }

            match self.peek() {
                Some(t) if t.kind == TokenKind::Comma => {
                    self.advance();
                }
                _ => break,
            }
        }
        Ok(Item::Data {
            width,
            values,
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_register_or_immediate(&mut self, bits: u32) -> Result<Operand, Diagnostic> {
        let tok = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error(0, 0, "expected a register or immediate"))?;
        match tok.kind {
            TokenKind::Register => {
                self.advance();
                let r = register_index(&tok.text.to_ascii_lowercase())
                    .ok_or_else(|| self.error(tok.line, tok.column, format!("`{}` is not a general-purpose register", tok.raw)))?;
                Ok(Operand::Register(r))
            }
            TokenKind::Number => {
                self.advance();
                let parsed = parse_number_literal(&tok.raw).map_err(|e| self.error(tok.line, tok.column, e))?;
                let value = validate_immediate(parsed, bits).map_err(|e| self.error(tok.line, tok.column, e.to_owned()))?;
                Ok(Operand::Immediate(value))
            }
            _ => Err(self.error(tok.line, tok.column, format!("expected a register or immediate, found `{}`", tok.raw))),
        }
    }

    fn parse_d3(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        let op = data_op(&tok.text.to_ascii_lowercase())
            .ok_or_else(|| self.error(tok.line, tok.column, format!("unknown instruction `{}`", tok.raw)))?;
        let rd = self.expect_register()?;
        self.expect_comma()?;
        let rn = self.expect_register()?;
        self.expect_comma()?;
        let operand = self.parse_register_or_immediate(dp_operand_width(op))?;
        Ok(Item::D3 {
            op,
            condition: tok.condition,
            update_status: tok.update_status,
            rd,
            rn,
            operand,
            line: tok.line,
            column: tok.column,
        })
    }

    /// `SRL`/`SRS` are lexed as `D2_INSTR` (§4.1's table groups them there)
    /// but their statement shape is single-operand, matching their 20-bit
    /// operand field: see `m20_isa::dp_operand_width`. `st`/`sv` are
    /// accepted only here, encoded as register fields 0 and 1 (§4.2).
    fn parse_status_register_statement(&mut self, op: DataOp, tok: &Token) -> Result<Item, Diagnostic> {
        let operand_tok = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error(tok.line, tok.column, format!("`{}` requires an operand", tok.raw)))?;
        let operand = match operand_tok.kind {
            TokenKind::Register => {
                self.advance();
                let lower = operand_tok.text.to_ascii_lowercase();
                let r = match lower.as_str() {
                    "sv" => 1,
                    "st" => 0,
                    _ => register_index(&lower).ok_or_else(|| {
                        self.error(operand_tok.line, operand_tok.column, format!("`{}` is not a valid operand for `{}`", operand_tok.raw, tok.raw))
                    })?,
                };
                Operand::Register(r)
            }
            TokenKind::Number => {
                self.advance();
                let parsed = parse_number_literal(&operand_tok.raw).map_err(|e| self.error(operand_tok.line, operand_tok.column, e))?;
                let value = validate_immediate(parsed, dp_operand_width(op))
                    .map_err(|e| self.error(operand_tok.line, operand_tok.column, e.to_owned()))?;
                Operand::Immediate(value)
            }
            _ => {
                return Err(self.error(
                    operand_tok.line,
                    operand_tok.column,
                    format!("expected an operand, found `{}`", operand_tok.raw),
                ))
            }
        };
        Ok(Item::D1 {
            op,
            condition: tok.condition,
            operand: Some(operand),
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_d2(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        let op = data_op(&tok.text.to_ascii_lowercase())
            .ok_or_else(|| self.error(tok.line, tok.column, format!("unknown instruction `{}`", tok.raw)))?;

        if matches!(op, DataOp::Srl | DataOp::Srs) {
            return self.parse_status_register_statement(op, &tok);
        }

        let rd = self.expect_register()?;
        self.expect_comma()?;
        let bits = dp_operand_width(op);
        let operand_tok = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error(tok.line, tok.column, "expected an operand"))?;
        let operand = match operand_tok.kind {
            TokenKind::Register => {
                self.advance();
                let r = register_index(&operand_tok.text.to_ascii_lowercase()).ok_or_else(|| {
                    self.error(operand_tok.line, operand_tok.column, format!("`{}` is not a general-purpose register", operand_tok.raw))
                })?;
                D2Operand::Register(r)
            }
            TokenKind::Number => {
                self.advance();
                let parsed = parse_number_literal(&operand_tok.raw).map_err(|e| self.error(operand_tok.line, operand_tok.column, e))?;
                let value = validate_immediate(parsed, bits).map_err(|e| self.error(operand_tok.line, operand_tok.column, e.to_owned()))?;
                D2Operand::Immediate(value)
            }
            TokenKind::Label if matches!(op, DataOp::Mov | DataOp::Mvn) => {
                self.advance();
                D2Operand::Label(operand_tok.text.clone())
            }
            _ => {
                return Err(self.error(
                    operand_tok.line,
                    operand_tok.column,
                    format!("expected an operand, found `{}`", operand_tok.raw),
                ))
            }
        };
        Ok(Item::D2 {
            op,
            condition: tok.condition,
            update_status: tok.update_status,
            rd,
            operand,
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_d1(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        let op = data_op(&tok.text.to_ascii_lowercase())
            .ok_or_else(|| self.error(tok.line, tok.column, format!("unknown instruction `{}`", tok.raw)))?;
        let operand = match self.peek().cloned() {
            Some(t) if t.kind == TokenKind::Register => {
                self.advance();
                let r = register_index(&t.text.to_ascii_lowercase())
                    .ok_or_else(|| self.error(t.line, t.column, format!("`{}` is not a general-purpose register", t.raw)))?;
                Some(Operand::Register(r))
            }
            Some(t) if t.kind == TokenKind::Number => {
                if op == DataOp::Pop {
                    return Err(self.error(t.line, t.column, "`pop` does not accept an immediate operand"));
                }
                self.advance();
                let parsed = parse_number_literal(&t.raw).map_err(|e| self.error(t.line, t.column, e))?;
                let value = validate_immediate(parsed, dp_operand_width(op)).map_err(|e| self.error(t.line, t.column, e.to_owned()))?;
                Some(Operand::Immediate(value))
            }
            _ => None,
        };
        let operand = operand.ok_or_else(|| self.error(tok.line, tok.column, format!("`{}` requires an operand", tok.raw)))?;
        Ok(Item::D1 {
            op,
            condition: tok.condition,
            operand: Some(operand),
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_empty(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        let op = data_op(&tok.text.to_ascii_lowercase())
            .ok_or_else(|| self.error(tok.line, tok.column, format!("unknown instruction `{}`", tok.raw)))?;
        Ok(Item::Empty {
            op,
            condition: tok.condition,
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_mem(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        let op = load_store_op(&tok.text.to_ascii_lowercase())
            .ok_or_else(|| self.error(tok.line, tok.column, format!("unknown instruction `{}`", tok.raw)))?;
        let rd = self.expect_register()?;
        self.expect_comma()?;
        let mode = self.parse_addressing_mode()?;
        Ok(Item::Mem {
            op,
            condition: tok.condition,
            rd,
            mode,
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_addressing_mode(&mut self) -> Result<AddressingMode, Diagnostic> {
        let first = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error(0, 0, "expected an addressing mode"))?;
        match first.kind {
            TokenKind::Register => {
                self.advance();
                let base = register_index(&first.text.to_ascii_lowercase())
                    .ok_or_else(|| self.error(first.line, first.column, format!("`{}` is not a general-purpose register", first.raw)))?;
                if let Some(t) = self.peek() {
                    if t.kind == TokenKind::Comma {
                        self.advance();
                        let second = self
                            .peek()
                            .cloned()
                            .ok_or_else(|| self.error(first.line, first.column, "expected a register, immediate, or label"))?;
                        return match second.kind {
                            TokenKind::Register => {
                                self.advance();
                                let r = register_index(&second.text.to_ascii_lowercase()).ok_or_else(|| {
                                    self.error(second.line, second.column, format!("`{}` is not a general-purpose register", second.raw))
                                })?;
                                Ok(AddressingMode::BaseIndex(base, r))
                            }
                            TokenKind::Number => {
                                self.advance();
                                let parsed = parse_number_literal(&second.raw).map_err(|e| self.error(second.line, second.column, e))?;
                                let value = validate_immediate(parsed, 12).map_err(|e| self.error(second.line, second.column, e.to_owned()))?;
                                Ok(AddressingMode::BaseImmediate(base, value))
                            }
                            TokenKind::Label => {
                                self.advance();
                                Ok(AddressingMode::BaseLabel(base, second.text.clone()))
                            }
                            _ => Err(self.error(
                                second.line,
                                second.column,
                                format!("expected a register, immediate, or label, found `{}`", second.raw),
                            )),
                        };
                    }
                }
                Ok(AddressingMode::BaseOnly(base))
            }
            TokenKind::Number => {
                self.advance();
                let parsed = parse_number_literal(&first.raw).map_err(|e| self.error(first.line, first.column, e))?;
                let value = validate_immediate(parsed, 16).map_err(|e| self.error(first.line, first.column, e.to_owned()))?;
                Ok(AddressingMode::PcImmediate(value))
            }
            TokenKind::Label => {
                self.advance();
                Ok(AddressingMode::PcLabel(first.text.clone()))
            }
            _ => Err(self.error(first.line, first.column, format!("expected an addressing mode, found `{}`", first.raw))),
        }
    }

    fn parse_instruction_kind(&mut self) -> Result<Item, Diagnostic> {
        let tok = self.advance().unwrap();
        match tok.text.to_ascii_lowercase().as_str() {
            "b" => self.parse_branch(&tok, false),
            "bwl" => self.parse_branch(&tok, true),
            "swi" => self.parse_swi(&tok),
            _ => Err(self.error(tok.line, tok.column, format!("unknown instruction `{}`", tok.raw))),
        }
    }

    fn parse_branch(&mut self, tok: &Token, link: bool) -> Result<Item, Diagnostic> {
        let target_tok = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error(tok.line, tok.column, "expected a branch target"))?;
        let target = match target_tok.kind {
            TokenKind::Number => {
                self.advance();
                let parsed = parse_number_literal(&target_tok.raw).map_err(|e| self.error(target_tok.line, target_tok.column, e))?;
                let value = validate_immediate(parsed, 16).map_err(|e| self.error(target_tok.line, target_tok.column, e.to_owned()))?;
                BranchTarget::Absolute(value)
            }
            TokenKind::Label => {
                self.advance();
                BranchTarget::Label(target_tok.text.clone())
            }
            TokenKind::Register => {
                self.advance();
                let r = register_index(&target_tok.text.to_ascii_lowercase()).ok_or_else(|| {
                    self.error(target_tok.line, target_tok.column, format!("`{}` is not a general-purpose register", target_tok.raw))
                })?;
                BranchTarget::Register(r)
            }
            _ => return Err(self.error(target_tok.line, target_tok.column, format!("expected a branch target, found `{}`", target_tok.raw))),
        };
        Ok(Item::Branch {
            link,
            condition: tok.condition,
            target,
            line: tok.line,
            column: tok.column,
        })
    }

    fn parse_swi(&mut self, tok: &Token) -> Result<Item, Diagnostic> {
        let num_tok = self.expect_kind(TokenKind::Number, "expected a vector immediate")?;
        let parsed = parse_number_literal(&num_tok.raw).map_err(|e| self.error(num_tok.line, num_tok.column, e))?;
        let value = validate_immediate(parsed, 24).map_err(|e| self.error(num_tok.line, num_tok.column, e.to_owned()))?;
        Ok(Item::Swi {
            condition: tok.condition,
            immediate: value,
            line: tok.line,
            column: tok.column,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;
    use m20_isa::Condition;

    fn parse_source(source: &str) -> (Vec<Item>, Vec<Diagnostic>) {
        let (tokens, lex_diags) = Lexer::new(source).tokenize();
        assert!(lex_diags.is_empty(), "lexer diagnostics: {:?}", lex_diags);
        parse(tokens)
    }

    #[test]
    fn s1_scenario_parses_cleanly() {
        let (items, diags) = parse_source("section .text\nentry main\nmain: mov r0, #5\nhalt\n");
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(items.len(), 5);
        assert!(matches!(items[0], Item::Section { kind: SectionKind::Text, .. }));
        assert!(matches!(items[1], Item::Entry { .. }));
        match &items[2] {
            Item::LabelDef { name, .. } => assert_eq!(name, "main"),
            other => panic!("expected LabelDef, got {:?}", other),
        }
        assert!(matches!(items[3], Item::D2 { op: DataOp::Mov, .. }));
        match &items[4] {
            Item::Empty { op, .. } => assert_eq!(*op, DataOp::Halt),
            other => panic!("expected Empty, got {:?}", other),
        }
    }

    #[test]
    fn d3_instruction_with_condition_and_status() {
        let (items, diags) = parse_source("addeq.s r0, r1, r2\n");
        assert!(diags.is_empty());
        match &items[0] {
            Item::D3 {
                op,
                condition,
                update_status,
                rd,
                rn,
                operand,
                ..
            } => {
                assert_eq!(*op, DataOp::Add);
                assert_eq!(*condition, Condition::Eq);
                assert!(update_status);
                assert_eq!(*rd, 0);
                assert_eq!(*rn, 1);
                assert_eq!(*operand, Operand::Register(2));
            }
            other => panic!("expected D3, got {:?}", other),
        }
    }

    #[test]
    fn mov_accepts_label_operand() {
        let (items, diags) = parse_source("mov r0, target\n");
        assert!(diags.is_empty());
        match &items[0] {
            Item::D2 { operand, .. } => assert_eq!(*operand, D2Operand::Label("target".to_owned())),
            other => panic!("expected D2, got {:?}", other),
        }
    }

    #[test]
    fn mem_instruction_addressing_modes() {
        let (items, diags) = parse_source("ldr r0, r1\nldr r2, r3, r4\nldrh r6, #16\nldr r7, label\n");
        assert!(diags.is_empty(), "{:?}", diags);
        match &items[0] {
            Item::Mem { mode, .. } => assert_eq!(*mode, AddressingMode::BaseOnly(1)),
            other => panic!("expected Mem, got {:?}", other),
        }
        match &items[1] {
            Item::Mem { mode, .. } => assert_eq!(*mode, AddressingMode::BaseIndex(3, 4)),
            other => panic!("expected Mem, got {:?}", other),
        }
        match &items[2] {
            Item::Mem { mode, .. } => assert_eq!(*mode, AddressingMode::PcImmediate(16)),
            other => panic!("expected Mem, got {:?}", other),
        }
        match &items[3] {
            Item::Mem { mode, .. } => assert_eq!(*mode, AddressingMode::PcLabel("label".to_owned())),
            other => panic!("expected Mem, got {:?}", other),
        }
    }

    #[test]
    fn base_offset_and_base_label_modes() {
        let (items, diags) = parse_source("ldr r4, sp, #4\nstrb r5, sp, label\n");
        assert!(diags.is_empty(), "{:?}", diags);
        match &items[0] {
            Item::Mem { mode, .. } => assert_eq!(*mode, AddressingMode::BaseImmediate(13, 4)),
            other => panic!("expected Mem, got {:?}", other),
        }
        match &items[1] {
            Item::Mem { mode, .. } => assert_eq!(*mode, AddressingMode::BaseLabel(13, "label".to_owned())),
            other => panic!("expected Mem, got {:?}", other),
        }
    }

    #[test]
    fn pop_rejects_immediate_operand() {
        let (_, diags) = parse_source("pop #1\n");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn srl_accepts_sv_as_special_operand() {
        let (items, diags) = parse_source("srl r0, sv\n");
        assert!(diags.is_empty(), "{:?}", diags);
        match &items[0] {
            Item::D1 { op, operand, .. } => {
                assert_eq!(*op, DataOp::Srl);
                assert_eq!(*operand, Some(Operand::Register(1)));
            }
            other => panic!("expected D1, got {:?}", other),
        }
    }

    #[test]
    fn db_string_literal_decodes_escapes() {
        let (items, diags) = parse_source("db \"a\\nb\"\n");
        assert!(diags.is_empty(), "{:?}", diags);
        match &items[0] {
            Item::Data { values, .. } => assert_eq!(values[0], DataValue::Bytes(vec![b'a', b'\n', b'b'])),
            other => panic!("expected Data, got {:?}", other),
        }
    }

    #[test]
    fn db_reserved_hex_escape_is_a_diagnostic_not_a_panic() {
        let (_, diags) = parse_source("db \"\\x41\"\n");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn bad_statement_is_recovered_and_following_statement_still_parses() {
        let (tokens, _lex_diags) = Lexer::new("@ halt\n").tokenize();
        let (items, diags) = parse(tokens);
        assert_eq!(diags.len(), 1);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Item::Empty { .. }));
    }

    #[test]
    fn out_of_range_immediate_is_a_syntax_error() {
        let (_, diags) = parse_source("mov r0, 0x1FFFF\n");
        assert_eq!(diags.len(), 1);
    }
}
