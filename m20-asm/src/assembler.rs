use crate::diagnostic::{dedup_by_line, Diagnostic};
use crate::item::{AddressingMode, BranchTarget, D2Operand, DataValue, Item, Operand, SectionKind};
use crate::labels::{Label, LabelFixup, LinkLabel, Section};
use m20_isa::layout;
use m20_isa::{compute_immediate, ImmediateError, RelocKind};
use m20_obj::{ObjectFile, RelocationEntry, SectionHeader, SymbolEntry, SymbolKind};
use matches::debug_assert_matches;
use std::collections::HashMap;

/// Consumes a parsed item stream and produces an object file (§4.3). A
/// batch tool: every item is processed even after an earlier one fails, so
/// a single source file yields every diagnostic in one pass.
pub struct Assembler {
    code: Vec<u8>,
    sections: Vec<Section>,
    current_section: Option<usize>,
    labels: HashMap<String, Label>,
    globals: Vec<LinkLabel>,
    externs: Vec<LinkLabel>,
    entry: Option<LinkLabel>,
    fixups: Vec<LabelFixup>,
    diagnostics: Vec<Diagnostic>,
}

pub fn assemble(items: Vec<Item>) -> Result<ObjectFile, Vec<Diagnostic>> {
    Assembler::new().run(items)
}

pub fn assemble_source(source: &str) -> Result<ObjectFile, Vec<Diagnostic>> {
    let (tokens, mut diagnostics) = crate::lexer::Lexer::new(source).tokenize();
    let (items, parse_diagnostics) = crate::parser::parse(tokens);
    diagnostics.extend(parse_diagnostics);
    if !diagnostics.is_empty() {
        return Err(dedup_by_line(diagnostics));
    }
    assemble(items)
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler {
            code: Vec::new(),
            sections: Vec::new(),
            current_section: None,
            labels: HashMap::new(),
            globals: Vec::new(),
            externs: Vec::new(),
            entry: None,
            fixups: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self, items: Vec<Item>) -> Result<ObjectFile, Vec<Diagnostic>> {
        for item in items {
            self.process_item(item);
        }
        if let Some(index) = self.current_section {
            self.sections[index].end = self.code.len() as u32;
        }

        let object = self.resolve();

        if self.diagnostics.is_empty() {
            Ok(object)
        } else {
            Err(dedup_by_line(self.diagnostics))
        }
    }

    fn current_section_kind(&self) -> Option<SectionKind> {
        self.current_section.map(|i| self.sections[i].kind)
    }

    fn push_word(&mut self, word: u32) {
        debug_assert_matches!(self.code.len() % 4, 0);
        self.code.extend_from_slice(&word.to_be_bytes());
    }

    fn require_section(&mut self, line: u32, column: u32, message: &str) -> bool {
        if self.current_section.is_none() {
            self.diagnostics.push(Diagnostic::section(line, column, message.to_owned()));
            false
        } else {
            true
        }
    }

    fn process_item(&mut self, item: Item) {
        match item {
            Item::Global { label, line, column } => self.globals.push(LinkLabel { name: label, line, column }),
            Item::Extern { label, line, column } => self.externs.push(LinkLabel { name: label, line, column }),
            Item::Entry { label, line, column } => {
                if self.entry.is_some() {
                    self.diagnostics.push(Diagnostic::directive(line, column, "only one entry point may be declared".to_owned()));
                } else {
                    self.entry = Some(LinkLabel { name: label, line, column });
                }
            }
            Item::Section { kind, .. } => {
                if let Some(index) = self.current_section {
                    self.sections[index].end = self.code.len() as u32;
                }
                let begin = self.code.len() as u32;
                self.sections.push(Section { kind, begin, end: begin });
                self.current_section = Some(self.sections.len() - 1);
            }
            Item::Space { count, line, column } => {
                if !self.require_section(line, column, "`space` used outside any section") {
                    return;
                }
                if self.current_section_kind() != Some(SectionKind::Data) {
                    self.diagnostics.push(Diagnostic::section(line, column, "`space` is only valid in a `.data` section".to_owned()));
                    return;
                }
                self.code.resize(self.code.len() + count as usize, 0);
            }
            Item::Data { width, values, line, column } => self.process_data(width, values, line, column),
            Item::LabelDef { name, line, column } => {
                if !self.require_section(line, column, "label defined outside any section") {
                    return;
                }
                if self.labels.contains_key(&name) {
                    self.diagnostics.push(Diagnostic::label(line, column, format!("label `{}` is already defined", name)));
                    return;
                }
                self.labels.insert(
                    name.clone(),
                    Label {
                        name,
                        offset: self.code.len() as u32,
                        section_index: self.current_section.unwrap(),
                    },
                );
            }
            Item::D3 { op, condition, update_status, rd, rn, operand, line, column } => {
                if !self.require_instruction_section(line, column) {
                    return;
                }
                if !self.check_alignment(line, column) {
                    return;
                }
                let layout_operand = match operand {
                    Operand::Register(r) => layout::Operand::Reg(r),
                    Operand::Immediate(v) => layout::Operand::Imm(v),
                };
                self.push_word(layout::encode_data(layout::DataWord {
                    condition,
                    update_status,
                    opcode: op,
                    rd,
                    rn,
                    operand: layout_operand,
                }));
            }
            Item::D2 { op, condition, update_status, rd, operand, line, column } => {
                if !self.require_instruction_section(line, column) {
                    return;
                }
                if !self.check_alignment(line, column) {
                    return;
                }
                let offset = self.code.len() as u32;
                match operand {
                    D2Operand::Register(r) => self.push_word(layout::encode_data(layout::DataWord {
                        condition,
                        update_status,
                        opcode: op,
                        rd,
                        rn: 0,
                        operand: layout::Operand::Reg(r),
                    })),
                    D2Operand::Immediate(v) => self.push_word(layout::encode_data(layout::DataWord {
                        condition,
                        update_status,
                        opcode: op,
                        rd,
                        rn: 0,
                        operand: layout::Operand::Imm(v),
                    })),
                    D2Operand::Label(name) => {
                        self.push_word(layout::encode_data(layout::DataWord {
                            condition,
                            update_status,
                            opcode: op,
                            rd,
                            rn: 0,
                            operand: layout::Operand::Imm(0),
                        }));
                        self.fixups.push(LabelFixup {
                            name,
                            offset,
                            kind: RelocKind::D2Label,
                            line,
                            column,
                        });
                    }
                }
            }
            Item::D1 { op, condition, operand, line, column } => {
                if !self.require_instruction_section(line, column) {
                    return;
                }
                if !self.check_alignment(line, column) {
                    return;
                }
                let layout_operand = match operand {
                    Some(Operand::Register(r)) => layout::Operand::Reg(r),
                    Some(Operand::Immediate(v)) => layout::Operand::Imm(v),
                    None => layout::Operand::Reg(0),
                };
                self.push_word(layout::encode_data(layout::DataWord {
                    condition,
                    update_status: false,
                    opcode: op,
                    rd: 0,
                    rn: 0,
                    operand: layout_operand,
                }));
            }
            Item::Empty { op, condition, line, column } => {
                if !self.require_instruction_section(line, column) {
                    return;
                }
                if !self.check_alignment(line, column) {
                    return;
                }
                self.push_word(layout::encode_data(layout::DataWord {
                    condition,
                    update_status: false,
                    opcode: op,
                    rd: 0,
                    rn: 0,
                    operand: layout::Operand::Reg(0),
                }));
            }
            Item::Mem { op, condition, rd, mode, line, column } => {
                if !self.require_instruction_section(line, column) {
                    return;
                }
                if !self.check_alignment(line, column) {
                    return;
                }
                self.process_mem(op, condition, rd, mode, line, column);
            }
            Item::Branch { link, condition, target, line, column } => {
                if !self.require_instruction_section(line, column) {
                    return;
                }
                if !self.check_alignment(line, column) {
                    return;
                }
                self.process_branch(link, condition, target, line, column);
            }
            Item::Swi { condition, immediate, line, column } => {
                if !self.require_instruction_section(line, column) {
                    return;
                }
                if !self.check_alignment(line, column) {
                    return;
                }
                self.push_word(layout::encode_swi(condition, immediate));
            }
        }
    }

    fn require_instruction_section(&mut self, line: u32, column: u32) -> bool {
        if self.current_section_kind() != Some(SectionKind::Text) {
            self.diagnostics.push(Diagnostic::section(line, column, "instructions must appear in a `.text` section".to_owned()));
            false
        } else {
            true
        }
    }

    fn check_alignment(&mut self, line: u32, column: u32) -> bool {
        if self.code.len() % 4 != 0 {
            self.diagnostics.push(Diagnostic::alignment(line, column, "instruction is not 4-byte aligned".to_owned()));
            false
        } else {
            true
        }
    }

    fn process_data(&mut self, width: u8, values: Vec<DataValue>, line: u32, column: u32) {
        if !self.require_section(line, column, "data directive used outside any section") {
            return;
        }

        let total_bytes: usize = values
            .iter()
            .map(|v| match v {
                DataValue::Int(_) => width as usize,
                DataValue::Bytes(b) => b.len(),
                DataValue::Address(_) => 4,
            })
            .sum();

        if self.current_section_kind() == Some(SectionKind::Text) && total_bytes % 4 != 0 {
            self.diagnostics.push(Diagnostic::section(
                line,
                column,
                "Non-aligned data declarations must be in a non-text section".to_owned(),
            ));
            return;
        }

        for value in values {
            match value {
                DataValue::Int(v) => {
                    let bytes = v.to_be_bytes();
                    self.code.extend_from_slice(&bytes[8 - width as usize..]);
                }
                DataValue::Bytes(b) => self.code.extend_from_slice(&b),
                DataValue::Address(label) => {
                    let offset = self.code.len() as u32;
                    self.push_word(0);
                    self.fixups.push(LabelFixup {
                        name: label.unwrap_or_default(),
                        offset,
                        kind: RelocKind::DataAddr,
                        line,
                        column,
                    });
                }
            }
        }
    }

    fn process_mem(&mut self, op: m20_isa::LoadStoreOp, condition: m20_isa::Condition, rd: u8, mode: AddressingMode, line: u32, column: u32) {
        let offset = self.code.len() as u32;
        match mode {
            AddressingMode::BaseOnly(rm) => self.push_word(layout::encode_load_store(layout::LoadStoreWord {
                condition,
                opcode: op,
                has_base: true,
                rd,
                rn: rm,
                operand: layout::Operand::Imm(0),
            })),
            AddressingMode::BaseIndex(rn, rm) => self.push_word(layout::encode_load_store(layout::LoadStoreWord {
                condition,
                opcode: op,
                has_base: true,
                rd,
                rn,
                operand: layout::Operand::Reg(rm),
            })),
            AddressingMode::BaseImmediate(rn, imm) => self.push_word(layout::encode_load_store(layout::LoadStoreWord {
                condition,
                opcode: op,
                has_base: true,
                rd,
                rn,
                operand: layout::Operand::Imm(imm),
            })),
            AddressingMode::BaseLabel(rn, name) => {
                self.push_word(layout::encode_load_store(layout::LoadStoreWord {
                    condition,
                    opcode: op,
                    has_base: true,
                    rd,
                    rn,
                    operand: layout::Operand::Imm(0),
                }));
                self.fixups.push(LabelFixup {
                    name,
                    offset,
                    kind: RelocKind::MBaseOffsetLabel,
                    line,
                    column,
                });
            }
            AddressingMode::PcImmediate(imm) => self.push_word(layout::encode_load_store(layout::LoadStoreWord {
                condition,
                opcode: op,
                has_base: false,
                rd,
                rn: 0,
                operand: layout::Operand::Imm(imm),
            })),
            AddressingMode::PcLabel(name) => {
                self.push_word(layout::encode_load_store(layout::LoadStoreWord {
                    condition,
                    opcode: op,
                    has_base: false,
                    rd,
                    rn: 0,
                    operand: layout::Operand::Imm(0),
                }));
                self.fixups.push(LabelFixup {
                    name,
                    offset,
                    kind: RelocKind::MRelativeLabel,
                    line,
                    column,
                });
            }
        }
    }

    fn process_branch(&mut self, link: bool, condition: m20_isa::Condition, target: BranchTarget, line: u32, column: u32) {
        let offset = self.code.len() as u32;
        match target {
            BranchTarget::Register(r) => self.push_word(layout::encode_branch(layout::BranchWord {
                condition,
                link,
                operand: layout::Operand::Reg(r),
            })),
            BranchTarget::Absolute(v) => self.push_word(layout::encode_branch(layout::BranchWord {
                condition,
                link,
                operand: layout::Operand::Imm(v),
            })),
            BranchTarget::Label(name) => {
                self.push_word(layout::encode_branch(layout::BranchWord {
                    condition,
                    link,
                    operand: layout::Operand::Imm(0),
                }));
                self.fixups.push(LabelFixup {
                    name,
                    offset,
                    kind: RelocKind::BRelativeLabel,
                    line,
                    column,
                });
            }
        }
    }

    fn section_of(&self, offset: u32) -> Option<usize> {
        self.sections.iter().position(|s| offset >= s.begin && offset < s.end)
    }

    fn resolve(&mut self) -> ObjectFile {
        let mut object = ObjectFile::new();
        object.code = std::mem::take(&mut self.code);
        object.sections = self
            .sections
            .iter()
            .map(|s| SectionHeader { text: s.kind == SectionKind::Text, end: s.end })
            .collect();

        for global in self.globals.clone() {
            if self.externs.iter().any(|e| e.name == global.name) {
                self.diagnostics.push(Diagnostic::label(global.line, global.column, format!("`{}` cannot be both global and extern", global.name)));
                continue;
            }
            let label = match self.labels.get(&global.name) {
                Some(l) => l.clone(),
                None => {
                    self.diagnostics.push(Diagnostic::label(global.line, global.column, format!("undefined global `{}`", global.name)));
                    continue;
                }
            };
            let is_entry = self.entry.as_ref().map_or(false, |e| e.name == global.name);
            let kind = if is_entry { SymbolKind::Entry } else { SymbolKind::Defined };
            let string_index = match object.strings.intern(&global.name) {
                Ok(i) => i,
                Err(_) => {
                    self.diagnostics.push(Diagnostic::label(global.line, global.column, "too many labels".to_owned()));
                    continue;
                }
            };
            object.symbols.push(SymbolEntry { kind, address: label.offset, string_index });
        }

        if let Some(entry) = self.entry.clone() {
            let declared_global = self.globals.iter().any(|g| g.name == entry.name);
            if !declared_global && !self.diagnostics.iter().any(|d| d.line == entry.line) {
                if self.labels.contains_key(&entry.name) {
                    let label = self.labels[&entry.name].clone();
                    let string_index = match object.strings.intern(&entry.name) {
                        Ok(i) => i,
                        Err(_) => {
                            self.diagnostics.push(Diagnostic::label(entry.line, entry.column, "too many labels".to_owned()));
                            return object;
                        }
                    };
                    object.symbols.push(SymbolEntry { kind: SymbolKind::Entry, address: label.offset, string_index });
                } else {
                    self.diagnostics.push(Diagnostic::label(entry.line, entry.column, format!("undefined entry point `{}`", entry.name)));
                }
            }
        }

        for extern_label in self.externs.clone() {
            if self.labels.contains_key(&extern_label.name) {
                self.diagnostics.push(Diagnostic::label(
                    extern_label.line,
                    extern_label.column,
                    format!("`{}` is declared extern but defined locally", extern_label.name),
                ));
                continue;
            }
            let string_index = match object.strings.intern(&extern_label.name) {
                Ok(i) => i,
                Err(_) => {
                    self.diagnostics.push(Diagnostic::label(extern_label.line, extern_label.column, "too many labels".to_owned()));
                    continue;
                }
            };
            object.symbols.push(SymbolEntry { kind: SymbolKind::Undefined, address: 0, string_index });
        }

        let mut locals_emitted: HashMap<String, ()> = HashMap::new();
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in fixups {
            self.resolve_fixup(&mut object, fixup, &mut locals_emitted);
        }

        object
    }

    fn resolve_fixup(&mut self, object: &mut ObjectFile, fixup: LabelFixup, locals_emitted: &mut HashMap<String, ()>) {
        if fixup.name.is_empty() {
            let string_index = object.strings.intern("").unwrap();
            object.relocations.push(RelocationEntry { kind: fixup.kind, address: fixup.offset, string_index });
            return;
        }

        if self.externs.iter().any(|e| e.name == fixup.name) {
            let string_index = match object.strings.intern(&fixup.name) {
                Ok(i) => i,
                Err(_) => {
                    self.diagnostics.push(Diagnostic::label(fixup.line, fixup.column, "too many labels".to_owned()));
                    return;
                }
            };
            object.relocations.push(RelocationEntry { kind: fixup.kind, address: fixup.offset, string_index });
            return;
        }

        let label = match self.labels.get(&fixup.name) {
            Some(l) => l.clone(),
            None => {
                self.diagnostics.push(Diagnostic::label(fixup.line, fixup.column, format!("undefined label `{}`", fixup.name)));
                return;
            }
        };

        let fixup_section = self.section_of(fixup.offset);
        if fixup_section == Some(label.section_index) {
            match compute_immediate(fixup.kind, fixup.offset, label.offset) {
                Ok(pattern) => {
                    let bytes = &mut object.code[fixup.offset as usize..fixup.offset as usize + 4];
                    let existing = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    let patched = existing | pattern;
                    bytes.copy_from_slice(&patched.to_be_bytes());
                }
                Err(ImmediateError::NotAligned) => {
                    self.diagnostics.push(Diagnostic::alignment(fixup.line, fixup.column, format!("`{}` is not 4-byte aligned", fixup.name)));
                }
                Err(ImmediateError::OutOfRange) => {
                    self.diagnostics.push(Diagnostic::label(fixup.line, fixup.column, format!("reference to `{}` is out of range", fixup.name)));
                }
            }
            return;
        }

        if locals_emitted.insert(fixup.name.clone(), ()).is_none() {
            let string_index = match object.strings.intern(&fixup.name) {
                Ok(i) => i,
                Err(_) => {
                    self.diagnostics.push(Diagnostic::label(fixup.line, fixup.column, "too many labels".to_owned()));
                    return;
                }
            };
            object.symbols.push(SymbolEntry { kind: SymbolKind::Local, address: label.offset, string_index });
        }
        let string_index = object.strings.intern(&fixup.name).unwrap();
        object.relocations.push(RelocationEntry { kind: fixup.kind, address: fixup.offset, string_index });
    }
}

impl Default for Assembler {
    fn default() -> Assembler {
        Assembler::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn s1_scenario_assembles_to_one_entry_symbol() {
        let object = assemble_source("section .text\nentry main\nmain: mov r0, #5\nhalt\n").unwrap();
        assert_eq!(object.code.len(), 8);
        assert_eq!(object.symbols.len(), 1);
        assert_eq!(object.symbols[0].kind, SymbolKind::Entry);
        assert_eq!(object.symbols[0].address, 0);
        assert_eq!(object.strings.get(object.symbols[0].string_index), Some("main"));
    }

    #[test]
    fn forward_branch_in_same_section_is_patched_in_place() {
        let object = assemble_source("section .text\nentry start\nstart: b skip\nhalt\nskip: halt\n").unwrap();
        assert!(object.relocations.is_empty());
        let word = u32::from_be_bytes([object.code[0], object.code[1], object.code[2], object.code[3]]);
        assert_eq!(word & 0x007F_FFFF, 1);
    }

    #[test]
    fn branch_to_extern_label_emits_relocation() {
        let object = assemble_source("section .text\nextern helper\nentry main\nmain: b helper\nhalt\n").unwrap();
        assert_eq!(object.relocations.len(), 1);
        assert_eq!(object.relocations[0].kind, RelocKind::BRelativeLabel);
        assert_eq!(object.relocations[0].address, 0);
        let undefined = object.symbols.iter().find(|s| s.kind == SymbolKind::Undefined).unwrap();
        assert_eq!(object.strings.get(undefined.string_index), Some("helper"));
    }

    #[test]
    fn undefined_label_reference_is_a_diagnostic_not_a_panic() {
        let diagnostics = assemble_source("section .text\nentry main\nmain: b nowhere\n").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.message.contains("nowhere")));
    }

    #[test]
    fn duplicate_label_definition_is_a_diagnostic() {
        let diagnostics = assemble_source("section .text\nfoo: halt\nfoo: halt\n").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.message.contains("already defined")));
    }

    #[test]
    fn data_directive_in_data_section_produces_symbol_and_bytes() {
        let object = assemble_source("section .data\nglobal count\ncount: db 1, 2, 3\n").unwrap();
        assert_eq!(object.code, vec![1, 2, 3]);
        assert_eq!(object.symbols.len(), 1);
        assert_eq!(object.symbols[0].address, 0);
        assert_eq!(object.strings.get(object.symbols[0].string_index), Some("count"));
    }

    #[test]
    fn unaligned_data_in_text_section_is_rejected() {
        let diagnostics = assemble_source("section .text\ndb 1, 2, 3\n").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.message.contains("non-text")));
    }

    #[test]
    fn global_and_extern_on_same_name_is_a_conflict() {
        let diagnostics = assemble_source("section .text\nglobal foo\nextern foo\nfoo: halt\n").unwrap_err();
        assert!(diagnostics.iter().any(|d| d.message.contains("both global and extern")));
    }
}
