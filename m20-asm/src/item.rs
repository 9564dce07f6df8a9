use m20_isa::{Condition, DataOp, LoadStoreOp};

/// `.text` or `.data`, per §3's `Section` entity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionKind {
    Text,
    Data,
}

/// A resolved operand: either a register index (0..15) or an already
/// bit-validated immediate.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Register(u8),
    Immediate(u32),
}

/// The fifth `D2_INSTR` operand shape (`MOV`/`MVN` additionally accept a
/// label): kept separate from `Operand` so non-MOV/MVN two-operand forms
/// can't accidentally carry a label.
#[derive(Clone, Debug, PartialEq)]
pub enum D2Operand {
    Register(u8),
    Immediate(u32),
    Label(String),
}

/// The six `MEM_INSTR` addressing modes (§4.2).
#[derive(Clone, Debug, PartialEq)]
pub enum AddressingMode {
    /// `rm` — base register, implicit zero offset.
    BaseOnly(u8),
    /// `rn, rm` — base register plus register index.
    BaseIndex(u8, u8),
    /// `rn, #imm12` — base register plus signed 12-bit offset.
    BaseImmediate(u8, u32),
    /// `rn, <label>` — base register plus label-derived offset.
    BaseLabel(u8, String),
    /// `#imm16` — PC-relative, immediate form.
    PcImmediate(u32),
    /// `<label>` — PC-relative, label form.
    PcLabel(String),
}

/// A branch's target, per the three `B`/`BWL` operand forms.
#[derive(Clone, Debug, PartialEq)]
pub enum BranchTarget {
    Absolute(u32),
    Label(String),
    Register(u8),
}

/// One literal inside a `db`/`dh`/`dw`/`dd` directive.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    Int(u64),
    Bytes(Vec<u8>),
    /// `dw`'s label/`$` address-slot form; `None` means `$` ("this
    /// address").
    Address(Option<String>),
}

/// A parsed statement. Flat, not a tree — §4.2 is explicit that the
/// parser produces an ordered list, never an AST.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Global {
        label: String,
        line: u32,
        column: u32,
    },
    Extern {
        label: String,
        line: u32,
        column: u32,
    },
    Entry {
        label: String,
        line: u32,
        column: u32,
    },
    Section {
        kind: SectionKind,
        line: u32,
        column: u32,
    },
    Space {
        count: u32,
        line: u32,
        column: u32,
    },
    Data {
        width: u8,
        values: Vec<DataValue>,
        line: u32,
        column: u32,
    },
    LabelDef {
        name: String,
        line: u32,
        column: u32,
    },
    D3 {
        op: DataOp,
        condition: Condition,
        update_status: bool,
        rd: u8,
        rn: u8,
        operand: Operand,
        line: u32,
        column: u32,
    },
    D2 {
        op: DataOp,
        condition: Condition,
        update_status: bool,
        rd: u8,
        operand: D2Operand,
        line: u32,
        column: u32,
    },
    D1 {
        op: DataOp,
        condition: Condition,
        operand: Option<Operand>,
        line: u32,
        column: u32,
    },
    Empty {
        op: DataOp,
        condition: Condition,
        line: u32,
        column: u32,
    },
    Mem {
        op: LoadStoreOp,
        condition: Condition,
        rd: u8,
        mode: AddressingMode,
        line: u32,
        column: u32,
    },
    Branch {
        link: bool,
        condition: Condition,
        target: BranchTarget,
        line: u32,
        column: u32,
    },
    Swi {
        condition: Condition,
        immediate: u32,
        line: u32,
        column: u32,
    },
}

impl Item {
    pub fn line(&self) -> u32 {
        match self {
            Item::Global { line, .. }
            | Item::Extern { line, .. }
            | Item::Entry { line, .. }
            | Item::Section { line, .. }
            | Item::Space { line, .. }
            | Item::Data { line, .. }
            | Item::LabelDef { line, .. }
            | Item::D3 { line, .. }
            | Item::D2 { line, .. }
            | Item::D1 { line, .. }
            | Item::Empty { line, .. }
            | Item::Mem { line, .. }
            | Item::Branch { line, .. }
            | Item::Swi { line, .. } => *line,
        }
    }
}
