use crate::token::TokenKind;
use m20_isa::{DataOp, LoadStoreOp};

pub const D3_MNEMONICS: &[&str] = &[
    "mul", "add", "adc", "sub", "sbc", "div", "udv", "or", "and", "xor", "nor", "bic", "ror",
    "lsl", "lsr", "asr",
];

pub const D2_MNEMONICS: &[&str] = &["mov", "mvn", "cmp", "cmn", "tst", "teq", "srs", "srl"];

pub const D1_MNEMONICS: &[&str] = &["push", "pop"];

pub const EMPTY_MNEMONICS: &[&str] = &["noop", "halt"];

pub const MEM_MNEMONICS: &[&str] = &[
    "ldrsb", "ldrsh", "ldrb", "ldrh", "ldr", "strb", "strh", "str",
];

pub const INSTRUCTION_MNEMONICS: &[&str] = &["bwl", "b", "swi"];

pub const KEYWORD_WORDS: &[&str] = &["global", "extern", "entry", "section", "db", "dh", "dw", "dd", "space"];

fn is_register_word(word: &str) -> bool {
    matches!(word, "sp" | "lp" | "pc" | "st" | "sv")
        || (word.starts_with('r')
            && word.len() > 1
            && word[1..].chars().all(|c| c.is_ascii_digit())
            && word[1..].parse::<u32>().map_or(false, |n| n <= 12))
}

/// Classifies a bare identifier (condition/`.s` suffixes already stripped)
/// by checking the mnemonic tables in the precedence order of §4.1: an
/// identifier that matches no table is a `Label`.
pub fn classify_word(word: &str) -> TokenKind {
    let lower = word.to_ascii_lowercase();
    if KEYWORD_WORDS.contains(&lower.as_str()) {
        TokenKind::Keyword
    } else if is_register_word(&lower) {
        TokenKind::Register
    } else if D3_MNEMONICS.contains(&lower.as_str()) {
        TokenKind::D3Instr
    } else if D2_MNEMONICS.contains(&lower.as_str()) {
        TokenKind::D2Instr
    } else if D1_MNEMONICS.contains(&lower.as_str()) {
        TokenKind::D1Instr
    } else if EMPTY_MNEMONICS.contains(&lower.as_str()) {
        TokenKind::EmptyInstr
    } else if MEM_MNEMONICS.contains(&lower.as_str()) {
        TokenKind::MemInstr
    } else if INSTRUCTION_MNEMONICS.contains(&lower.as_str()) {
        TokenKind::Instruction
    } else {
        TokenKind::Label
    }
}

/// Resolves a bare mnemonic (D3/D2/D1/empty instruction text) to its
/// `DataOp`. All four statement forms share one opcode space (§4.3).
pub fn data_op(word: &str) -> Option<DataOp> {
    match word {
        "noop" => Some(DataOp::Noop),
        "add" => Some(DataOp::Add),
        "adc" => Some(DataOp::Adc),
        "sub" => Some(DataOp::Sub),
        "sbc" => Some(DataOp::Sbc),
        "mul" => Some(DataOp::Mul),
        "div" => Some(DataOp::Div),
        "udv" => Some(DataOp::Udv),
        "or" => Some(DataOp::Or),
        "and" => Some(DataOp::And),
        "xor" => Some(DataOp::Xor),
        "nor" => Some(DataOp::Nor),
        "bic" => Some(DataOp::Bic),
        "ror" => Some(DataOp::Ror),
        "lsl" => Some(DataOp::Lsl),
        "lsr" => Some(DataOp::Lsr),
        "asr" => Some(DataOp::Asr),
        "mov" => Some(DataOp::Mov),
        "mvn" => Some(DataOp::Mvn),
        "cmp" => Some(DataOp::Cmp),
        "cmn" => Some(DataOp::Cmn),
        "tst" => Some(DataOp::Tst),
        "teq" => Some(DataOp::Teq),
        "push" => Some(DataOp::Push),
        "pop" => Some(DataOp::Pop),
        "srl" => Some(DataOp::Srl),
        "srs" => Some(DataOp::Srs),
        "halt" => Some(DataOp::Halt),
        _ => None,
    }
}

pub fn load_store_op(word: &str) -> Option<LoadStoreOp> {
    match word {
        "ldr" => Some(LoadStoreOp::Ldr),
        "ldrb" => Some(LoadStoreOp::Ldrb),
        "ldrh" => Some(LoadStoreOp::Ldrh),
        "ldrsb" => Some(LoadStoreOp::Ldrsb),
        "ldrsh" => Some(LoadStoreOp::Ldrsh),
        "str" => Some(LoadStoreOp::Str),
        "strb" => Some(LoadStoreOp::Strb),
        "strh" => Some(LoadStoreOp::Strh),
        _ => None,
    }
}

/// Whether `kind` carries a condition/`.s` suffix that the lexer should
/// try to strip.
pub fn is_instruction_kind(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::D3Instr
            | TokenKind::D2Instr
            | TokenKind::D1Instr
            | TokenKind::EmptyInstr
            | TokenKind::MemInstr
            | TokenKind::Instruction
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ldrb_is_mem_not_label() {
        assert_eq!(classify_word("ldrb"), TokenKind::MemInstr);
    }

    #[test]
    fn register_range_is_exact() {
        assert!(is_register_word("r12"));
        assert!(!is_register_word("r13"));
        assert!(is_register_word("sp"));
    }

    #[test]
    fn unknown_word_is_a_label() {
        assert_eq!(classify_word("main_loop"), TokenKind::Label);
    }
}
