use std::fmt;

/// The five diagnostic categories raised across lexing, parsing and
/// assembly (§9 Diagnostics policy). Kept distinct rather than folded into
/// one "AssemblerError" so the assembler can filter/report them selectively.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiagnosticKind {
    Syntax,
    Directive,
    Section,
    Label,
    Alignment,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, line: u32, column: u32, message: String) -> Diagnostic {
        Diagnostic {
            kind,
            line,
            column,
            message,
        }
    }

    pub fn syntax(line: u32, column: u32, message: String) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Syntax, line, column, message)
    }

    pub fn directive(line: u32, column: u32, message: String) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Directive, line, column, message)
    }

    pub fn section(line: u32, column: u32, message: String) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Section, line, column, message)
    }

    pub fn label(line: u32, column: u32, message: String) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Label, line, column, message)
    }

    pub fn alignment(line: u32, column: u32, message: String) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Alignment, line, column, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Batch error collection only reports one diagnostic per source line
/// (§2 Diagnostics policy) — a malformed statement shouldn't cascade into
/// a wall of downstream complaints about the same line.
pub fn dedup_by_line(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::with_capacity(diagnostics.len());
    for d in diagnostics {
        if seen.insert(d.line) {
            result.push(d);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_format_is_line_column_message() {
        let d = Diagnostic::syntax(3, 7, "bad token".to_owned());
        assert_eq!(d.to_string(), "3:7: bad token");
    }

    #[test]
    fn dedup_keeps_first_diagnostic_per_line() {
        let diags = vec![
            Diagnostic::syntax(1, 1, "a".to_owned()),
            Diagnostic::syntax(1, 5, "b".to_owned()),
            Diagnostic::label(2, 1, "c".to_owned()),
        ];
        let deduped = dedup_by_line(diags);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].message, "a");
    }
}
