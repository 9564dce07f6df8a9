//! Object file (§6.2) and executable image (§6.3) encodings shared by the
//! assembler, the linker, and the simulator.

pub mod error;
pub mod executable;
pub mod object;
pub mod strings;

pub use error::{ObjError, Result};
pub use executable::Executable;
pub use object::{ObjectFile, RelocationEntry, SectionHeader, SymbolEntry, SymbolKind, MAGIC, VERSION};
pub use strings::StringTable;
