//! Linker for M20 object files (§4.4): resolves symbols across several
//! `m20_obj::ObjectFile`s and produces one flat `m20_obj::Executable`.

mod error;
mod linker;

pub use error::{LinkError, Result};
pub use linker::{link, Linker};
