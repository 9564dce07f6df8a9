use crate::error::{ObjError, Result};
use crate::strings::StringTable;
use byteorder::{ReadBytesExt, WriteBytesExt};
use m20_isa::RelocKind;
use std::io::{Read, Write};
use util::Endian;

pub const MAGIC: [u8; 4] = [0x7F, b'M', b'2', b'0'];
pub const VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SectionHeader {
    pub text: bool,
    pub end: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolKind {
    Undefined = 0,
    Defined = 1,
    Local = 2,
    Entry = 3,
}

impl SymbolKind {
    fn from_byte(b: u8) -> Result<SymbolKind> {
        Ok(match b {
            0 => SymbolKind::Undefined,
            1 => SymbolKind::Defined,
            2 => SymbolKind::Local,
            3 => SymbolKind::Entry,
            _ => return Err(ObjError::Truncated),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SymbolEntry {
    pub kind: SymbolKind,
    pub address: u32,
    pub string_index: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RelocationEntry {
    pub kind: RelocKind,
    pub address: u32,
    /// Index into the string table; an empty string at this index means
    /// "self" (§3: "empty name ⇒ self").
    pub string_index: u16,
}

/// The on-disk contract between the assembler and the linker (§6.2).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ObjectFile {
    pub sections: Vec<SectionHeader>,
    pub code: Vec<u8>,
    pub strings: StringTable,
    pub symbols: Vec<SymbolEntry>,
    pub relocations: Vec<RelocationEntry>,
}

impl ObjectFile {
    pub fn new() -> ObjectFile {
        ObjectFile::default()
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let strings_bytes = self.strings.to_bytes();
        let symbol_table_size = self.symbols.len() * 7;
        let reloc_table_size = self.relocations.len() * 7;

        w.write_all(&MAGIC)?;
        w.write_u32::<Endian>(VERSION)?;
        w.write_u32::<Endian>(self.sections.len() as u32)?;
        w.write_u32::<Endian>(self.code.len() as u32)?;
        w.write_u32::<Endian>(strings_bytes.len() as u32)?;
        w.write_u32::<Endian>(symbol_table_size as u32)?;
        w.write_u32::<Endian>(reloc_table_size as u32)?;

        for section in &self.sections {
            w.write_u8(if section.text { 0xFF } else { 0x00 })?;
            w.write_u32::<Endian>(section.end)?;
        }

        w.write_all(&self.code)?;
        w.write_all(&strings_bytes)?;

        for symbol in &self.symbols {
            w.write_u8(symbol.kind as u8)?;
            w.write_u32::<Endian>(symbol.address)?;
            w.write_u16::<Endian>(symbol.string_index)?;
        }

        for reloc in &self.relocations {
            w.write_u8(reloc.kind.to_byte())?;
            w.write_u32::<Endian>(reloc.address)?;
            w.write_u16::<Endian>(reloc.string_index)?;
        }

        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<ObjectFile> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ObjError::BadMagic);
        }

        let version = r.read_u32::<Endian>()?;
        if version != VERSION {
            return Err(ObjError::BadVersion(version));
        }

        let section_count = r.read_u32::<Endian>()? as usize;
        let code_size = r.read_u32::<Endian>()? as usize;
        let string_table_size = r.read_u32::<Endian>()? as usize;
        let symbol_table_size = r.read_u32::<Endian>()? as usize;
        let reloc_table_size = r.read_u32::<Endian>()? as usize;

        let mut sections = Vec::with_capacity(section_count);
        for _ in 0..section_count {
            let flag = r.read_u8()?;
            let end = r.read_u32::<Endian>()?;
            sections.push(SectionHeader {
                text: flag == 0xFF,
                end,
            });
        }

        let mut code = vec![0u8; code_size];
        r.read_exact(&mut code)?;

        let mut string_bytes = vec![0u8; string_table_size];
        r.read_exact(&mut string_bytes)?;
        let strings = StringTable::from_bytes(&string_bytes)?;

        if symbol_table_size % 7 != 0 || reloc_table_size % 7 != 0 {
            return Err(ObjError::Truncated);
        }

        let mut symbols = Vec::with_capacity(symbol_table_size / 7);
        for _ in 0..(symbol_table_size / 7) {
            let kind = SymbolKind::from_byte(r.read_u8()?)?;
            let address = r.read_u32::<Endian>()?;
            let string_index = r.read_u16::<Endian>()?;
            symbols.push(SymbolEntry {
                kind,
                address,
                string_index,
            });
        }

        let mut relocations = Vec::with_capacity(reloc_table_size / 7);
        for _ in 0..(reloc_table_size / 7) {
            let kind_byte = r.read_u8()?;
            let kind = RelocKind::from_byte(kind_byte).ok_or(ObjError::Truncated)?;
            let address = r.read_u32::<Endian>()?;
            let string_index = r.read_u16::<Endian>()?;
            relocations.push(RelocationEntry {
                kind,
                address,
                string_index,
            });
        }

        Ok(ObjectFile {
            sections,
            code,
            strings,
            symbols,
            relocations,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use m20_isa::RelocKind;

    fn sample() -> ObjectFile {
        let mut obj = ObjectFile::new();
        obj.sections.push(SectionHeader { text: true, end: 8 });
        obj.sections.push(SectionHeader { text: false, end: 16 });
        obj.code = vec![0u8; 8];
        let main = obj.strings.intern("main").unwrap();
        obj.symbols.push(SymbolEntry {
            kind: SymbolKind::Entry,
            address: 0,
            string_index: main,
        });
        obj.relocations.push(RelocationEntry {
            kind: RelocKind::BRelativeLabel,
            address: 4,
            string_index: main,
        });
        obj
    }

    #[test]
    fn roundtrip_write_read() {
        let obj = sample();
        let mut bytes = Vec::new();
        obj.write_to(&mut bytes).unwrap();
        let restored = ObjectFile::read_from(&mut &bytes[..]).unwrap();
        assert_eq!(obj, restored);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = vec![0u8; 28];
        bytes[0] = 0x00;
        let err = ObjectFile::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, ObjError::BadMagic));
    }

    #[test]
    fn table_sizes_are_multiples_of_seven() {
        let obj = sample();
        let mut bytes = Vec::new();
        obj.write_to(&mut bytes).unwrap();
        assert_eq!(obj.symbols.len() * 7 % 7, 0);
        assert_eq!(obj.relocations.len() * 7 % 7, 0);
    }
}
