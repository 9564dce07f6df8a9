use crate::error::{LinkError, Result};
use m20_isa::{compute_immediate, ImmediateError};
use m20_obj::{Executable, ObjectFile, SymbolKind};
use std::collections::HashMap;

/// `(is_text, begin, end)` byte range of one section within an object's
/// `code` vector, in source order.
type SectionRange = (bool, u32, u32);

/// Reads several object files in input order and produces one flat
/// executable image (§4.4). Layout is two-pass: every text section is laid
/// out first, in input order, then every data section — so a relocation's
/// target address can only be computed once every section has a final
/// base.
pub struct Linker {
    objects: Vec<ObjectFile>,
}

pub fn link(objects: Vec<ObjectFile>) -> Result<Executable> {
    Linker::new(objects).link()
}

impl Linker {
    pub fn new(objects: Vec<ObjectFile>) -> Linker {
        Linker { objects }
    }

    pub fn link(self) -> Result<Executable> {
        let ranges: Vec<Vec<SectionRange>> = self.objects.iter().map(|o| section_ranges(&o.sections)).collect();
        let mut image_base: Vec<Vec<u32>> = ranges.iter().map(|r| vec![0u32; r.len()]).collect();

        let mut image_text = Vec::new();
        for (oi, obj_ranges) in ranges.iter().enumerate() {
            for (si, &(is_text, begin, end)) in obj_ranges.iter().enumerate() {
                if is_text {
                    image_base[oi][si] = image_text.len() as u32;
                    image_text.extend_from_slice(&self.objects[oi].code[begin as usize..end as usize]);
                }
            }
        }

        let text_len = image_text.len() as u32;
        let mut image_data = Vec::new();
        for (oi, obj_ranges) in ranges.iter().enumerate() {
            for (si, &(is_text, begin, end)) in obj_ranges.iter().enumerate() {
                if !is_text {
                    image_base[oi][si] = text_len + image_data.len() as u32;
                    image_data.extend_from_slice(&self.objects[oi].code[begin as usize..end as usize]);
                }
            }
        }

        let mut globals: HashMap<String, u32> = HashMap::new();
        for (oi, obj) in self.objects.iter().enumerate() {
            for sym in &obj.symbols {
                if matches!(sym.kind, SymbolKind::Defined | SymbolKind::Entry) {
                    let name = symbol_name(obj, sym.string_index);
                    let addr = translate(&ranges[oi], &image_base[oi], sym.address);
                    if globals.contains_key(&name) {
                        return Err(LinkError::DuplicateGlobal(name));
                    }
                    globals.insert(name, addr);
                }
            }
        }

        for obj in &self.objects {
            for sym in &obj.symbols {
                if sym.kind == SymbolKind::Undefined {
                    let name = symbol_name(obj, sym.string_index);
                    if !globals.contains_key(&name) {
                        return Err(LinkError::UndefinedSymbol(name));
                    }
                }
            }
        }

        let mut locals: Vec<HashMap<String, u32>> = Vec::with_capacity(self.objects.len());
        for (oi, obj) in self.objects.iter().enumerate() {
            let mut map = HashMap::new();
            for sym in &obj.symbols {
                if sym.kind == SymbolKind::Local {
                    let name = symbol_name(obj, sym.string_index);
                    map.insert(name, translate(&ranges[oi], &image_base[oi], sym.address));
                }
            }
            locals.push(map);
        }

        for (oi, obj) in self.objects.iter().enumerate() {
            for reloc in &obj.relocations {
                let name = symbol_name(obj, reloc.string_index);
                // A self relocation (blank name) is deliberately left
                // uncomputed at link time (§4.4): the placeholder bits
                // emitted by the assembler pass through unpatched.
                if name.is_empty() {
                    continue;
                }

                let target = locals[oi]
                    .get(&name)
                    .copied()
                    .or_else(|| globals.get(&name).copied())
                    .ok_or_else(|| LinkError::UndefinedSymbol(name.clone()))?;

                let fixup_addr = translate(&ranges[oi], &image_base[oi], reloc.address);
                let pattern = compute_immediate(reloc.kind, fixup_addr, target).map_err(|err| match err {
                    ImmediateError::NotAligned => LinkError::NotAligned(name.clone()),
                    ImmediateError::OutOfRange => LinkError::OutOfRange(name.clone()),
                })?;

                let (bytes, offset) = if fixup_addr < text_len {
                    (&mut image_text, fixup_addr as usize)
                } else {
                    (&mut image_data, (fixup_addr - text_len) as usize)
                };
                let existing = u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
                bytes[offset..offset + 4].copy_from_slice(&(existing | pattern).to_be_bytes());
            }
        }

        Ok(Executable::from_sections(&image_text, &image_data))
    }
}

fn symbol_name(obj: &ObjectFile, string_index: u16) -> String {
    obj.strings.get(string_index).unwrap_or("").to_owned()
}

fn section_ranges(sections: &[m20_obj::SectionHeader]) -> Vec<SectionRange> {
    let mut ranges = Vec::with_capacity(sections.len());
    let mut begin = 0u32;
    for section in sections {
        ranges.push((section.text, begin, section.end));
        begin = section.end;
    }
    ranges
}

/// First section whose end exceeds `address` owns it; an address exactly
/// at the end of the last section (a trailing label with nothing after it)
/// falls back to that last section.
fn section_index_for(ranges: &[SectionRange], address: u32) -> usize {
    for (i, &(_, _, end)) in ranges.iter().enumerate() {
        if address < end {
            return i;
        }
    }
    ranges.len().saturating_sub(1)
}

fn translate(ranges: &[SectionRange], image_base: &[u32], address: u32) -> u32 {
    let index = section_index_for(ranges, address);
    image_base[index] + (address - ranges[index].1)
}

#[cfg(test)]
mod test {
    use super::*;
    use m20_isa::RelocKind;
    use m20_obj::{SectionHeader, SymbolEntry};

    fn make_object(code: Vec<u8>, text_len: u32) -> ObjectFile {
        let mut obj = ObjectFile::new();
        obj.sections.push(SectionHeader { text: true, end: text_len });
        if code.len() as u32 > text_len {
            obj.sections.push(SectionHeader { text: false, end: code.len() as u32 });
        }
        obj.code = code;
        obj
    }

    #[test]
    fn single_object_with_no_relocations_links_unchanged() {
        let obj = make_object(vec![0xAA, 0xBB, 0xCC, 0xDD], 4);
        let exe = link(vec![obj]).unwrap();
        assert_eq!(exe.bytes(), &[0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn text_sections_are_laid_out_before_data_sections_across_objects() {
        let mut a = ObjectFile::new();
        a.sections.push(SectionHeader { text: false, end: 4 });
        a.code = vec![1, 2, 3, 4];

        let mut b = ObjectFile::new();
        b.sections.push(SectionHeader { text: true, end: 4 });
        b.code = vec![5, 6, 7, 8];

        let exe = link(vec![a, b]).unwrap();
        assert_eq!(exe.bytes(), &[5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn cross_file_branch_resolves_against_the_other_files_entry_symbol() {
        let mut caller = ObjectFile::new();
        caller.sections.push(SectionHeader { text: true, end: 4 });
        // condition AL, branch family, immediate bit set, offset field
        // pre-zeroed — what the assembler emits before patching a fixup.
        caller.code = vec![0xEC, 0x80, 0x00, 0x00];
        let helper_name = caller.strings.intern("helper").unwrap();
        caller.relocations.push(m20_obj::RelocationEntry {
            kind: RelocKind::BRelativeLabel,
            address: 0,
            string_index: helper_name,
        });

        let mut callee = ObjectFile::new();
        callee.sections.push(SectionHeader { text: true, end: 4 });
        callee.code = vec![0xE1, 0xF0, 0x00, 0x00];
        let helper_name2 = callee.strings.intern("helper").unwrap();
        callee.symbols.push(SymbolEntry {
            kind: SymbolKind::Entry,
            address: 0,
            string_index: helper_name2,
        });

        let exe = link(vec![caller, callee]).unwrap();
        let word = u32::from_be_bytes([exe.bytes()[0], exe.bytes()[1], exe.bytes()[2], exe.bytes()[3]]);
        // target=4, addr=0, bias -4, /4 => offset 0
        assert_eq!(word & 0x007F_FFFF, 0);
    }

    #[test]
    fn unresolved_extern_is_an_undefined_symbol_error() {
        let mut obj = ObjectFile::new();
        obj.sections.push(SectionHeader { text: true, end: 4 });
        obj.code = vec![0, 0, 0, 0];
        let name = obj.strings.intern("missing").unwrap();
        obj.symbols.push(SymbolEntry { kind: SymbolKind::Undefined, address: 0, string_index: name });

        let err = link(vec![obj]).unwrap_err();
        assert_eq!(err, LinkError::UndefinedSymbol("missing".to_owned()));
    }

    #[test]
    fn duplicate_entry_symbols_across_objects_is_a_link_error() {
        let mut a = ObjectFile::new();
        a.sections.push(SectionHeader { text: true, end: 4 });
        a.code = vec![0, 0, 0, 0];
        let name_a = a.strings.intern("start").unwrap();
        a.symbols.push(SymbolEntry { kind: SymbolKind::Entry, address: 0, string_index: name_a });

        let mut b = ObjectFile::new();
        b.sections.push(SectionHeader { text: true, end: 4 });
        b.code = vec![0, 0, 0, 0];
        let name_b = b.strings.intern("start").unwrap();
        b.symbols.push(SymbolEntry { kind: SymbolKind::Defined, address: 0, string_index: name_b });

        let err = link(vec![a, b]).unwrap_err();
        assert_eq!(err, LinkError::DuplicateGlobal("start".to_owned()));
    }

    #[test]
    fn self_relocation_is_passed_through_uncomputed() {
        let mut obj = ObjectFile::new();
        obj.sections.push(SectionHeader { text: false, end: 4 });
        obj.code = vec![0, 0, 0, 0];
        let blank = obj.strings.intern("").unwrap();
        obj.relocations.push(m20_obj::RelocationEntry {
            kind: RelocKind::DataAddr,
            address: 0,
            string_index: blank,
        });

        let exe = link(vec![obj]).unwrap();
        assert_eq!(exe.bytes(), &[0, 0, 0, 0]);
    }
}
