use std::io::{self, Read, Write};

/// The flat image the simulator loads: all text-section bytes followed by
/// all data-section bytes, zero-padded to a 4-byte boundary. Unlike the
/// object file, this carries no header at all (§6.3) — deliberately unlike
/// the teacher crate's executable format, which prefixes a small header.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Executable {
    bytes: Vec<u8>,
}

impl Executable {
    pub fn from_sections(text: &[u8], data: &[u8]) -> Executable {
        let mut bytes = Vec::with_capacity(text.len() + data.len());
        bytes.extend_from_slice(text);
        bytes.extend_from_slice(data);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        Executable { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.bytes)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Executable> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        Ok(Executable { bytes })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pads_to_four_bytes() {
        let exe = Executable::from_sections(&[1, 2, 3], &[4, 5]);
        assert_eq!(exe.bytes(), &[1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn exact_multiple_is_unpadded() {
        let exe = Executable::from_sections(&[1, 2, 3, 4], &[5, 6, 7, 8]);
        assert_eq!(exe.bytes().len(), 8);
    }

    #[test]
    fn roundtrip_io() {
        let exe = Executable::from_sections(&[0xAA, 0xBB], &[]);
        let mut out = Vec::new();
        exe.write_to(&mut out).unwrap();
        let read_back = Executable::read_from(&mut &out[..]).unwrap();
        assert_eq!(exe, read_back);
    }
}
