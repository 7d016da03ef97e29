use std::{
    fmt, io,
    io::{Read, Seek, SeekFrom, Write},
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const DINF: FourCC = FourCC(0x64696e66);
    pub const DREF: FourCC = FourCC(0x64726566);
    pub const FTYP: FourCC = FourCC(0x66747970);
    pub const HDLR: FourCC = FourCC(0x68646c72);
    pub const HEV1: FourCC = FourCC(0x68657631);
    pub const HVCC: FourCC = FourCC(0x68766343);
    pub const ISO6: FourCC = FourCC(0x69736f36);
    pub const ISOM: FourCC = FourCC(0x69736f6d);
    pub const MDAT: FourCC = FourCC(0x6d646174);
    pub const MDHD: FourCC = FourCC(0x6d646864);
    pub const MDIA: FourCC = FourCC(0x6d646961);
    pub const MFHD: FourCC = FourCC(0x6d666864);
    pub const MFRA: FourCC = FourCC(0x6d667261);
    pub const MFRO: FourCC = FourCC(0x6d66726f);
    pub const MINF: FourCC = FourCC(0x6d696e66);
    pub const MOOF: FourCC = FourCC(0x6d6f6f66);
    pub const MOOV: FourCC = FourCC(0x6d6f6f76);
    pub const MP41: FourCC = FourCC(0x6d703431);
    pub const MVEX: FourCC = FourCC(0x6d766578);
    pub const MVHD: FourCC = FourCC(0x6d766864);
    pub const STBL: FourCC = FourCC(0x7374626c);
    pub const STCO: FourCC = FourCC(0x7374636f);
    pub const STSC: FourCC = FourCC(0x73747363);
    pub const STSD: FourCC = FourCC(0x73747364);
    pub const STSZ: FourCC = FourCC(0x7374737a);
    pub const STTS: FourCC = FourCC(0x73747473);
    pub const TFDT: FourCC = FourCC(0x74666474);
    pub const TFHD: FourCC = FourCC(0x74666864);
    pub const TFRA: FourCC = FourCC(0x74667261);
    pub const TKHD: FourCC = FourCC(0x746b6864);
    pub const TRAF: FourCC = FourCC(0x74726166);
    pub const TRAK: FourCC = FourCC(0x7472616b);
    pub const TREX: FourCC = FourCC(0x74726578);
    pub const TRUN: FourCC = FourCC(0x7472756e);
    pub const URL: FourCC = FourCC(0x75726c20);
    pub const VIDE: FourCC = FourCC(0x76696465);
    pub const VMHD: FourCC = FourCC(0x766d6864);
}

impl FourCC {
    pub const fn from_bytes(b: [u8; 4]) -> FourCC {
        FourCC(u32::from_be_bytes(b))
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0.to_be_bytes()) {
            Ok(s) => write!(f, "FourCC({:?})", s),
            Err(_) => write!(f, "FourCC({:#010x})", self.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomSize {
    Size(u32),
    ExtendedSize(u64),
}

impl AtomSize {
    pub fn as_u64(&self) -> u64 {
        match self {
            AtomSize::Size(n) => *n as _,
            AtomSize::ExtendedSize(n) => *n,
        }
    }

    pub fn header_size(&self) -> u64 {
        match self {
            AtomSize::Size(_) => 8,
            AtomSize::ExtendedSize(_) => 16,
        }
    }
}

impl From<usize> for AtomSize {
    fn from(s: usize) -> AtomSize {
        if s <= 0xffffffff {
            AtomSize::Size(s as _)
        } else {
            AtomSize::ExtendedSize(s as _)
        }
    }
}

/// A window onto part of an underlying reader. Seeks are relative to the start of the window.
pub struct SectionReader<R: Read + Seek> {
    reader: R,
    begin: u64,
    end: u64,
    position: u64,
}

impl<R: Read + Seek> SectionReader<R> {
    pub fn new(reader: R, offset: u64, len: u64) -> Self {
        Self {
            reader,
            begin: offset,
            end: offset + len,
            position: offset,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }
}

impl<R: Read + Seek> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        let reader = &mut self.reader;
        reader.seek(SeekFrom::Start(self.position))?;
        let n = reader.take(remaining).read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for SectionReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = match pos {
            SeekFrom::Start(n) => self.begin as i128 + n as i128,
            SeekFrom::End(n) => self.end as i128 + n as i128,
            SeekFrom::Current(n) => self.position as i128 + n as i128,
        };
        if position < self.begin as i128 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of section"));
        }
        self.position = position as u64;
        Ok(self.position - self.begin)
    }
}

#[derive(Clone, Debug)]
pub struct Atom {
    pub offset: u64,
    pub typ: FourCC,
    pub size: AtomSize,
}

impl Atom {
    /// Returns a reader over the atom's contents, excluding its header.
    pub fn data<R: Read + Seek>(&self, reader: R) -> SectionReader<R> {
        let header_size = self.size.header_size();
        SectionReader::new(reader, self.offset + header_size, self.size.as_u64().saturating_sub(header_size))
    }

    pub fn read_data<R: Read + Seek>(&self, reader: R) -> io::Result<Vec<u8>> {
        let mut data = self.data(reader);
        let mut buf = Vec::with_capacity(data.remaining() as usize);
        data.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

pub struct AtomReader<R: Read + Seek> {
    offset: Option<u64>,
    reader: R,
}

impl<R: Read + Seek> AtomReader<R> {
    /// Creates a new atom reader with the given reader. Atoms will be read beginning at the
    /// reader's current position.
    pub fn new(reader: R) -> Self {
        Self { offset: None, reader }
    }
}

impl<R: Read + Seek> Iterator for AtomReader<R> {
    type Item = io::Result<Atom>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = match self.reader.seek(match self.offset {
            Some(offset) => SeekFrom::Start(offset),
            None => SeekFrom::Current(0),
        }) {
            Ok(o) => o,
            Err(e) => return Some(Err(e)),
        };
        let mut size = match self.reader.read_u32::<BigEndian>() {
            Ok(n) => AtomSize::Size(n),
            Err(e) => {
                return match e.kind() {
                    io::ErrorKind::UnexpectedEof => None,
                    _ => Some(Err(e)),
                }
            }
        };
        let typ = match self.reader.read_u32::<BigEndian>() {
            Ok(n) => FourCC(n),
            Err(e) => return Some(Err(e)),
        };
        if size.as_u64() == 1 {
            size = match self.reader.read_u64::<BigEndian>() {
                Ok(n) => AtomSize::ExtendedSize(n),
                Err(e) => return Some(Err(e)),
            };
        }
        if size.as_u64() < size.header_size() {
            // a zero size means "to the end of the file", which this writer never produces
            self.offset = Some(u64::MAX);
            return Some(Err(io::Error::new(io::ErrorKind::InvalidData, "invalid atom size")));
        }
        let atom = Atom { typ, size, offset };
        self.offset = Some(offset + atom.size.as_u64());
        Some(Ok(atom))
    }
}

pub trait AtomWriteExt: Write {
    fn write_four_cc(&mut self, four_cc: FourCC) -> io::Result<()> {
        self.write_u32::<BigEndian>(four_cc.0)
    }

    // Writes an atom header of the given type and data size, using the extended form only when the
    // atom would not otherwise fit.
    fn write_atom_header<S: Into<AtomSize>>(&mut self, typ: FourCC, data_size: S) -> io::Result<()> {
        let atom_size = match data_size.into() {
            AtomSize::ExtendedSize(data_size) => AtomSize::ExtendedSize(data_size + 16),
            AtomSize::Size(data_size) if data_size > 0xfffffff7 => AtomSize::ExtendedSize(data_size as u64 + 16),
            AtomSize::Size(data_size) => AtomSize::Size(data_size + 8),
        };
        match atom_size {
            AtomSize::ExtendedSize(size) => {
                self.write_u32::<BigEndian>(1)?;
                self.write_four_cc(typ)?;
                self.write_u64::<BigEndian>(size)
            }
            AtomSize::Size(size) => {
                self.write_u32::<BigEndian>(size)?;
                self.write_four_cc(typ)
            }
        }
    }

    /// Writes the version and flags that begin every full atom.
    fn write_full_atom_version(&mut self, version: u8, flags: u32) -> io::Result<()> {
        self.write_u8(version)?;
        self.write_u24::<BigEndian>(flags)
    }

    /// Buffers the contents produced by `f`, then writes them as a single atom.
    fn write_atom<F>(&mut self, typ: FourCC, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf)?;
        self.write_atom_header(typ, buf.len())?;
        self.write_all(&buf)
    }
}

impl<W: Write> AtomWriteExt for W {}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_and_read_nested_atoms() {
        let mut buf = Vec::new();
        buf.write_atom(FourCC::MOOV, |moov| {
            moov.write_atom(FourCC::MVHD, |mvhd| mvhd.write_full_atom_version(0, 0))?;
            moov.write_atom(FourCC::MVEX, |_| Ok(()))
        })
        .unwrap();
        buf.write_atom(FourCC::MDAT, |mdat| mdat.write_all(&[1, 2, 3])).unwrap();

        let mut cursor = Cursor::new(&buf);
        let atoms: Vec<Atom> = AtomReader::new(&mut cursor).collect::<io::Result<_>>().unwrap();
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].typ, FourCC::MOOV);
        assert_eq!(atoms[0].size, AtomSize::Size(8 + 12 + 8));
        assert_eq!(atoms[1].typ, FourCC::MDAT);
        assert_eq!(atoms[1].offset, 28);
        assert_eq!(atoms[1].read_data(&mut cursor).unwrap(), vec![1, 2, 3]);

        let children: Vec<Atom> = AtomReader::new(atoms[0].data(&mut cursor)).collect::<io::Result<_>>().unwrap();
        assert_eq!(children.iter().map(|a| a.typ).collect::<Vec<_>>(), vec![FourCC::MVHD, FourCC::MVEX]);
        assert_eq!(children[1].offset, 12);
    }

    #[test]
    fn test_extended_size() {
        let mut buf = Vec::new();
        buf.write_atom_header(FourCC::MDAT, AtomSize::ExtendedSize(4)).unwrap();
        buf.extend_from_slice(&[0; 4]);

        let atom = AtomReader::new(Cursor::new(&buf)).next().unwrap().unwrap();
        assert_eq!(atom.size, AtomSize::ExtendedSize(20));
        assert_eq!(atom.read_data(Cursor::new(&buf)).unwrap().len(), 4);
    }

    #[test]
    fn test_invalid_size() {
        let buf = [0, 0, 0, 4, 0x6d, 0x64, 0x61, 0x74];
        let mut reader = AtomReader::new(Cursor::new(&buf));
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn test_four_cc_debug() {
        assert_eq!(format!("{:?}", FourCC::from_bytes(*b"hvcC")), "FourCC(\"hvcC\")");
        assert_eq!(FourCC::from_bytes(*b"hvcC"), FourCC::HVCC);
    }
}
