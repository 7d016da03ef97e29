use std::io::{Read, Seek};

use byteorder::{BigEndian, ReadBytesExt};

use super::{
    atom::{AtomReader, FourCC},
    error::{Error, Result},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentHeader {
    pub sequence_number: u32,
}

impl FragmentHeader {
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let _version_and_flags = reader.read_u32::<BigEndian>()?;
        Ok(Self {
            sequence_number: reader.read_u32::<BigEndian>()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFragmentHeader {
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl TrackFragmentHeader {
    pub const BASE_DATA_OFFSET_PRESENT: u32 = 0x000001;
    pub const SAMPLE_DESCRIPTION_INDEX_PRESENT: u32 = 0x000002;
    pub const DEFAULT_SAMPLE_DURATION_PRESENT: u32 = 0x000008;
    pub const DEFAULT_SAMPLE_SIZE_PRESENT: u32 = 0x000010;
    pub const DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x000020;
    pub const DURATION_IS_EMPTY: u32 = 0x010000;
    pub const DEFAULT_BASE_IS_MOOF: u32 = 0x020000;

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let _version = reader.read_u8()?;
        let flags = reader.read_u24::<BigEndian>()?;
        let track_id = reader.read_u32::<BigEndian>()?;
        let base_data_offset = match flags & Self::BASE_DATA_OFFSET_PRESENT {
            0 => None,
            _ => Some(reader.read_u64::<BigEndian>()?),
        };
        let mut optional = |flag: u32| -> Result<Option<u32>> {
            Ok(match flags & flag {
                0 => None,
                _ => Some(reader.read_u32::<BigEndian>()?),
            })
        };
        Ok(Self {
            flags,
            track_id,
            base_data_offset,
            sample_description_index: optional(Self::SAMPLE_DESCRIPTION_INDEX_PRESENT)?,
            default_sample_duration: optional(Self::DEFAULT_SAMPLE_DURATION_PRESENT)?,
            default_sample_size: optional(Self::DEFAULT_SAMPLE_SIZE_PRESENT)?,
            default_sample_flags: optional(Self::DEFAULT_SAMPLE_FLAGS_PRESENT)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFragmentDecodeTime {
    pub version: u8,
    pub base_media_decode_time: u64,
}

impl TrackFragmentDecodeTime {
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let version = reader.read_u8()?;
        let _flags = reader.read_u24::<BigEndian>()?;
        Ok(Self {
            version,
            base_media_decode_time: match version {
                1 => reader.read_u64::<BigEndian>()?,
                _ => reader.read_u32::<BigEndian>()? as u64,
            },
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackFragmentRunSample {
    pub duration: Option<u32>,
    pub size: Option<u32>,
    pub flags: Option<u32>,
    pub composition_time_offset: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFragmentRun {
    pub version: u8,
    pub flags: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub samples: Vec<TrackFragmentRunSample>,
}

impl TrackFragmentRun {
    pub const DATA_OFFSET_PRESENT: u32 = 0x000001;
    pub const FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x000004;
    pub const SAMPLE_DURATION_PRESENT: u32 = 0x000100;
    pub const SAMPLE_SIZE_PRESENT: u32 = 0x000200;
    pub const SAMPLE_FLAGS_PRESENT: u32 = 0x000400;
    pub const SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT: u32 = 0x000800;

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let version = reader.read_u8()?;
        let flags = reader.read_u24::<BigEndian>()?;
        let sample_count = reader.read_u32::<BigEndian>()?;
        let data_offset = match flags & Self::DATA_OFFSET_PRESENT {
            0 => None,
            _ => Some(reader.read_i32::<BigEndian>()?),
        };
        let first_sample_flags = match flags & Self::FIRST_SAMPLE_FLAGS_PRESENT {
            0 => None,
            _ => Some(reader.read_u32::<BigEndian>()?),
        };

        let mut samples = Vec::new();
        for _ in 0..sample_count {
            let mut sample = TrackFragmentRunSample::default();
            if flags & Self::SAMPLE_DURATION_PRESENT != 0 {
                sample.duration = Some(reader.read_u32::<BigEndian>()?);
            }
            if flags & Self::SAMPLE_SIZE_PRESENT != 0 {
                sample.size = Some(reader.read_u32::<BigEndian>()?);
            }
            if flags & Self::SAMPLE_FLAGS_PRESENT != 0 {
                sample.flags = Some(reader.read_u32::<BigEndian>()?);
            }
            if flags & Self::SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT != 0 {
                // version 0 offsets are unsigned, but nothing sensible exceeds i32::MAX
                sample.composition_time_offset = Some(reader.read_i32::<BigEndian>()?);
            }
            samples.push(sample);
        }

        Ok(Self {
            version,
            flags,
            data_offset,
            first_sample_flags,
            samples,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFragment {
    pub header: TrackFragmentHeader,
    pub decode_time: Option<TrackFragmentDecodeTime>,
    pub runs: Vec<TrackFragmentRun>,
}

impl TrackFragment {
    pub fn read<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut header = None;
        let mut decode_time = None;
        let mut runs = Vec::new();
        for atom in AtomReader::new(&mut reader).collect::<std::io::Result<Vec<_>>>()? {
            match atom.typ {
                FourCC::TFHD => header = Some(TrackFragmentHeader::read(atom.data(&mut reader))?),
                FourCC::TFDT => decode_time = Some(TrackFragmentDecodeTime::read(atom.data(&mut reader))?),
                FourCC::TRUN => runs.push(TrackFragmentRun::read(atom.data(&mut reader))?),
                _ => {}
            }
        }
        Ok(Self {
            header: header.ok_or(Error::MalformedFile("traf missing tfhd"))?,
            decode_time,
            runs,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.runs.iter().map(|run| run.samples.len()).sum()
    }
}

/// The parsed contents of a `moof` atom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovieFragment {
    pub header: FragmentHeader,
    pub track_fragments: Vec<TrackFragment>,
}

impl MovieFragment {
    /// Reads a movie fragment from a reader positioned at the start of the `moof` atom's data.
    pub fn read<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut header = None;
        let mut track_fragments = Vec::new();
        for atom in AtomReader::new(&mut reader).collect::<std::io::Result<Vec<_>>>()? {
            match atom.typ {
                FourCC::MFHD => header = Some(FragmentHeader::read(atom.data(&mut reader))?),
                FourCC::TRAF => track_fragments.push(TrackFragment::read(atom.data(&mut reader))?),
                _ => {}
            }
        }
        Ok(Self {
            header: header.ok_or(Error::MalformedFile("moof missing mfhd"))?,
            track_fragments,
        })
    }
}
