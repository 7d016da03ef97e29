use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::{
    atom::{AtomWriteExt, FourCC},
    error::{Error, Result},
    fragment::{TrackFragmentHeader, TrackFragmentRun},
    hvcc::HVCDecoderConfigurationRecord,
};

const TRACK_ID: u32 = 1;
const MOVIE_TIMESCALE: u32 = 1000;

// sample_depends_on = 2 (no other sample)
const SYNC_SAMPLE_FLAGS: u32 = 0x02000000;
// sample_depends_on = 1, sample_is_non_sync_sample = 1
const NON_SYNC_SAMPLE_FLAGS: u32 = 0x01010000;

const UNITY_MATRIX: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

/// Describes the single HEVC video track of a fragmented file.
#[derive(Clone, Debug)]
pub struct TrackConfig {
    pub width: u16,
    pub height: u16,
    /// Ticks per second for all sample times.
    pub timescale: u32,
    /// Used for the final sample when no later decode time is known.
    pub default_sample_duration: u32,
    pub decoder_configuration: HVCDecoderConfigurationRecord,
}

/// One access unit. The data holds length-prefixed NAL units matching the decoder
/// configuration's length size.
#[derive(Clone, Debug)]
pub struct Sample {
    pub data: Vec<u8>,
    pub dts: i64,
    pub pts: i64,
    pub is_sync: bool,
}

struct FragmentEntry {
    time: u64,
    moof_offset: u64,
}

/// Writes a fragmented MP4 with an empty `moov`, a new fragment at every sync sample, and each
/// fragment's data offsets relative to its `moof`. A random access index is written on finish.
pub struct FragmentedMp4Writer<W: Write> {
    writer: W,
    position: u64,
    config: Option<TrackConfig>,
    pending: Vec<Sample>,
    last_duration: Option<u32>,
    last_dts: Option<i64>,
    sequence_number: u32,
    fragments: Vec<FragmentEntry>,
    finished: bool,
}

impl<W: Write> FragmentedMp4Writer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            position: 0,
            config: None,
            pending: Vec::new(),
            last_duration: None,
            last_dts: None,
            sequence_number: 0,
            fragments: Vec::new(),
            finished: false,
        }
    }

    /// Total bytes written to the underlying writer so far.
    pub fn bytes_written(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Writes the initialization segment (`ftyp` and `moov`). This must be called exactly once,
    /// before any sample.
    pub fn write_init_segment(&mut self, config: TrackConfig) -> Result<()> {
        if self.config.is_some() {
            return Err(Error::Other("init segment already written"));
        }
        if config.timescale == 0 {
            return Err(Error::Other("timescale must be non-zero"));
        }

        let mut buf = Vec::new();
        buf.write_atom(FourCC::FTYP, |ftyp| {
            ftyp.write_four_cc(FourCC::ISOM)?;
            ftyp.write_u32::<BigEndian>(512)?;
            for brand in [FourCC::ISOM, FourCC::ISO6, FourCC::MP41] {
                ftyp.write_four_cc(brand)?;
            }
            Ok(())
        })?;
        buf.write_atom(FourCC::MOOV, |moov| write_moov(moov, &config))?;
        self.write_all(&buf)?;
        self.config = Some(config);
        Ok(())
    }

    /// Adds a sample. A sync sample closes the pending fragment and begins a new one. Decode
    /// times must strictly increase.
    pub fn write_sample(&mut self, sample: Sample) -> Result<()> {
        if self.config.is_none() {
            return Err(Error::Other("sample written before init segment"));
        }
        if self.finished {
            return Err(Error::Other("sample written after finish"));
        }
        if let Some(last) = self.last_dts {
            if sample.dts <= last {
                return Err(Error::Other("non-monotonic decode time"));
            }
        }
        if sample.dts < 0 {
            return Err(Error::Other("negative decode time"));
        }
        if sample.is_sync && !self.pending.is_empty() {
            self.write_fragment(Some(sample.dts))?;
        }
        self.last_dts = Some(sample.dts);
        self.pending.push(sample);
        Ok(())
    }

    /// Writes any pending fragment followed by the random access index. Returns the total number
    /// of bytes written.
    pub fn finish(&mut self) -> Result<u64> {
        if self.finished {
            return Err(Error::Other("already finished"));
        }
        if self.config.is_none() {
            return Err(Error::Other("finish called before init segment"));
        }
        self.finished = true;
        self.write_fragment(None)?;

        let mut buf = Vec::new();
        buf.write_atom(FourCC::MFRA, |mfra| {
            mfra.write_atom(FourCC::TFRA, |tfra| {
                tfra.write_full_atom_version(1, 0)?;
                tfra.write_u32::<BigEndian>(TRACK_ID)?;
                // one byte each for traf, trun, and sample numbers
                tfra.write_u32::<BigEndian>(0)?;
                tfra.write_u32::<BigEndian>(self.fragments.len() as u32)?;
                for fragment in &self.fragments {
                    tfra.write_u64::<BigEndian>(fragment.time)?;
                    tfra.write_u64::<BigEndian>(fragment.moof_offset)?;
                    tfra.write_all(&[1, 1, 1])?;
                }
                Ok(())
            })?;
            let mfra_size = mfra.len() as u32 + 8 + 16;
            mfra.write_atom(FourCC::MFRO, |mfro| {
                mfro.write_full_atom_version(0, 0)?;
                mfro.write_u32::<BigEndian>(mfra_size)
            })
        })?;
        self.write_all(&buf)?;
        self.writer.flush()?;
        Ok(self.position)
    }

    fn write_fragment(&mut self, next_dts: Option<i64>) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let default_duration = self.config.as_ref().map(|c| c.default_sample_duration).unwrap_or_default();
        let samples = std::mem::take(&mut self.pending);

        let mut durations = Vec::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            let next = samples.get(i + 1).map(|s| s.dts).or(next_dts);
            let duration = match next {
                Some(next) => u32::try_from(next - sample.dts).map_err(|_| Error::Other("sample duration out of range"))?,
                None => self.last_duration.unwrap_or(default_duration),
            };
            self.last_duration = Some(duration);
            durations.push(duration);
        }

        let has_composition_offsets = samples.iter().any(|s| s.pts != s.dts);
        let mut trun_flags = TrackFragmentRun::DATA_OFFSET_PRESENT
            | TrackFragmentRun::SAMPLE_DURATION_PRESENT
            | TrackFragmentRun::SAMPLE_SIZE_PRESENT
            | TrackFragmentRun::SAMPLE_FLAGS_PRESENT;
        if has_composition_offsets {
            trun_flags |= TrackFragmentRun::SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT;
        }

        self.sequence_number += 1;
        let base_media_decode_time = samples[0].dts as u64;
        let sequence_number = self.sequence_number;

        let mut moof = Vec::new();
        let mut data_offset_position = 0;
        moof.write_atom(FourCC::MOOF, |moof| {
            moof.write_atom(FourCC::MFHD, |mfhd| {
                mfhd.write_full_atom_version(0, 0)?;
                mfhd.write_u32::<BigEndian>(sequence_number)
            })?;
            moof.write_atom(FourCC::TRAF, |traf| {
                traf.write_atom(FourCC::TFHD, |tfhd| {
                    tfhd.write_full_atom_version(0, TrackFragmentHeader::DEFAULT_BASE_IS_MOOF)?;
                    tfhd.write_u32::<BigEndian>(TRACK_ID)
                })?;
                traf.write_atom(FourCC::TFDT, |tfdt| {
                    tfdt.write_full_atom_version(1, 0)?;
                    tfdt.write_u64::<BigEndian>(base_media_decode_time)
                })?;
                traf.write_atom(FourCC::TRUN, |trun| {
                    trun.write_full_atom_version(if has_composition_offsets { 1 } else { 0 }, trun_flags)?;
                    trun.write_u32::<BigEndian>(samples.len() as u32)?;
                    // patched once the size of the moof is known
                    data_offset_position = trun.len();
                    trun.write_i32::<BigEndian>(0)?;
                    for (sample, duration) in samples.iter().zip(&durations) {
                        trun.write_u32::<BigEndian>(*duration)?;
                        trun.write_u32::<BigEndian>(sample.data.len() as u32)?;
                        trun.write_u32::<BigEndian>(if sample.is_sync { SYNC_SAMPLE_FLAGS } else { NON_SYNC_SAMPLE_FLAGS })?;
                        if has_composition_offsets {
                            trun.write_i32::<BigEndian>((sample.pts - sample.dts) as i32)?;
                        }
                    }
                    Ok(())
                })
            })
        })?;

        // the trun is the last atom in the moof, so its contents end where the moof ends
        let trun_len = 4 + 4 + 4 + samples.len() * if has_composition_offsets { 16 } else { 12 };
        let data_offset_position = moof.len() - trun_len + data_offset_position;
        let mdat_len: usize = samples.iter().map(|s| s.data.len()).sum();
        let mut mdat_header = Vec::with_capacity(16);
        mdat_header.write_atom_header(FourCC::MDAT, mdat_len)?;

        let data_offset = i32::try_from(moof.len() + mdat_header.len()).map_err(|_| Error::Other("fragment too large"))?;
        moof[data_offset_position..data_offset_position + 4].copy_from_slice(&data_offset.to_be_bytes());

        self.fragments.push(FragmentEntry {
            time: base_media_decode_time,
            moof_offset: self.position,
        });
        self.write_all(&moof)?;
        self.write_all(&mdat_header)?;
        for sample in &samples {
            self.write_all(&sample.data)?;
        }
        Ok(())
    }
}

fn write_moov(moov: &mut Vec<u8>, config: &TrackConfig) -> io::Result<()> {
    moov.write_atom(FourCC::MVHD, |mvhd| {
        mvhd.write_full_atom_version(0, 0)?;
        mvhd.write_u32::<BigEndian>(0)?; // creation_time
        mvhd.write_u32::<BigEndian>(0)?; // modification_time
        mvhd.write_u32::<BigEndian>(MOVIE_TIMESCALE)?;
        mvhd.write_u32::<BigEndian>(0)?; // duration
        mvhd.write_u32::<BigEndian>(0x00010000)?; // rate
        mvhd.write_u16::<BigEndian>(0x0100)?; // volume
        mvhd.write_all(&[0; 10])?;
        for v in UNITY_MATRIX {
            mvhd.write_u32::<BigEndian>(v)?;
        }
        mvhd.write_all(&[0; 24])?;
        mvhd.write_u32::<BigEndian>(TRACK_ID + 1)
    })?;

    moov.write_atom(FourCC::TRAK, |trak| {
        trak.write_atom(FourCC::TKHD, |tkhd| {
            // track_enabled | track_in_movie
            tkhd.write_full_atom_version(0, 3)?;
            tkhd.write_u32::<BigEndian>(0)?;
            tkhd.write_u32::<BigEndian>(0)?;
            tkhd.write_u32::<BigEndian>(TRACK_ID)?;
            tkhd.write_u32::<BigEndian>(0)?;
            tkhd.write_u32::<BigEndian>(0)?; // duration
            tkhd.write_all(&[0; 8])?;
            tkhd.write_u16::<BigEndian>(0)?; // layer
            tkhd.write_u16::<BigEndian>(0)?; // alternate_group
            tkhd.write_u16::<BigEndian>(0)?; // volume
            tkhd.write_u16::<BigEndian>(0)?;
            for v in UNITY_MATRIX {
                tkhd.write_u32::<BigEndian>(v)?;
            }
            tkhd.write_u32::<BigEndian>((config.width as u32) << 16)?;
            tkhd.write_u32::<BigEndian>((config.height as u32) << 16)
        })?;

        trak.write_atom(FourCC::MDIA, |mdia| {
            mdia.write_atom(FourCC::MDHD, |mdhd| {
                mdhd.write_full_atom_version(0, 0)?;
                mdhd.write_u32::<BigEndian>(0)?;
                mdhd.write_u32::<BigEndian>(0)?;
                mdhd.write_u32::<BigEndian>(config.timescale)?;
                mdhd.write_u32::<BigEndian>(0)?;
                mdhd.write_u16::<BigEndian>(0x55c4)?; // "und"
                mdhd.write_u16::<BigEndian>(0)
            })?;
            mdia.write_atom(FourCC::HDLR, |hdlr| {
                hdlr.write_full_atom_version(0, 0)?;
                hdlr.write_u32::<BigEndian>(0)?;
                hdlr.write_four_cc(FourCC::VIDE)?;
                hdlr.write_all(&[0; 12])?;
                hdlr.write_all(b"VideoHandler\0")
            })?;
            mdia.write_atom(FourCC::MINF, |minf| {
                minf.write_atom(FourCC::VMHD, |vmhd| {
                    vmhd.write_full_atom_version(0, 1)?;
                    vmhd.write_all(&[0; 8])
                })?;
                minf.write_atom(FourCC::DINF, |dinf| {
                    dinf.write_atom(FourCC::DREF, |dref| {
                        dref.write_full_atom_version(0, 0)?;
                        dref.write_u32::<BigEndian>(1)?;
                        // self-contained
                        dref.write_atom(FourCC::URL, |url| url.write_full_atom_version(0, 1))
                    })
                })?;
                minf.write_atom(FourCC::STBL, |stbl| write_stbl(stbl, config))
            })
        })
    })?;

    moov.write_atom(FourCC::MVEX, |mvex| {
        mvex.write_atom(FourCC::TREX, |trex| {
            trex.write_full_atom_version(0, 0)?;
            trex.write_u32::<BigEndian>(TRACK_ID)?;
            trex.write_u32::<BigEndian>(1)?; // default_sample_description_index
            trex.write_u32::<BigEndian>(config.default_sample_duration)?;
            trex.write_u32::<BigEndian>(0)?;
            trex.write_u32::<BigEndian>(0)
        })
    })
}

fn write_stbl(stbl: &mut Vec<u8>, config: &TrackConfig) -> io::Result<()> {
    stbl.write_atom(FourCC::STSD, |stsd| {
        stsd.write_full_atom_version(0, 0)?;
        stsd.write_u32::<BigEndian>(1)?;
        stsd.write_atom(FourCC::HEV1, |hev1| {
            hev1.write_all(&[0; 6])?;
            hev1.write_u16::<BigEndian>(1)?; // data_reference_index
            hev1.write_all(&[0; 16])?;
            hev1.write_u16::<BigEndian>(config.width)?;
            hev1.write_u16::<BigEndian>(config.height)?;
            hev1.write_u32::<BigEndian>(0x00480000)?; // 72 dpi
            hev1.write_u32::<BigEndian>(0x00480000)?;
            hev1.write_u32::<BigEndian>(0)?;
            hev1.write_u16::<BigEndian>(1)?; // frame_count
            hev1.write_all(&[0; 32])?; // compressorname
            hev1.write_u16::<BigEndian>(0x0018)?; // depth
            hev1.write_i16::<BigEndian>(-1)?;
            hev1.write_atom(FourCC::HVCC, |hvcc| config.decoder_configuration.encode(hvcc))
        })
    })?;

    for typ in [FourCC::STTS, FourCC::STSC, FourCC::STCO] {
        stbl.write_atom(typ, |atom| {
            atom.write_full_atom_version(0, 0)?;
            atom.write_u32::<BigEndian>(0)
        })?;
    }
    stbl.write_atom(FourCC::STSZ, |stsz| {
        stsz.write_full_atom_version(0, 0)?;
        stsz.write_u32::<BigEndian>(0)?; // sample_size
        stsz.write_u32::<BigEndian>(0)
    })
}
