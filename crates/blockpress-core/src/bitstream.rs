//! Bitstream packaging: bit-level I/O, sequence and frame headers, and
//! length-delimited frame payloads.
//!
//! The sequence header carries the chroma-sampling code and frame
//! dimensions so an independent decoder can reconstruct the plane layout
//! without side information; each frame payload is length-prefixed so frame
//! boundaries are locatable without external indexing.

use thiserror::Error;

use crate::ChromaSampling;

/// Stream magic, first four bytes of every sequence.
pub const MAGIC: [u8; 4] = *b"BPRS";

/// Current bitstream version.
pub const VERSION: u8 = 1;

/// Packaging and parsing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitstreamError {
    /// A sequence must contain at least one frame.
    #[error("Cannot package an empty sequence")]
    EmptySequence,

    /// All frames of one sequence must share the sequence dimensions.
    #[error("Frame {index} is {width}x{height}, sequence is {seq_width}x{seq_height}")]
    DimensionMismatch {
        index: usize,
        width: u32,
        height: u32,
        seq_width: u32,
        seq_height: u32,
    },

    /// Input does not start with the stream magic.
    #[error("Bad stream magic")]
    BadMagic,

    /// Stream version this build does not understand.
    #[error("Unsupported bitstream version {0}")]
    UnsupportedVersion(u8),

    /// Header carries a chroma-sampling code outside 0..=3.
    #[error("Invalid chroma sampling code {0} in header")]
    InvalidChromaCode(u8),

    /// Input ended before the structure it promised.
    #[error("Truncated bitstream")]
    Truncated,
}

/// MSB-first bit writer over a growable byte buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_buffer: u32,
    bits_in_buffer: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Write `count` bits (right-aligned in `bits`), most significant first.
    pub fn write_bits(&mut self, bits: u32, count: u8) {
        debug_assert!(count <= 24);
        debug_assert!(count == 0 || bits < (1u32 << count));
        self.bit_buffer = (self.bit_buffer << count) | bits;
        self.bits_in_buffer += count;
        while self.bits_in_buffer >= 8 {
            self.bits_in_buffer -= 8;
            self.buffer.push((self.bit_buffer >> self.bits_in_buffer) as u8);
        }
    }

    /// Pad the current byte with zero bits.
    pub fn align(&mut self) {
        if self.bits_in_buffer > 0 {
            let pad = 8 - self.bits_in_buffer;
            self.write_bits(0, pad);
        }
    }

    /// Write a byte; requires byte alignment.
    pub fn write_byte(&mut self, byte: u8) {
        debug_assert_eq!(self.bits_in_buffer, 0);
        self.buffer.push(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bits_in_buffer, 0);
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.align();
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.bits_in_buffer == 0
    }
}

/// MSB-first bit reader over a byte slice.
#[derive(Debug)]
pub struct BitReader<'a> {
    input: &'a [u8],
    pos: usize,
    bit_buffer: u32,
    bits_in_buffer: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn read_bits(&mut self, count: u8) -> Result<u32, BitstreamError> {
        debug_assert!(count <= 24);
        while self.bits_in_buffer < count {
            let byte = *self.input.get(self.pos).ok_or(BitstreamError::Truncated)?;
            self.pos += 1;
            self.bit_buffer = (self.bit_buffer << 8) | byte as u32;
            self.bits_in_buffer += 8;
        }
        self.bits_in_buffer -= count;
        let value = (self.bit_buffer >> self.bits_in_buffer) & ((1u32 << count) - 1);
        Ok(value)
    }

    /// Discard partial bits and continue at the next byte boundary.
    pub fn align(&mut self) {
        self.bits_in_buffer = 0;
        self.bit_buffer = 0;
    }

    pub fn read_byte(&mut self) -> Result<u8, BitstreamError> {
        debug_assert_eq!(self.bits_in_buffer, 0);
        let byte = *self.input.get(self.pos).ok_or(BitstreamError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], BitstreamError> {
        debug_assert_eq!(self.bits_in_buffer, 0);
        let end = self.pos.checked_add(count).ok_or(BitstreamError::Truncated)?;
        let slice = self.input.get(self.pos..end).ok_or(BitstreamError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, BitstreamError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, BitstreamError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Bytes consumed so far (only meaningful at byte alignment).
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Frame type carried in each frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Coded without reference to any other frame.
    Intra = 0,
    /// Coded against the previous frame's reconstruction.
    Inter = 1,
}

/// Parsed sequence header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceHeader {
    pub chroma_sampling: ChromaSampling,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
}

impl SequenceHeader {
    fn write(&self, w: &mut BitWriter) {
        w.write_bytes(&MAGIC);
        w.write_byte(VERSION);
        w.write_byte(self.chroma_sampling.code());
        w.write_u32_le(self.width);
        w.write_u32_le(self.height);
        w.write_u32_le(self.frame_count);
    }

    /// Parse a sequence header from the start of a bitstream.
    ///
    /// Returns the header and the byte offset of the first frame header.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize), BitstreamError> {
        let mut r = BitReader::new(bytes);
        if r.read_bytes(4)? != MAGIC {
            return Err(BitstreamError::BadMagic);
        }
        let version = r.read_byte()?;
        if version != VERSION {
            return Err(BitstreamError::UnsupportedVersion(version));
        }
        let code = r.read_byte()?;
        let chroma_sampling =
            ChromaSampling::from_code(code).map_err(|_| BitstreamError::InvalidChromaCode(code))?;
        let width = r.read_u32_le()?;
        let height = r.read_u32_le()?;
        let frame_count = r.read_u32_le()?;
        Ok((
            Self {
                chroma_sampling,
                width,
                height,
                frame_count,
            },
            r.position(),
        ))
    }
}

/// One entropy-coded frame ready for packaging.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub frame_type: FrameType,
    /// Quantizer step the frame's rate controller was seeded with; a
    /// rate-control hint for decoders and inspection tools.
    pub base_step: u16,
    pub width: u32,
    pub height: u32,
    pub payload: Vec<u8>,
}

/// A frame located inside a packaged sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord<'a> {
    pub frame_type: FrameType,
    pub base_step: u16,
    pub payload: &'a [u8],
}

/// Assemble the final byte stream for one sequence.
///
/// Fails on an empty frame list or when any frame's dimensions disagree
/// with the sequence dimensions.
pub fn pack_sequence(
    chroma_sampling: ChromaSampling,
    width: u32,
    height: u32,
    frames: &[EncodedFrame],
) -> Result<Vec<u8>, BitstreamError> {
    if frames.is_empty() {
        return Err(BitstreamError::EmptySequence);
    }
    for (index, frame) in frames.iter().enumerate() {
        if frame.width != width || frame.height != height {
            return Err(BitstreamError::DimensionMismatch {
                index,
                width: frame.width,
                height: frame.height,
                seq_width: width,
                seq_height: height,
            });
        }
    }

    let total_payload: usize = frames.iter().map(|f| f.payload.len()).sum();
    let mut w = BitWriter::with_capacity(18 + frames.len() * 7 + total_payload);
    SequenceHeader {
        chroma_sampling,
        width,
        height,
        frame_count: frames.len() as u32,
    }
    .write(&mut w);

    for frame in frames {
        w.write_bits(frame.frame_type as u32, 1);
        w.write_bits(0, 7); // reserved
        w.write_u16_le(frame.base_step);
        w.write_u32_le(frame.payload.len() as u32);
        w.write_bytes(&frame.payload);
    }
    Ok(w.into_bytes())
}

/// Locate every frame inside a packaged sequence.
pub fn unpack_sequence(bytes: &[u8]) -> Result<(SequenceHeader, Vec<FrameRecord<'_>>), BitstreamError> {
    let (header, offset) = SequenceHeader::parse(bytes)?;
    let body = &bytes[offset..];
    let mut r = BitReader::new(body);
    // The declared count is untrusted input; each frame header takes at
    // least 7 bytes, so never reserve more records than the body can hold.
    let mut frames = Vec::with_capacity((header.frame_count as usize).min(body.len() / 7));
    for _ in 0..header.frame_count {
        let type_bit = r.read_bits(1)?;
        let _reserved = r.read_bits(7)?;
        r.align();
        let frame_type = if type_bit == 0 {
            FrameType::Intra
        } else {
            FrameType::Inter
        };
        let base_step = r.read_u16_le()?;
        let len = r.read_u32_le()? as usize;
        let payload = r.read_bytes(len)?;
        frames.push(FrameRecord {
            frame_type,
            base_step,
            payload,
        });
    }
    Ok((header, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_frame(payload: Vec<u8>) -> EncodedFrame {
        EncodedFrame {
            frame_type: FrameType::Intra,
            base_step: 16,
            width: 32,
            height: 24,
            payload,
        }
    }

    #[test]
    fn test_bit_writer_msb_first() {
        let mut w = BitWriter::new();
        w.write_bits(1, 1);
        w.write_bits(0, 3);
        w.write_bits(0b1111, 4);
        assert_eq!(w.into_bytes(), vec![0b1000_1111]);
    }

    #[test]
    fn test_bit_writer_align_pads_zero() {
        let mut w = BitWriter::new();
        w.write_bits(0b11, 2);
        w.align();
        w.write_byte(0xAB);
        assert_eq!(w.into_bytes(), vec![0b1100_0000, 0xAB]);
    }

    #[test]
    fn test_bit_reader_roundtrip() {
        let mut w = BitWriter::new();
        w.write_bits(0b101, 3);
        w.write_bits(0x1FFF, 13);
        w.align();
        w.write_u16_le(0xBEEF);
        w.write_u32_le(0xDEAD_1234);
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        assert_eq!(r.read_bits(13).unwrap(), 0x1FFF);
        r.align();
        assert_eq!(r.read_u16_le().unwrap(), 0xBEEF);
        assert_eq!(r.read_u32_le().unwrap(), 0xDEAD_1234);
    }

    #[test]
    fn test_bit_reader_truncated() {
        let mut r = BitReader::new(&[0xFF]);
        assert_eq!(r.read_bits(8).unwrap(), 0xFF);
        assert_eq!(r.read_bits(1), Err(BitstreamError::Truncated));
    }

    #[test]
    fn test_header_roundtrip_all_chroma_codes() {
        for cs in [
            ChromaSampling::Cs420,
            ChromaSampling::Cs422,
            ChromaSampling::Cs444,
            ChromaSampling::Monochrome,
        ] {
            let bytes = pack_sequence(cs, 640, 480, &[EncodedFrame {
                frame_type: FrameType::Intra,
                base_step: 8,
                width: 640,
                height: 480,
                payload: vec![1, 2, 3],
            }])
            .unwrap();
            let (header, _) = SequenceHeader::parse(&bytes).unwrap();
            assert_eq!(header.chroma_sampling, cs);
            assert_eq!(header.chroma_sampling.code(), cs.code());
            assert_eq!((header.width, header.height), (640, 480));
            assert_eq!(header.frame_count, 1);
        }
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert_eq!(
            pack_sequence(ChromaSampling::Cs420, 16, 16, &[]),
            Err(BitstreamError::EmptySequence)
        );
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let frames = vec![
            one_frame(vec![0]),
            EncodedFrame {
                width: 16,
                ..one_frame(vec![0])
            },
        ];
        let result = pack_sequence(ChromaSampling::Cs420, 32, 24, &frames);
        assert!(matches!(
            result,
            Err(BitstreamError::DimensionMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn test_unpack_locates_frame_boundaries() {
        let frames = vec![
            EncodedFrame {
                frame_type: FrameType::Intra,
                base_step: 10,
                width: 32,
                height: 24,
                payload: vec![0xAA; 17],
            },
            EncodedFrame {
                frame_type: FrameType::Inter,
                base_step: 12,
                width: 32,
                height: 24,
                payload: vec![0xBB; 5],
            },
        ];
        let bytes = pack_sequence(ChromaSampling::Cs444, 32, 24, &frames).unwrap();
        let (header, records) = unpack_sequence(&bytes).unwrap();
        assert_eq!(header.frame_count, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].frame_type, FrameType::Intra);
        assert_eq!(records[0].base_step, 10);
        assert_eq!(records[0].payload, &[0xAA; 17][..]);
        assert_eq!(records[1].frame_type, FrameType::Inter);
        assert_eq!(records[1].payload, &[0xBB; 5][..]);
    }

    #[test]
    fn test_parse_bad_magic() {
        let bytes = b"NOPE\x01\x00".to_vec();
        assert_eq!(SequenceHeader::parse(&bytes), Err(BitstreamError::BadMagic));
    }

    #[test]
    fn test_parse_bad_version() {
        let mut bytes = pack_sequence(ChromaSampling::Cs420, 8, 8, &[EncodedFrame {
            frame_type: FrameType::Intra,
            base_step: 1,
            width: 8,
            height: 8,
            payload: vec![],
        }])
        .unwrap();
        bytes[4] = 99;
        assert_eq!(
            SequenceHeader::parse(&bytes),
            Err(BitstreamError::UnsupportedVersion(99))
        );
    }

    #[test]
    fn test_parse_invalid_chroma_code() {
        let mut bytes = pack_sequence(ChromaSampling::Cs420, 8, 8, &[EncodedFrame {
            frame_type: FrameType::Intra,
            base_step: 1,
            width: 8,
            height: 8,
            payload: vec![],
        }])
        .unwrap();
        bytes[5] = 99;
        assert_eq!(
            SequenceHeader::parse(&bytes),
            Err(BitstreamError::InvalidChromaCode(99))
        );
    }

    #[test]
    fn test_parse_truncated_header() {
        assert_eq!(
            SequenceHeader::parse(b"BPRS\x01"),
            Err(BitstreamError::Truncated)
        );
    }

    #[test]
    fn test_unpack_truncated_payload() {
        let mut bytes = pack_sequence(ChromaSampling::Cs420, 8, 8, &[EncodedFrame {
            frame_type: FrameType::Intra,
            base_step: 1,
            width: 8,
            height: 8,
            payload: vec![7; 10],
        }])
        .unwrap();
        bytes.truncate(bytes.len() - 4);
        assert_eq!(unpack_sequence(&bytes).unwrap_err(), BitstreamError::Truncated);
    }

    #[test]
    fn test_unpack_huge_frame_count_errors_without_allocating() {
        let mut bytes = pack_sequence(ChromaSampling::Monochrome, 8, 8, &[EncodedFrame {
            frame_type: FrameType::Intra,
            base_step: 1,
            width: 8,
            height: 8,
            payload: vec![7; 10],
        }])
        .unwrap();
        // Inflate the declared frame count far beyond what the body holds.
        bytes[14..18].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(unpack_sequence(&bytes).unwrap_err(), BitstreamError::Truncated);
    }
}
