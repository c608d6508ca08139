//! Peak level detection over raw interleaved PCM buffers

use thiserror::Error;

/// How a sample's bits are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    Signed,
    Unsigned,
    /// Floating point samples. Never decoded; the meter reads silence.
    Float,
}

/// Byte order of multi-byte samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the host, which is what cpal hands us
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

/// Layout of the raw bytes delivered by the capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub bits: u16,
    pub sample_type: SampleType,
    pub byte_order: ByteOrder,
    pub channels: u16,
}

impl SampleFormat {
    pub fn new(bits: u16, sample_type: SampleType, byte_order: ByteOrder, channels: u16) -> Self {
        Self {
            bits,
            sample_type,
            byte_order,
            channels,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits / 8)
    }

    /// Bytes in one frame, i.e. one sample for every channel
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    /// Largest magnitude this format can represent, or 0 when the
    /// width/type combination is not one we decode.
    pub fn max_amplitude(&self) -> u32 {
        match (self.bits, self.sample_type) {
            (8, SampleType::Unsigned) => u32::from(u8::MAX),
            (8, SampleType::Signed) => i8::MAX as u32,
            (16, SampleType::Unsigned) => u32::from(u16::MAX),
            (16, SampleType::Signed) => i16::MAX as u32,
            _ => 0,
        }
    }

    /// Whether buffers in this format produce a real level rather than silence
    pub fn is_decodable(&self) -> bool {
        self.max_amplitude() != 0
    }
}

/// Errors raised while configuring a detector or processing a buffer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PcmError {
    #[error("buffer of {len} bytes is not a whole number of {frame_bytes}-byte frames")]
    InvalidBufferLength { len: usize, frame_bytes: usize },
    #[error("invalid sample format: {0}")]
    InvalidFormat(String),
}

/// Per-format sample decoder, chosen once when the detector is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Silent,
    U8,
    I8,
    U16(ByteOrder),
    I16(ByteOrder),
}

impl Decoder {
    fn for_format(format: &SampleFormat) -> Self {
        match (format.bits, format.sample_type) {
            (8, SampleType::Unsigned) => Decoder::U8,
            (8, SampleType::Signed) => Decoder::I8,
            (16, SampleType::Unsigned) => Decoder::U16(format.byte_order),
            (16, SampleType::Signed) => Decoder::I16(format.byte_order),
            _ => Decoder::Silent,
        }
    }

    /// Magnitude of one sample. `unsigned_abs` keeps i8::MIN and i16::MIN
    /// representable (128 and 32768); clamping happens afterwards.
    fn magnitude(self, sample: &[u8]) -> u32 {
        match self {
            Decoder::Silent => 0,
            Decoder::U8 => u32::from(sample[0]),
            Decoder::I8 => u32::from((sample[0] as i8).unsigned_abs()),
            Decoder::U16(order) => {
                let raw = [sample[0], sample[1]];
                u32::from(match order {
                    ByteOrder::Little => u16::from_le_bytes(raw),
                    ByteOrder::Big => u16::from_be_bytes(raw),
                })
            }
            Decoder::I16(order) => {
                let raw = [sample[0], sample[1]];
                let value = match order {
                    ByteOrder::Little => i16::from_le_bytes(raw),
                    ByteOrder::Big => i16::from_be_bytes(raw),
                };
                u32::from(value.unsigned_abs())
            }
        }
    }
}

/// Turns raw PCM buffers into a normalized peak level in `[0, 1]`
#[derive(Debug, Clone)]
pub struct PeakLevelDetector {
    format: SampleFormat,
    decoder: Decoder,
    max_amplitude: u32,
}

impl PeakLevelDetector {
    /// Configure a detector for `format`.
    ///
    /// Formats outside the decode table are accepted and report silence;
    /// only structurally broken formats (no channels, partial bytes) fail.
    pub fn new(format: SampleFormat) -> Result<Self, PcmError> {
        if format.channels == 0 {
            return Err(PcmError::InvalidFormat(
                "channel count must be positive".to_string(),
            ));
        }
        if format.bits == 0 || format.bits % 8 != 0 {
            return Err(PcmError::InvalidFormat(format!(
                "sample width must be a positive multiple of 8 bits, got {}",
                format.bits
            )));
        }

        Ok(Self {
            format,
            decoder: Decoder::for_format(&format),
            max_amplitude: format.max_amplitude(),
        })
    }

    pub fn format(&self) -> &SampleFormat {
        &self.format
    }

    /// Peak level of `buffer`.
    ///
    /// In degraded mode (undecodable format) the buffer is not inspected and
    /// the level is 0.0, so no length check happens either.
    pub fn detect(&self, buffer: &[u8]) -> Result<f32, PcmError> {
        if self.max_amplitude == 0 {
            return Ok(0.0);
        }

        let frame_bytes = self.format.frame_bytes();
        if buffer.len() % frame_bytes != 0 {
            return Err(PcmError::InvalidBufferLength {
                len: buffer.len(),
                frame_bytes,
            });
        }

        // Frames are interleaved, so walking samples in order visits every
        // channel of every frame.
        let peak = buffer
            .chunks_exact(self.format.bytes_per_sample())
            .map(|sample| self.decoder.magnitude(sample))
            .max()
            .unwrap_or(0);

        // Out-of-range magnitudes (e.g. |-128| for signed 8-bit) are clamped,
        // not rejected.
        let peak = peak.min(self.max_amplitude);
        Ok(peak as f32 / self.max_amplitude as f32)
    }
}

/// One-shot detection for callers that don't keep a configured detector
pub fn detect(format: SampleFormat, buffer: &[u8]) -> Result<f32, PcmError> {
    PeakLevelDetector::new(format)?.detect(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(bits: u16, sample_type: SampleType, byte_order: ByteOrder) -> SampleFormat {
        SampleFormat::new(bits, sample_type, byte_order, 1)
    }

    fn supported_formats() -> Vec<SampleFormat> {
        let mut formats = Vec::new();
        for bits in [8, 16] {
            for sample_type in [SampleType::Signed, SampleType::Unsigned] {
                for byte_order in [ByteOrder::Little, ByteOrder::Big] {
                    for channels in [1, 2] {
                        formats.push(SampleFormat::new(bits, sample_type, byte_order, channels));
                    }
                }
            }
        }
        formats
    }

    #[test]
    fn test_zero_buffer_is_silence_for_every_format() {
        for format in supported_formats() {
            let buffer = vec![0u8; format.frame_bytes() * 16];
            assert_eq!(detect(format, &buffer), Ok(0.0), "{:?}", format);
        }
    }

    #[test]
    fn test_i16_minimum_clamps_to_full_scale() {
        let format = mono(16, SampleType::Signed, ByteOrder::Little);
        let mut buffer = vec![0u8; 8];
        buffer[4..6].copy_from_slice(&i16::MIN.to_le_bytes());

        assert_eq!(detect(format, &buffer), Ok(1.0));
    }

    #[test]
    fn test_u8_full_and_midpoint() {
        let format = mono(8, SampleType::Unsigned, ByteOrder::Little);

        assert_eq!(detect(format, &[255u8; 32]), Ok(1.0));

        let mid = detect(format, &[128u8; 32]).unwrap();
        assert!((mid - 0.502).abs() < 0.001, "got {}", mid);
    }

    #[test]
    fn test_i8_minimum_clamps_to_full_scale() {
        let format = mono(8, SampleType::Signed, ByteOrder::Little);
        let buffer = [0u8, (-128i8) as u8, 10];

        assert_eq!(detect(format, &buffer), Ok(1.0));
    }

    #[test]
    fn test_i8_negative_uses_magnitude() {
        let format = mono(8, SampleType::Signed, ByteOrder::Little);
        let level = detect(format, &[(-64i8) as u8, 32]).unwrap();

        assert!((level - 64.0 / 127.0).abs() < 1e-6);
    }

    #[test]
    fn test_i16_big_endian_decode() {
        let format = mono(16, SampleType::Signed, ByteOrder::Big);
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(-16384i16).to_be_bytes());
        buffer.extend_from_slice(&100i16.to_be_bytes());

        let level = detect(format, &buffer).unwrap();
        assert!((level - 16384.0 / 32767.0).abs() < 1e-6);

        // Same bytes read little-endian give a different answer.
        let le = detect(mono(16, SampleType::Signed, ByteOrder::Little), &buffer).unwrap();
        assert!((le - level).abs() > 0.01);
    }

    #[test]
    fn test_u16_max_is_full_scale() {
        let format = mono(16, SampleType::Unsigned, ByteOrder::Big);
        let buffer = [0xFF, 0xFF, 0x00, 0x01];

        assert_eq!(detect(format, &buffer), Ok(1.0));
    }

    #[test]
    fn test_peak_taken_across_all_channels() {
        let format = SampleFormat::new(16, SampleType::Signed, ByteOrder::Little, 2);
        let mut buffer = Vec::new();
        for (left, right) in [(10i16, -20i16), (5, 8000), (-300, 0)] {
            buffer.extend_from_slice(&left.to_le_bytes());
            buffer.extend_from_slice(&right.to_le_bytes());
        }

        let level = detect(format, &buffer).unwrap();
        assert!((level - 8000.0 / 32767.0).abs() < 1e-6);
    }

    #[test]
    fn test_detect_is_repeatable() {
        let detector = PeakLevelDetector::new(mono(8, SampleType::Unsigned, ByteOrder::Little)).unwrap();
        let buffer = [3u8, 200, 17, 90];

        let first = detector.detect(&buffer);
        let second = detector.detect(&buffer);
        assert_eq!(first, second);
        assert_eq!(buffer, [3u8, 200, 17, 90]);
    }

    #[test]
    fn test_empty_buffer_is_silence() {
        let format = mono(16, SampleType::Signed, ByteOrder::Little);
        assert_eq!(detect(format, &[]), Ok(0.0));
    }

    #[test]
    fn test_misaligned_buffer_is_rejected() {
        let format = mono(16, SampleType::Signed, ByteOrder::Little);
        for len in [1, 3, 5, 4097] {
            let buffer = vec![0u8; len];
            assert_eq!(
                detect(format, &buffer),
                Err(PcmError::InvalidBufferLength { len, frame_bytes: 2 })
            );
        }

        let stereo = SampleFormat::new(16, SampleType::Signed, ByteOrder::Little, 2);
        assert_eq!(
            detect(stereo, &[0u8; 6]),
            Err(PcmError::InvalidBufferLength { len: 6, frame_bytes: 4 })
        );
    }

    #[test]
    fn test_undecodable_formats_read_as_silence() {
        let float = mono(32, SampleType::Float, ByteOrder::Little);
        assert!(!float.is_decodable());
        assert_eq!(detect(float, &[0xFFu8; 7]), Ok(0.0));

        let wide = mono(24, SampleType::Signed, ByteOrder::Little);
        assert_eq!(wide.max_amplitude(), 0);
        assert_eq!(detect(wide, &[0x7Fu8; 9]), Ok(0.0));
    }

    #[test]
    fn test_broken_formats_are_rejected() {
        let no_channels = SampleFormat::new(16, SampleType::Signed, ByteOrder::Little, 0);
        assert!(matches!(
            PeakLevelDetector::new(no_channels),
            Err(PcmError::InvalidFormat(_))
        ));

        let partial_byte = mono(12, SampleType::Signed, ByteOrder::Little);
        assert!(matches!(
            PeakLevelDetector::new(partial_byte),
            Err(PcmError::InvalidFormat(_))
        ));
    }
}
