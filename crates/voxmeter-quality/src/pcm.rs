//! 16-bit PCM helpers.

/// Bytes per sample for 16-bit PCM.
pub const BYTES_PER_SAMPLE: u64 = 2;

/// Playback duration of a 16-bit PCM chunk, in milliseconds.
///
/// Sample rate and channel count are treated as at least 1, so malformed
/// format metadata never divides by zero. Partial frames count fractionally.
pub fn chunk_duration_ms(byte_count: u64, sample_rate_hz: u32, channel_count: u16) -> f64 {
    let channels = u64::from(channel_count.max(1));
    let samples = byte_count as f64 / (BYTES_PER_SAMPLE * channels) as f64;
    samples / f64::from(sample_rate_hz.max(1)) * 1000.0
}

/// Byte length of a 16-bit PCM chunk lasting `duration_ms`.
pub fn chunk_bytes_for(duration_ms: u32, sample_rate_hz: u32, channel_count: u16) -> u64 {
    let samples = u64::from(sample_rate_hz) * u64::from(duration_ms) / 1000;
    samples * BYTES_PER_SAMPLE * u64::from(channel_count.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telephony_frame_duration() {
        // 20 ms of 8 kHz mono = 160 samples = 320 bytes
        assert_eq!(chunk_duration_ms(320, 8000, 1), 20.0);
        assert_eq!(chunk_duration_ms(640, 16000, 1), 20.0);
        assert_eq!(chunk_duration_ms(1280, 16000, 2), 20.0);
    }

    #[test]
    fn test_zero_format_values_clamped() {
        // rate 0 -> 1 Hz, channels 0 -> 1
        assert_eq!(chunk_duration_ms(4, 0, 0), 2000.0);
        assert_eq!(chunk_duration_ms(0, 8000, 1), 0.0);
    }

    #[test]
    fn test_odd_byte_count_is_fractional() {
        let ms = chunk_duration_ms(3, 1000, 1);
        assert!((ms - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_chunk_bytes_for() {
        assert_eq!(chunk_bytes_for(20, 8000, 1), 320);
        assert_eq!(chunk_bytes_for(20, 16000, 2), 1280);
        assert_eq!(chunk_duration_ms(chunk_bytes_for(40, 8000, 1), 8000, 1), 40.0);
    }
}
