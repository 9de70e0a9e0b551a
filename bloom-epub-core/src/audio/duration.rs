//! Working out how long a narration clip plays

use std::path::Path;
use std::time::Duration;

/// Parse a `data-duration` style value: seconds with a `.` decimal separator,
/// whatever the current locale
pub fn parse_seconds(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

/// Segment end times from a space-separated list of seconds. Unparseable entries
/// become NaN so they keep their position.
pub fn parse_end_times(value: &str) -> Vec<f64> {
    value
        .split(' ')
        .filter(|field| !field.is_empty())
        .map(|field| field.trim().parse::<f64>().unwrap_or(f64::NAN))
        .collect()
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Play length of a RIFF/WAVE file, from its `fmt ` byte rate and `data` size
pub fn wav_duration_from_bytes(bytes: &[u8]) -> Option<Duration> {
    if bytes.get(0..4)? != b"RIFF" || bytes.get(8..12)? != b"WAVE" {
        return None;
    }
    let mut offset = 12;
    let mut byte_rate = None;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = read_u32_le(bytes, offset + 4)? as usize;
        let body = offset + 8;
        match id {
            b"fmt " => byte_rate = read_u32_le(bytes, body + 8),
            b"data" => {
                let rate = byte_rate.filter(|rate| *rate > 0)?;
                // Recorders sometimes leave the size unpatched; trust the file length then
                let available = bytes.len().saturating_sub(body);
                let data_size = if size == 0 || size > available { available } else { size };
                return Duration::try_from_secs_f64(data_size as f64 / rate as f64).ok();
            }
            _ => {}
        }
        // Chunks are padded to an even length
        offset = body + size + (size & 1);
    }
    None
}

pub fn wav_duration(path: &Path) -> Option<Duration> {
    let bytes = std::fs::read(path).ok()?;
    wav_duration_from_bytes(&bytes)
}

/// Rough length of a compressed clip from its size: in one sample a 61K mp3 was
/// 7 seconds long.
pub fn estimated_duration(file_size: u64) -> Duration {
    // 100ns ticks, integer arithmetic
    let ticks = file_size.saturating_mul(7 * 10_000_000) / 61_000;
    Duration::from_nanos(ticks.saturating_mul(100))
}

/// Duration of one narrated element: its `data-duration`, else the length of the
/// uncompressed recording next to the compressed file, else a size estimate
pub fn clip_duration(data_duration: Option<&str>, compressed: &Path) -> Duration {
    if let Some(duration) = data_duration.and_then(parse_seconds) {
        return duration;
    }
    if let Some(duration) = wav_duration(&compressed.with_extension("wav")) {
        return duration;
    }
    let size = std::fs::metadata(compressed).map(|m| m.len()).unwrap_or(0);
    tracing::warn!(
        "No duration or recording for {}; estimating from file size",
        compressed.display()
    );
    estimated_duration(size)
}

#[cfg(test)]
pub(crate) fn test_wav(seconds: u32) -> Vec<u8> {
    let byte_rate: u32 = 8000;
    let data_size = byte_rate * seconds;
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&8000u32.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&8u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.resize(wav.len() + data_size as usize, 0);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("3.5"), Some(Duration::from_millis(3500)));
        assert_eq!(parse_seconds(" 2 "), Some(Duration::from_secs(2)));
        assert_eq!(parse_seconds("3,5"), None);
        assert_eq!(parse_seconds("-1"), None);
        assert_eq!(parse_seconds("NaN"), None);
        assert_eq!(parse_seconds("inf"), None);
        assert_eq!(parse_seconds("1e30"), None);
    }

    #[test]
    fn test_end_times_keep_positions() {
        let times = parse_end_times("1.5 x 3.25");
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 1.5);
        assert!(times[1].is_nan());
        assert_eq!(times[2], 3.25);
    }

    #[test]
    fn test_wav_header() {
        assert_eq!(wav_duration_from_bytes(&test_wav(2)), Some(Duration::from_secs(2)));
        assert_eq!(wav_duration_from_bytes(b"ID3 not a wav"), None);
    }

    #[test]
    fn test_size_estimate() {
        assert_eq!(estimated_duration(61_000), Duration::from_secs(7));
        assert_eq!(estimated_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_clip_duration_priority() {
        let dir = tempfile::tempdir().unwrap();
        let mp3 = dir.path().join("i1.mp3");
        std::fs::write(&mp3, vec![0u8; 61_000]).unwrap();

        assert_eq!(clip_duration(Some("1.25"), &mp3), Duration::from_millis(1250));
        assert_eq!(clip_duration(None, &mp3), Duration::from_secs(7));

        std::fs::write(dir.path().join("i1.wav"), test_wav(3)).unwrap();
        assert_eq!(clip_duration(None, &mp3), Duration::from_secs(3));
        assert_eq!(clip_duration(Some("bogus"), &mp3), Duration::from_secs(3));
    }
}
