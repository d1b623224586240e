//! Conversion between raw f32 samples and the wire's 16-bit LE PCM +
//! base64 envelope

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Sample rate for captured audio sent to the model (mono)
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate for synthesized audio received from the model (mono)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// MIME tag for outbound capture frames
pub const CAPTURE_MIME: &str = "audio/pcm;rate=16000";

/// Wire form of an audio frame: base64 PCM bytes plus a MIME tag
/// describing sample format and rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedEnvelope {
    /// Base64-encoded little-endian 16-bit PCM
    pub data: String,

    /// Sample format tag, e.g. `audio/pcm;rate=16000`
    #[serde(default)]
    pub mime_type: String,
}

/// Encode normalized f32 samples into a wire envelope.
///
/// Each sample is scaled by 32768 and truncated into a 16-bit store with
/// wraparound: out-of-range input is NOT clamped, so `1.0` becomes `-32768`.
/// Round-trip behavior depends on this matching the 16-bit store exactly.
#[must_use]
pub fn encode(samples: &[f32]) -> EncodedEnvelope {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let quantized = (f64::from(sample) * 32768.0) as i64 as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }

    EncodedEnvelope {
        data: BASE64.encode(&bytes),
        mime_type: CAPTURE_MIME.to_string(),
    }
}

/// Decode little-endian 16-bit PCM bytes into one planar f32 buffer per
/// channel.
///
/// `frame_count = len / 2 / channels`; a trailing partial frame is silently
/// dropped by the floor division.
#[must_use]
pub fn decode(bytes: &[u8], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }

    let frame_count = bytes.len() / 2 / channels;
    let mut planes = vec![Vec::with_capacity(frame_count); channels];

    for frame in 0..frame_count {
        for (channel, plane) in planes.iter_mut().enumerate() {
            let at = (frame * channels + channel) * 2;
            let raw = i16::from_le_bytes([bytes[at], bytes[at + 1]]);
            plane.push(f32::from(raw) / 32768.0);
        }
    }

    planes
}

/// Decode a mono PCM byte buffer into a single sample plane
#[must_use]
pub fn decode_mono(bytes: &[u8]) -> Vec<f32> {
    decode(bytes, 1).pop().unwrap_or_default()
}

/// Decode the base64 payload of a wire envelope
///
/// # Errors
///
/// Returns `ProtocolError` if the payload is not valid base64
pub fn decode_envelope(envelope: &EncodedEnvelope, channels: usize) -> crate::Result<Vec<Vec<f32>>> {
    let bytes = BASE64
        .decode(&envelope.data)
        .map_err(|e| crate::Error::ProtocolError(format!("invalid base64 payload: {e}")))?;
    Ok(decode(&bytes, channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_bytes(envelope: &EncodedEnvelope) -> Vec<u8> {
        BASE64.decode(&envelope.data).unwrap()
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn round_trip_within_quantization_error() {
        let samples: Vec<f32> = (0..4096)
            .map(|i| ((i as f32) / 4096.0).mul_add(2.0, -1.0) * 0.99)
            .collect();

        let envelope = encode(&samples);
        let decoded = decode_mono(&raw_bytes(&envelope));

        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(&decoded) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{a} vs {b}");
        }
    }

    #[test]
    fn out_of_range_input_wraps_instead_of_clamping() {
        let envelope = encode(&[1.0]);
        let bytes = raw_bytes(&envelope);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), -32768);

        let envelope = encode(&[-1.5]);
        let bytes = raw_bytes(&envelope);
        // -1.5 * 32768 = -49152, wraps to 16384
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 16384);
    }

    #[test]
    fn envelope_carries_capture_mime_tag() {
        assert_eq!(encode(&[0.0]).mime_type, CAPTURE_MIME);
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        // 7 bytes mono: 3 full samples, one dangling byte
        let bytes = [0u8, 0, 1, 0, 2, 0, 3];
        let planes = decode(&bytes, 1);
        assert_eq!(planes[0].len(), 3);

        // 10 bytes stereo: 2 full frames, one dangling sample
        let bytes = [0u8; 10];
        let planes = decode(&bytes, 2);
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].len(), 2);
        assert_eq!(planes[1].len(), 2);
    }

    #[test]
    fn interleaved_source_decodes_to_planar_channels() {
        // L=1000, R=-1000 repeated
        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend_from_slice(&1000i16.to_le_bytes());
            bytes.extend_from_slice(&(-1000i16).to_le_bytes());
        }

        let planes = decode(&bytes, 2);
        assert!(planes[0].iter().all(|s| (s - 1000.0 / 32768.0).abs() < 1e-6));
        assert!(planes[1].iter().all(|s| (s + 1000.0 / 32768.0).abs() < 1e-6));
    }

    #[test]
    fn invalid_base64_is_a_protocol_error() {
        let envelope = EncodedEnvelope {
            data: "not base64!!!".to_string(),
            mime_type: String::new(),
        };
        assert!(matches!(
            decode_envelope(&envelope, 1),
            Err(crate::Error::ProtocolError(_))
        ));
    }
}
