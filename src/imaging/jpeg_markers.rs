//! Minimal JPEG header scanner.
//!
//! Extracts the two facts needed to route a JPEG to the right decoder:
//! - the component count from the first SOF segment (4 = CMYK/YCCK)
//! - the color transform byte of an Adobe APP14 segment, if present
//!
//! Adobe writers store CMYK samples inverted; files without the APP14
//! segment store them as plain ink values. The codec uses this to undo or
//! keep the inversion the decoder applies.

/// Header facts gathered before the first scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JpegHeader {
    pub components: Option<u8>,
    /// Adobe APP14 transform: 0 = none (RGB/CMYK), 1 = YCbCr, 2 = YCCK.
    pub adobe_transform: Option<u8>,
}

impl JpegHeader {
    pub fn is_cmyk(&self) -> bool {
        self.components == Some(4)
    }

    pub fn has_adobe_marker(&self) -> bool {
        self.adobe_transform.is_some()
    }
}

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP14: u8 = 0xEE;
const SOS: u8 = 0xDA;
const ADOBE_SIGNATURE: &[u8] = b"Adobe";

/// Start-of-frame markers carry the component count; DHT (C4), JPG (C8)
/// and DAC (CC) share the range but are not frames.
fn is_sof(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// Scan JPEG markers up to the first SOS. Returns an empty header for
/// anything that does not start with SOI.
pub fn scan_jpeg_header(data: &[u8]) -> JpegHeader {
    let mut header = JpegHeader::default();
    if !data.starts_with(&SOI) {
        return header;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        // Fill bytes and stuffed zeros
        if marker == 0xFF || marker == 0x00 {
            pos += 1;
            continue;
        }
        if marker == SOS {
            break;
        }
        // Markers without length field
        if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
            pos += 2;
            continue;
        }

        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + seg_len).min(data.len());
        let segment = data.get(seg_start..seg_end).unwrap_or(&[]);

        if is_sof(marker) && header.components.is_none() {
            // precision(1) height(2) width(2) components(1)
            header.components = segment.get(5).copied();
        } else if marker == APP14 && segment.starts_with(ADOBE_SIGNATURE) {
            // "Adobe"(5) version(2) flags0(2) flags1(2) transform(1)
            header.adobe_transform = segment.get(11).copied();
        }

        if seg_len < 2 {
            break;
        }
        pos += 2 + seg_len;
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn sof(components: u8) -> Vec<u8> {
        segment(0xC0, &[8, 0, 16, 0, 16, components])
    }

    fn adobe(transform: u8) -> Vec<u8> {
        let mut payload = b"Adobe".to_vec();
        payload.extend_from_slice(&[0, 100, 0, 0, 0, 0, transform]);
        segment(APP14, &payload)
    }

    fn jpeg(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = SOI.to_vec();
        for p in parts {
            out.extend_from_slice(p);
        }
        out.extend_from_slice(&[0xFF, SOS, 0x00, 0x02]);
        out
    }

    #[test]
    fn empty_and_garbage_return_default() {
        assert_eq!(scan_jpeg_header(&[]), JpegHeader::default());
        assert_eq!(scan_jpeg_header(b"GIF89a"), JpegHeader::default());
    }

    #[test]
    fn reads_component_count() {
        let header = scan_jpeg_header(&jpeg(&[sof(3)]));
        assert_eq!(header.components, Some(3));
        assert!(!header.is_cmyk());
        assert!(!header.has_adobe_marker());
    }

    #[test]
    fn detects_adobe_cmyk() {
        let header = scan_jpeg_header(&jpeg(&[adobe(0), sof(4)]));
        assert!(header.is_cmyk());
        assert_eq!(header.adobe_transform, Some(0));
    }

    #[test]
    fn skips_unrelated_segments() {
        let app0 = segment(0xE0, b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        let dht = segment(0xC4, &[0; 20]);
        let header = scan_jpeg_header(&jpeg(&[app0, dht, sof(1)]));
        assert_eq!(header.components, Some(1));
    }

    #[test]
    fn truncated_segment_does_not_panic() {
        let mut data = jpeg(&[adobe(2)]);
        data.truncate(10);
        let _ = scan_jpeg_header(&data);
    }
}
