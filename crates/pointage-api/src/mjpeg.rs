//! First-frame extraction from `multipart/x-mixed-replace` MJPEG bodies.
//!
//! The stream endpoint pushes JPEG parts separated by boundary headers. A
//! single still is cut out by markers: SOI (`FF D8`) through EOI (`FF D9`).
//! A plain single-JPEG body is the degenerate case.

use std::ops::Range;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Byte range of the first complete JPEG in `buf`, if one has fully arrived.
pub fn first_jpeg(buf: &[u8]) -> Option<Range<usize>> {
    let start = find(buf, &SOI, 0)?;
    let eoi = find(buf, &EOI, start + SOI.len())?;
    Some(start..eoi + EOI.len())
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
        let mut v = SOI.to_vec();
        v.extend_from_slice(payload);
        v.extend_from_slice(&EOI);
        v
    }

    #[test]
    fn test_plain_jpeg() {
        let jpeg = fake_jpeg(&[1, 2, 3]);
        assert_eq!(first_jpeg(&jpeg), Some(0..jpeg.len()));
    }

    #[test]
    fn test_multipart_first_part() {
        let first = fake_jpeg(&[0x10, 0x20]);
        let mut body = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        let offset = body.len();
        body.extend_from_slice(&first);
        body.extend_from_slice(b"\r\n--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(&fake_jpeg(&[0x30]));

        let range = first_jpeg(&body).unwrap();
        assert_eq!(range, offset..offset + first.len());
        assert_eq!(&body[range], first.as_slice());
    }

    #[test]
    fn test_incomplete_frame() {
        let mut partial = b"--frame\r\n\r\n".to_vec();
        partial.extend_from_slice(&SOI);
        partial.extend_from_slice(&[1, 2, 3]);
        assert_eq!(first_jpeg(&partial), None);
    }

    #[test]
    fn test_soi_bytes_do_not_count_as_eoi() {
        // FF D8 FF D9 is the shortest complete marker pair.
        assert_eq!(first_jpeg(&[0xFF, 0xD8, 0xFF, 0xD9]), Some(0..4));
        assert_eq!(first_jpeg(&[0xFF, 0xD8, 0xD9]), None);
    }

    #[test]
    fn test_empty() {
        assert_eq!(first_jpeg(&[]), None);
    }
}
