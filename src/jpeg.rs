//! Minimal JPEG inspection
//!
//! The collector only needs to know whether a payload looks like a complete
//! JPEG and, when possible, its pixel dimensions. Nothing is decoded.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JpegParseError {
    #[error("invalid JPEG: too short")]
    TooShort,

    #[error("missing SOI marker")]
    MissingSoi,

    #[error("missing EOI marker")]
    MissingEoi,
}

/// JPEG marker codes
pub(crate) mod markers {
    pub const SOI: u8 = 0xD8; // Start of Image
    pub const EOI: u8 = 0xD9; // End of Image
    pub const SOS: u8 = 0xDA; // Start of Scan
    pub const SOF0: u8 = 0xC0; // Start of Frame (Baseline)
    pub const SOF2: u8 = 0xC2; // Start of Frame (Progressive)
    pub const COM: u8 = 0xFE; // Comment
    pub const RST0: u8 = 0xD0;
    pub const RST7: u8 = 0xD7;
}

/// Quick check that a payload starts with SOI and ends with EOI
pub fn validate_jpeg(data: &[u8]) -> Result<(), JpegParseError> {
    if data.len() < 4 {
        return Err(JpegParseError::TooShort);
    }

    if data[0] != 0xFF || data[1] != markers::SOI {
        return Err(JpegParseError::MissingSoi);
    }

    if data[data.len() - 2] != 0xFF || data[data.len() - 1] != markers::EOI {
        return Err(JpegParseError::MissingEoi);
    }

    Ok(())
}

/// Reads `(width, height)` from the first SOF0/SOF2 segment
///
/// Stops at the start of scan; returns `None` if no frame header precedes it
/// or the segment is truncated.
pub fn dimensions(data: &[u8]) -> Option<(u16, u16)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != markers::SOI {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        match marker {
            // Fill bytes and standalone markers carry no length field
            0xFF => {
                pos += 1;
                continue;
            }
            markers::SOI | markers::RST0..=markers::RST7 => {
                pos += 2;
                continue;
            }
            markers::EOI | markers::SOS => return None,
            _ => {}
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 {
            return None;
        }

        if marker == markers::SOF0 || marker == markers::SOF2 {
            // length(2) + precision(1) + height(2) + width(2)
            let seg = pos + 4;
            if seg + 5 > data.len() {
                return None;
            }
            let height = u16::from_be_bytes([data[seg + 1], data[seg + 2]]);
            let width = u16::from_be_bytes([data[seg + 3], data[seg + 4]]);
            return Some((width, height));
        }

        pos += 2 + length;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_minimal_jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];

        // APP0 stub so the walker has to skip a segment
        jpeg.extend(&[0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46]);

        jpeg.extend(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        jpeg.extend(&height.to_be_bytes());
        jpeg.extend(&width.to_be_bytes());
        jpeg.extend(&[0x01, 0x01, 0x11, 0x00]);

        jpeg.extend(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
        jpeg.extend(&[0x01, 0x02, 0x03, 0x04]);
        jpeg.extend(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_validate_jpeg() {
        let valid = vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
        assert!(validate_jpeg(&valid).is_ok());

        assert_eq!(validate_jpeg(&[0xFF, 0xD8]), Err(JpegParseError::TooShort));
        assert_eq!(
            validate_jpeg(&[0x00, 0x00, 0x01, 0x02]),
            Err(JpegParseError::MissingSoi)
        );
        assert_eq!(
            validate_jpeg(&[0xFF, 0xD8, 0x01, 0x02]),
            Err(JpegParseError::MissingEoi)
        );
    }

    #[test]
    fn test_dimensions_from_sof0() {
        let jpeg = create_minimal_jpeg(320, 240);
        assert_eq!(dimensions(&jpeg), Some((320, 240)));
    }

    #[test]
    fn test_dimensions_missing_frame_header() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x11, 0xFF, 0xD9];
        assert_eq!(dimensions(&jpeg), None);
        assert_eq!(dimensions(b"not a jpeg"), None);
    }
}
