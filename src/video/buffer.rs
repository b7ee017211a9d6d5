//! Scatter/gather video buffer
//!
//! A frame of 16-bit pixels split into equally sized parts. Every part is
//! its own allocation laid out as
//!
//! ```text
//! [tag][payload: part_size bytes]
//! ```
//!
//! so that the whole part, tag included, can be handed to a bulk transfer
//! without copying. The renderer only ever writes payload bytes; the tag is
//! set once at allocation.

use crate::config::VideoConfig;
use crate::{BadgeError, Result};

/// Bytes per pixel (RGB565)
pub const BYTES_PER_PIXEL: usize = 2;

/// Bytes reserved in front of each part's payload
pub const PREFIX_LEN: usize = 1;

/// One transferable chunk of a frame
#[derive(Debug)]
pub struct Part {
    bytes: Box<[u8]>,
}

impl Part {
    fn allocate(index: usize, payload_len: usize, tag: u8) -> Result<Self> {
        let len = payload_len + PREFIX_LEN;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| BadgeError::AllocationFailed {
                part: index,
                bytes: len,
            })?;
        bytes.resize(len, 0);
        bytes[0] = tag;
        Ok(Part {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Transport tag byte
    #[inline]
    pub fn prefix(&self) -> u8 {
        self.bytes[0]
    }

    /// Pixel bytes
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[PREFIX_LEN..]
    }

    /// Mutable pixel bytes
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[PREFIX_LEN..]
    }

    /// Tag plus payload, ready for the transport
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.bytes.len() - PREFIX_LEN
    }
}

/// Frame buffer split into transport-tagged parts
#[derive(Debug)]
pub struct VideoBuffer {
    width: u16,
    height: u16,
    /// Frame size in bytes
    size: usize,
    part_size: usize,
    lines_per_part: usize,
    /// Parts covering the frame
    part_count: usize,
    /// Frame parts followed by any extra parts
    parts: Vec<Part>,
}

impl VideoBuffer {
    /// Allocate a buffer of `part_count` parts tagged with the pixel-data tag
    pub fn allocate(width: u16, height: u16, part_count: usize) -> Result<Self> {
        Self::allocate_with(&VideoConfig {
            width,
            height,
            part_count,
            ..VideoConfig::default()
        })
    }

    /// Allocate a buffer as described by `config`.
    ///
    /// Fails if the frame does not split evenly into `part_count` parts or if
    /// any part cannot be allocated. On failure every part allocated so far
    /// is released before returning.
    pub fn allocate_with(config: &VideoConfig) -> Result<Self> {
        config.validate()?;

        let size = config.frame_size();
        let part_size = size / config.part_count;
        let line_bytes = usize::from(config.width) * BYTES_PER_PIXEL;
        let total_parts = config.part_count + config.extra_parts;

        let mut parts = Vec::new();
        parts
            .try_reserve_exact(total_parts)
            .map_err(|_| BadgeError::AllocationFailed {
                part: 0,
                bytes: total_parts * std::mem::size_of::<Part>(),
            })?;
        for index in 0..total_parts {
            // `?` drops `parts`, releasing the parts allocated so far
            parts.push(Part::allocate(index, part_size, config.prefix_tag)?);
        }

        log::debug!(
            "Allocated {}x{} video buffer: {} parts of {} bytes (+{} extra)",
            config.width,
            config.height,
            config.part_count,
            part_size,
            config.extra_parts
        );

        Ok(VideoBuffer {
            width: config.width,
            height: config.height,
            size,
            part_size,
            lines_per_part: part_size / line_bytes,
            part_count: config.part_count,
            parts,
        })
    }

    /// Frame width in pixels
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Frame size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Payload bytes per part
    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// Whole scanlines per part.
    ///
    /// Only exact when `part_size` is a multiple of the line size.
    pub fn lines_per_part(&self) -> usize {
        self.lines_per_part
    }

    /// Number of parts covering the frame
    pub fn part_count(&self) -> usize {
        self.part_count
    }

    /// Number of extra parts after the frame parts
    pub fn extra_part_count(&self) -> usize {
        self.parts.len() - self.part_count
    }

    /// Parts covering the frame, in scan order
    pub fn frame_parts(&self) -> &[Part] {
        &self.parts[..self.part_count]
    }

    /// Every part, extra parts included
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Mutable access to a part
    pub fn part_mut(&mut self, index: usize) -> Option<&mut Part> {
        self.parts.get_mut(index)
    }

    /// Part index and payload offset of the first byte of scanline `y`
    pub fn line_location(&self, y: u16) -> Option<(usize, usize)> {
        if y >= self.height {
            return None;
        }
        let offset = usize::from(y) * usize::from(self.width) * BYTES_PER_PIXEL;
        Some((offset / self.part_size, offset % self.part_size))
    }

    /// Copy `data` into the frame payload starting at frame byte `offset`.
    ///
    /// Crosses part boundaries as needed, never touching a prefix byte.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if offset.checked_add(data.len()).map_or(true, |end| end > self.size) {
            return Err(BadgeError::OutOfBounds {
                offset,
                len: data.len(),
                size: self.size,
            });
        }

        let mut offset = offset;
        let mut remaining = data;
        while !remaining.is_empty() {
            let part = offset / self.part_size;
            let within = offset % self.part_size;
            let n = remaining.len().min(self.part_size - within);
            self.parts[part].payload_mut()[within..within + n].copy_from_slice(&remaining[..n]);
            remaining = &remaining[n..];
            offset += n;
        }
        Ok(())
    }

    /// Write one scanline of RGB565 pixels (stored big-endian)
    pub fn write_line(&mut self, y: u16, pixels: &[u16]) -> Result<()> {
        let line_bytes = usize::from(self.width) * BYTES_PER_PIXEL;
        let offset = usize::from(y) * line_bytes;
        if y >= self.height || pixels.len() * BYTES_PER_PIXEL > line_bytes {
            return Err(BadgeError::OutOfBounds {
                offset,
                len: pixels.len() * BYTES_PER_PIXEL,
                size: self.size,
            });
        }
        let bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_be_bytes()).collect();
        self.write_bytes(offset, &bytes)
    }

    /// Fill the whole frame with one RGB565 colour
    pub fn fill(&mut self, color: u16) {
        let [hi, lo] = color.to_be_bytes();
        for part in &mut self.parts[..self.part_count] {
            for pixel in part.payload_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
                pixel[0] = hi;
                pixel[1] = lo;
            }
        }
    }

    /// Explicitly release the buffer and all its parts
    pub fn deallocate(self) {
        drop(self);
    }
}

impl Drop for VideoBuffer {
    fn drop(&mut self) {
        log::trace!(
            "Releasing {}x{} video buffer ({} parts)",
            self.width,
            self.height,
            self.parts.len()
        );
    }
}

/// Release a buffer if there is one
pub fn deallocate(buffer: Option<VideoBuffer>) {
    if let Some(buffer) = buffer {
        buffer.deallocate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PIXEL_DATA_TAG;

    #[test]
    fn test_allocation_geometry() {
        let buffer = VideoBuffer::allocate(256, 192, 4).unwrap();
        assert_eq!(buffer.size(), 256 * 192 * 2);
        assert_eq!(buffer.part_size(), 24_576);
        assert_eq!(buffer.lines_per_part(), 48);
        assert_eq!(buffer.part_count(), 4);
        assert_eq!(buffer.parts().len(), 4);
        for part in buffer.parts() {
            assert_eq!(part.payload_len(), 24_576);
            assert_eq!(part.as_bytes().len(), 24_577);
        }
    }

    #[test]
    fn test_prefix_and_payload_layout() {
        let buffer = VideoBuffer::allocate(320, 240, 10).unwrap();
        for part in buffer.parts() {
            assert_eq!(part.prefix(), PIXEL_DATA_TAG);
            assert_eq!(
                part.payload().as_ptr(),
                part.as_bytes().as_ptr().wrapping_add(PREFIX_LEN)
            );
            assert!(part.payload().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_payload_writes_keep_prefix() {
        let mut buffer = VideoBuffer::allocate(256, 192, 8).unwrap();
        buffer.fill(0xFFFF);
        for y in 0..192 {
            buffer.write_line(y, &[0xABCD; 256]).unwrap();
        }
        let frame_size = buffer.size();
        buffer.write_bytes(frame_size - 3, &[1, 2, 3]).unwrap();

        for part in buffer.parts() {
            assert_eq!(part.prefix(), PIXEL_DATA_TAG);
        }
        assert_eq!(&buffer.parts()[0].payload()[..2], &[0xAB, 0xCD]);
        assert_eq!(&buffer.parts()[7].payload()[buffer.part_size() - 3..], &[1, 2, 3]);
    }

    #[test]
    fn test_write_crosses_part_boundary() {
        let mut buffer = VideoBuffer::allocate(4, 4, 4).unwrap();
        // 32-byte frame, 8-byte parts
        buffer.write_bytes(6, &[9, 9, 9, 9]).unwrap();
        assert_eq!(&buffer.parts()[0].payload()[6..], &[9, 9]);
        assert_eq!(&buffer.parts()[1].payload()[..2], &[9, 9]);
        assert_eq!(buffer.parts()[1].as_bytes()[0], PIXEL_DATA_TAG);
    }

    #[test]
    fn test_write_past_end_rejected() {
        let mut buffer = VideoBuffer::allocate(4, 4, 2).unwrap();
        assert!(buffer.write_bytes(30, &[0; 3]).is_err());
        assert!(buffer.write_line(4, &[0; 4]).is_err());
        assert!(buffer.write_line(0, &[0; 5]).is_err());
    }

    #[test]
    fn test_write_at_huge_offset_rejected() {
        let mut buffer = VideoBuffer::allocate(4, 4, 2).unwrap();
        assert!(matches!(
            buffer.write_bytes(usize::MAX, &[1]),
            Err(BadgeError::OutOfBounds {
                offset: usize::MAX,
                len: 1,
                size: 32
            })
        ));
        assert!(matches!(
            buffer.write_bytes(usize::MAX - 1, &[1, 2, 3]),
            Err(BadgeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_line_location() {
        let buffer = VideoBuffer::allocate(256, 192, 4).unwrap();
        assert_eq!(buffer.line_location(0), Some((0, 0)));
        assert_eq!(buffer.line_location(47), Some((0, 47 * 512)));
        assert_eq!(buffer.line_location(48), Some((1, 0)));
        assert_eq!(buffer.line_location(191), Some((3, 47 * 512)));
        assert_eq!(buffer.line_location(192), None);
    }

    #[test]
    fn test_extra_parts() {
        let buffer = VideoBuffer::allocate_with(&VideoConfig {
            width: 16,
            height: 16,
            part_count: 2,
            extra_parts: 3,
            prefix_tag: 0x42,
        })
        .unwrap();
        assert_eq!(buffer.parts().len(), 5);
        assert_eq!(buffer.frame_parts().len(), 2);
        assert_eq!(buffer.extra_part_count(), 3);
        assert!(buffer.parts().iter().all(|p| p.prefix() == 0x42));
        assert!(buffer.parts().iter().all(|p| p.payload_len() == 256));
    }

    #[test]
    fn test_uneven_partition_is_an_error() {
        let err = VideoBuffer::allocate(256, 192, 5).unwrap_err();
        assert!(matches!(
            err,
            BadgeError::UnevenPartition {
                size: 98_304,
                part_count: 5
            }
        ));
    }

    #[test]
    fn test_degenerate_arguments() {
        assert!(matches!(
            VideoBuffer::allocate(0, 192, 4),
            Err(BadgeError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            VideoBuffer::allocate(256, 192, 0),
            Err(BadgeError::InvalidPartCount(0))
        ));
    }

    #[test]
    fn test_deallocate() {
        deallocate(None);
        deallocate(Some(VideoBuffer::allocate(8, 8, 2).unwrap()));
        VideoBuffer::allocate(8, 8, 2).unwrap().deallocate();
    }
}
