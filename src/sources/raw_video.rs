//! Raw BGRA frame files.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! b"RVID" | width: u32 | height: u32 | fps_num: u32 | fps_den: u32 | frame*
//! ```
//!
//! Each frame is `width * height * 4` bytes of BGRA8 pixels; neither side
//! may exceed [`MAX_IMAGE_DIMENSION`](crate::constants::MAX_IMAGE_DIMENSION). Frame `n` is
//! presented at `n * fps_den / fps_num` seconds.

use crate::{
    constants::TICKS_PER_SECOND,
    error::{PacerError, Result},
    sources::VideoFrame,
    surface::{Surface, VideoImage},
    time::Timestamp,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::File,
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::Path,
};

pub const MAGIC: &[u8; 4] = b"RVID";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawVideoHeader {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
}

impl RawVideoHeader {
    /// `None` if the frame size is out of range.
    pub fn frame_bytes(&self) -> Option<usize> {
        Surface::byte_len(self.width, self.height)
    }

    /// Presentation time of frame `index`.
    pub fn timestamp(&self, index: u64) -> Timestamp {
        let ticks = index as i128 * self.fps_den as i128 * TICKS_PER_SECOND as i128
            / self.fps_num as i128;
        Timestamp::from_ticks(ticks as i64)
    }

    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Option<Self>> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Ok(None);
        }

        Ok(Some(RawVideoHeader {
            width: reader.read_u32::<LittleEndian>()?,
            height: reader.read_u32::<LittleEndian>()?,
            fps_num: reader.read_u32::<LittleEndian>()?,
            fps_den: reader.read_u32::<LittleEndian>()?,
        }))
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.width)?;
        writer.write_u32::<LittleEndian>(self.height)?;
        writer.write_u32::<LittleEndian>(self.fps_num)?;
        writer.write_u32::<LittleEndian>(self.fps_den)?;
        Ok(())
    }
}

/// Whether the file at `path` starts with the raw video magic.
pub fn is_raw_video(path: &Path) -> bool {
    let mut magic = [0; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut magic))
        .map(|_| &magic == MAGIC)
        .unwrap_or(false)
}

pub struct RawVideoReader<R> {
    reader: R,
    header: RawVideoHeader,
    frame_bytes: usize,
    next_index: u64,
    eof: bool,
}

impl RawVideoReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PacerError::open_failed(path, e))?;
        Self::new(BufReader::new(file)).map_err(|e| match e {
            PacerError::MediaOpenFailed { reason, .. } => PacerError::open_failed(path, reason),
            e => e,
        })
    }
}

impl<R: Read> RawVideoReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let header = match RawVideoHeader::read_from(&mut reader) {
            Ok(Some(header)) => header,
            Ok(None) => return Err(PacerError::open_failed("", "not a raw video stream")),
            Err(e) => return Err(PacerError::open_failed("", format!("bad header: {e}"))),
        };

        if header.width == 0 || header.height == 0 {
            return Err(PacerError::open_failed("", "zero-sized video"));
        }
        if header.fps_num == 0 || header.fps_den == 0 {
            return Err(PacerError::open_failed("", "invalid frame rate"));
        }
        let frame_bytes = header.frame_bytes().ok_or_else(|| {
            PacerError::open_failed(
                "",
                format!("frame size {}x{} out of range", header.width, header.height),
            )
        })?;

        Ok(RawVideoReader {
            reader,
            header,
            frame_bytes,
            next_index: 0,
            eof: false,
        })
    }

    pub fn header(&self) -> RawVideoHeader {
        self.header
    }

    /// Read the next frame, `None` at end of stream.
    ///
    /// A truncated final frame counts as end of stream.
    pub fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.eof {
            return Ok(None);
        }

        let mut data = vec![0; self.frame_bytes];
        match self.reader.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.eof = true;
                return Ok(None);
            }
            Err(e) => return Err(PacerError::Decode(format!("reading video frame: {e}"))),
        }

        let surface = Surface::from_bgra(self.header.width, self.header.height, data)
            .ok_or_else(|| PacerError::Decode("frame size mismatch".to_string()))?;
        let timestamp = self.header.timestamp(self.next_index);
        self.next_index += 1;

        Ok(Some(VideoFrame {
            timestamp,
            image: VideoImage::Owned(surface),
        }))
    }
}

/// Writes raw BGRA frame files.
pub struct RawVideoWriter<W: Write> {
    writer: W,
    header: RawVideoHeader,
}

impl RawVideoWriter<BufWriter<File>> {
    pub fn create(path: &Path, header: RawVideoHeader) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> RawVideoWriter<W> {
    pub fn new(mut writer: W, header: RawVideoHeader) -> Result<Self> {
        header.write_to(&mut writer)?;
        Ok(RawVideoWriter { writer, header })
    }

    pub fn write_frame(&mut self, frame: &Surface) -> Result<()> {
        if frame.width() != self.header.width || frame.height() != self.header.height {
            return Err(PacerError::InvalidConfig(format!(
                "frame is {}x{}, stream is {}x{}",
                frame.width(),
                frame.height(),
                self.header.width,
                self.header.height
            )));
        }
        self.writer.write_all(frame.data())?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
