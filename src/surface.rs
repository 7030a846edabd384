//! Video images.
//!
//! A [`Surface`] is a BGRA8 image in memory. Images that are read or written
//! from more than one execution context live in a [`TargetImage`], whose
//! lock is only reachable through [`TargetImage::lock`]. Copies between two
//! shared images always lock the input before the output.

use crate::{constants::MAX_IMAGE_DIMENSION, time::PoisonlessLock};
use std::{
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex, MutexGuard},
};

pub const BYTES_PER_PIXEL: usize = 4;

/// BGRA8 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Size in bytes of a `width` x `height` image, `None` if either side is
    /// larger than [`MAX_IMAGE_DIMENSION`].
    pub fn byte_len(width: u32, height: u32) -> Option<usize> {
        if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
            return None;
        }
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(BYTES_PER_PIXEL)
    }

    /// Allocate a black, fully transparent image.
    ///
    /// Sizes from outside the process are checked with [`Surface::byte_len`]
    /// before they get here.
    pub fn new(width: u32, height: u32) -> Self {
        Surface {
            width,
            height,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Wrap existing pixel data. Returns `None` if `data` does not hold
    /// exactly `width * height` pixels.
    pub fn from_bgra(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if Surface::byte_len(width, height) != Some(data.len()) {
            return None;
        }
        Some(Surface {
            width,
            height,
            data,
        })
    }

    /// Allocate an image filled with one colour.
    pub fn filled(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let mut surface = Surface::new(width, height);
        surface.fill(bgra);
        surface
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn fill(&mut self, bgra: [u8; 4]) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&bgra);
        }
    }

    /// Copy the top-left region both images have in common.
    pub fn copy_region_from(&mut self, src: &Surface) {
        let row_bytes = self.width.min(src.width) as usize * BYTES_PER_PIXEL;
        let rows = self.height.min(src.height) as usize;
        let (src_stride, dst_stride) = (src.stride(), self.stride());

        for row in 0..rows {
            let s = row * src_stride;
            let d = row * dst_stride;
            self.data[d..d + row_bytes].copy_from_slice(&src.data[s..s + row_bytes]);
        }
    }
}

/// Image shared between the pacing loop and whoever reads it for
/// submission.
#[derive(Clone, Debug)]
pub struct TargetImage {
    inner: Arc<Mutex<Surface>>,
}

impl TargetImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_surface(Surface::new(width, height))
    }

    pub fn from_surface(surface: Surface) -> Self {
        TargetImage {
            inner: Arc::new(Mutex::new(surface)),
        }
    }

    /// Acquire exclusive access until the guard is dropped.
    pub fn lock(&self) -> SurfaceGuard<'_> {
        SurfaceGuard {
            guard: self.inner.plock(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let surface = self.lock();
        (surface.width(), surface.height())
    }

    /// Copy a frame into this image.
    ///
    /// A shared input is locked first, then this image; both stay locked for
    /// the duration of the copy only.
    pub fn copy_from(&self, image: &VideoImage) {
        match image {
            VideoImage::Owned(src) => {
                let mut dst = self.lock();
                dst.copy_region_from(src);
            }
            VideoImage::Shared(src) => {
                if Arc::ptr_eq(&src.inner, &self.inner) {
                    return;
                }
                let src = src.lock();
                let mut dst = self.lock();
                dst.copy_region_from(&src);
            }
        }
    }
}

/// Scoped access to a [`TargetImage`].
pub struct SurfaceGuard<'a> {
    guard: MutexGuard<'a, Surface>,
}

impl Deref for SurfaceGuard<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        &self.guard
    }
}

impl DerefMut for SurfaceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        &mut self.guard
    }
}

/// Image carried by a decoded video frame.
#[derive(Clone, Debug)]
pub enum VideoImage {
    /// Owned by the frame; released once the frame is dropped.
    Owned(Surface),
    /// Owned by the decoder and possibly written from another context.
    Shared(TargetImage),
}

impl VideoImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            VideoImage::Owned(surface) => (surface.width(), surface.height()),
            VideoImage::Shared(image) => image.dimensions(),
        }
    }
}
