//! Unit tests for the surface module

#[cfg(test)]
mod tests {
    use crate::surface::{Surface, TargetImage, VideoImage, BYTES_PER_PIXEL};

    const RED: [u8; 4] = [0x00, 0x00, 0xff, 0xff];
    const BLUE: [u8; 4] = [0xff, 0x00, 0x00, 0xff];

    impl Surface {
        pub(crate) fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
            if x >= self.width() || y >= self.height() {
                return None;
            }
            let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
            let mut px = [0; 4];
            px.copy_from_slice(&self.data()[offset..offset + BYTES_PER_PIXEL]);
            Some(px)
        }
    }

    #[test]
    fn test_byte_len_is_bounded() {
        assert_eq!(Surface::byte_len(1920, 1080), Some(1920 * 1080 * 4));
        assert_eq!(Surface::byte_len(16384, 16384), Some(16384 * 16384 * 4));
        assert_eq!(Surface::byte_len(16385, 1), None);
        assert_eq!(Surface::byte_len(u32::MAX, u32::MAX), None);
    }

    #[test]
    fn test_surface_from_bgra_checks_length() {
        assert!(Surface::from_bgra(2, 2, vec![0; 16]).is_some());
        assert!(Surface::from_bgra(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn test_surface_fill_and_pixel() {
        let mut surface = Surface::new(3, 2);
        assert_eq!(surface.pixel(0, 0), Some([0; 4]));

        surface.fill(RED);
        assert_eq!(surface.pixel(2, 1), Some(RED));
        assert_eq!(surface.pixel(3, 0), None);
        assert_eq!(surface.stride(), 12);
    }

    #[test]
    fn test_copy_into_larger_target() {
        let target = TargetImage::new(4, 4);
        target.copy_from(&VideoImage::Owned(Surface::filled(2, 2, RED)));

        let image = target.lock();
        assert_eq!(image.pixel(1, 1), Some(RED));
        assert_eq!(image.pixel(2, 1), Some([0; 4]));
        assert_eq!(image.pixel(1, 2), Some([0; 4]));
    }

    #[test]
    fn test_copy_into_smaller_target() {
        let target = TargetImage::new(2, 2);
        target.copy_from(&VideoImage::Owned(Surface::filled(8, 8, BLUE)));

        assert_eq!(target.dimensions(), (2, 2));
        assert!(target
            .lock()
            .data()
            .chunks_exact(4)
            .all(|px| px == BLUE));
    }

    #[test]
    fn test_copy_from_shared_image() {
        let decoder_image = TargetImage::from_surface(Surface::filled(4, 4, BLUE));
        let target = TargetImage::new(4, 4);

        target.copy_from(&VideoImage::Shared(decoder_image.clone()));
        assert_eq!(target.lock().pixel(3, 3), Some(BLUE));

        // Both locks are released after the copy
        decoder_image.lock().fill(RED);
        target.copy_from(&VideoImage::Shared(decoder_image));
        assert_eq!(target.lock().pixel(0, 0), Some(RED));
    }

    #[test]
    fn test_copy_from_itself_does_not_deadlock() {
        let target = TargetImage::from_surface(Surface::filled(2, 2, RED));
        target.copy_from(&VideoImage::Shared(target.clone()));
        assert_eq!(target.lock().pixel(0, 0), Some(RED));
    }
}
