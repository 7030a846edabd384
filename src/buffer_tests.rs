//! Unit tests for the buffer module

#[cfg(test)]
mod tests {
    use crate::buffer::SampleFifo;

    #[test]
    fn test_fifo_starts_empty() {
        let mut fifo = SampleFifo::new(2);

        assert!(fifo.is_empty());
        assert_eq!(fifo.take(10), vec![Vec::<f64>::new(), Vec::new()]);
    }

    #[test]
    fn test_fifo_deinterleaves() {
        let mut fifo = SampleFifo::new(2);
        fifo.push_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);

        assert_eq!(fifo.frames(), 3);

        let chunk = fifo.take(2);
        assert_eq!(chunk[0], vec![0.1f32 as f64, 0.2f32 as f64]);
        assert_eq!(chunk[1], vec![-0.1f32 as f64, -0.2f32 as f64]);
        assert_eq!(fifo.frames(), 1);
    }

    #[test]
    fn test_fifo_drops_partial_frame() {
        let mut fifo = SampleFifo::new(2);
        fifo.push_interleaved(&[0.5, 0.5, 0.5]);

        assert_eq!(fifo.frames(), 1);
    }

    #[test]
    fn test_fifo_take_more_than_available() {
        let mut fifo = SampleFifo::new(1);
        fifo.push_interleaved(&[1.0, 2.0]);

        let chunk = fifo.take(5);
        assert_eq!(chunk, vec![vec![1.0, 2.0]]);
        assert!(fifo.is_empty());
        assert_eq!(fifo.total_frames_consumed(), 2);
    }

    #[test]
    fn test_fifo_survives_compaction() {
        let mut fifo = SampleFifo::new(1);
        let samples: Vec<f32> = (0..60_000).map(|i| (i % 100) as f32 / 100.0).collect();
        fifo.push_interleaved(&samples);

        // Crosses the compaction threshold
        for _ in 0..50 {
            fifo.take(1000);
        }

        assert_eq!(fifo.frames(), 10_000);
        let chunk = fifo.take(1);
        assert_eq!(chunk[0][0], samples[50_000] as f64);
        assert_eq!(fifo.total_frames_consumed(), 50_001);
    }
}
