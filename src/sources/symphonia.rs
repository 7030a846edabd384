//! Audio track decoding through symphonia.

use crate::{
    constants::TICKS_PER_SECOND,
    error::{PacerError, Result},
    format::AudioFormat,
    sources::RawAudioSample,
    time::Timestamp,
};
use std::{fs::File, path::Path};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
    units::TimeBase,
};

/// Decoder for the first audio track of a media file.
pub struct SymphoniaAudio {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    audio_format: AudioFormat,
    sample_buf: Option<SampleBuffer<f32>>,
    frames_decoded: u64,
    /// First unit, decoded while opening to learn the native format
    pending: Option<RawAudioSample>,
    eof: bool,
}

impl SymphoniaAudio {
    /// Open `path` and select its first decodable audio track.
    ///
    /// The first packet is decoded immediately, so a file whose audio cannot
    /// be decoded fails here rather than mid-session.
    pub fn open(path: &Path) -> Result<Self> {
        // The MediaSource trait is automatically implemented for File.
        let file = File::open(path).map_err(|e| PacerError::open_failed(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Help the format registry guess the reader from the file extension.
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts: FormatOptions = Default::default();
        let metadata_opts: MetadataOptions = Default::default();
        let decoder_opts: DecoderOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| PacerError::open_failed(path, e))?;
        let format = probed.format;

        // Audio tracks are the ones that declare a sample rate.
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .ok_or_else(|| PacerError::open_failed(path, "no decodable audio track"))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &decoder_opts)
            .map_err(|e| PacerError::open_failed(path, e))?;

        let track_id = track.id;
        let time_base = track.codec_params.time_base;
        let audio_format = AudioFormat {
            sample_rate: track.codec_params.sample_rate.unwrap_or_default(),
            channels: track
                .codec_params
                .channels
                .map(|c| c.count() as u16)
                .unwrap_or_default(),
        };

        let mut audio = SymphoniaAudio {
            format,
            decoder,
            track_id,
            time_base,
            audio_format,
            sample_buf: None,
            frames_decoded: 0,
            pending: None,
            eof: false,
        };

        match audio.decode_next() {
            Ok(Some(first)) => {
                audio.audio_format = first.format;
                audio.pending = Some(first);
            }
            Ok(None) => return Err(PacerError::open_failed(path, "audio track is empty")),
            Err(e) => return Err(PacerError::open_failed(path, e)),
        }

        debug!(
            "Opened audio track {} of {}: {}",
            audio.track_id,
            path.display(),
            audio.audio_format
        );

        Ok(audio)
    }

    pub fn format(&self) -> AudioFormat {
        self.audio_format
    }

    pub fn next_sample(&mut self) -> Result<Option<RawAudioSample>> {
        if let Some(sample) = self.pending.take() {
            return Ok(Some(sample));
        }
        self.decode_next()
    }

    fn decode_next(&mut self) -> Result<Option<RawAudioSample>> {
        if self.eof {
            return Ok(None);
        }

        loop {
            // Symphonia returns UnexpectedEof even if the EOF was expected,
            // handle this gracefully
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            // If the packet does not belong to the selected track, skip it.
            if packet.track_id() != self.track_id {
                continue;
            }

            let packet_ts = packet.ts();
            let audio_buf = self.decoder.decode(&packet)?;
            let spec = *audio_buf.spec();
            let frames = audio_buf.frames();
            if frames == 0 {
                continue;
            }

            let format = AudioFormat {
                sample_rate: spec.rate,
                channels: spec.channels.count() as u16,
            };
            if self.frames_decoded > 0 && format != self.audio_format {
                return Err(PacerError::Decode(format!(
                    "audio format changed from {} to {format}",
                    self.audio_format
                )));
            }

            // Create (or grow) an interleaved f32 sample buffer matching the
            // decoded audio buffer. Note: this is capacity, not length!
            let needed = frames * spec.channels.count();
            if self.sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
                let duration = audio_buf.capacity() as u64;
                self.sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(audio_buf);

            let timestamp = match self.time_base {
                Some(tb) => {
                    let time = tb.calc_time(packet_ts);
                    Timestamp::from_ticks(
                        time.seconds as i64 * TICKS_PER_SECOND
                            + (time.frac * TICKS_PER_SECOND as f64) as i64,
                    )
                }
                None => Timestamp::from_frames(self.frames_decoded, format.sample_rate),
            };

            self.frames_decoded += frames as u64;
            self.audio_format = format;

            return Ok(Some(RawAudioSample {
                timestamp,
                format,
                samples: buf.samples().to_vec(),
            }));
        }
    }
}
