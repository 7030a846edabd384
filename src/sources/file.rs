use crate::{
    error::{PacerError, Result},
    format::AudioFormat,
    sources::{
        raw_video::{self, RawVideoReader},
        symphonia::SymphoniaAudio,
        RawAudioSample, SampleSource, VideoFrame,
    },
};
use std::{fs::File, io::BufReader, path::Path};

/// Media read from files: at most one video track (raw BGRA frame file)
/// and at most one audio track (anything symphonia decodes).
pub struct FileSource {
    video: Option<RawVideoReader<BufReader<File>>>,
    audio: Option<SymphoniaAudio>,
}

impl FileSource {
    /// Open a single file, which supplies either the video or the audio
    /// track depending on its contents.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PacerError::open_failed(path, "file does not exist"));
        }
        if raw_video::is_raw_video(path) {
            Self::open_tracks(Some(path), None)
        } else {
            Self::open_tracks(None, Some(path))
        }
    }

    /// Open a video track and an audio track from separate files.
    pub fn open_tracks(video: Option<&Path>, audio: Option<&Path>) -> Result<Self> {
        if video.is_none() && audio.is_none() {
            return Err(PacerError::open_failed("", "no video or audio track configured"));
        }

        let video = video.map(RawVideoReader::open).transpose()?;
        let audio = audio.map(SymphoniaAudio::open).transpose()?;

        if let Some(video) = &video {
            let header = video.header();
            debug!(
                "Opened video track: {}x{} at {}/{} fps",
                header.width, header.height, header.fps_num, header.fps_den
            );
        }

        Ok(FileSource { video, audio })
    }
}

impl SampleSource for FileSource {
    fn video_size(&self) -> Option<(u32, u32)> {
        self.video.as_ref().map(|v| {
            let header = v.header();
            (header.width, header.height)
        })
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        self.audio.as_ref().map(|a| a.format())
    }

    fn next_video_frame(&mut self) -> Result<Option<VideoFrame>> {
        match &mut self.video {
            Some(video) => video.next_frame(),
            None => Ok(None),
        }
    }

    fn next_audio_sample(&mut self) -> Result<Option<RawAudioSample>> {
        match &mut self.audio {
            Some(audio) => audio.next_sample(),
            None => Ok(None),
        }
    }
}
