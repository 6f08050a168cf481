// MP4 DEMUXER - Track table and per-track sample cursors
//
// Only what playback needs from ISO BMFF:
//   ftyp  → major brand (informational)
//   moov  → mvhd + trak (tkhd, mdia/mdhd, hdlr, minf/stbl)
//   mdat  → never loaded wholesale, samples are fetched one read at a time
//
// The sample table is flattened at open into one entry per sample so reads,
// cursors and seeks all work on plain indices.

mod parser;
mod sample_table;
mod track;

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, ErrorSlot, Result};
use crate::source::{read_exact_at, ByteSource, FileSource};

pub use parser::{fourcc_str, read_box_header, BoxHeader};
pub use sample_table::SampleEntry;
pub use track::{AudioParams, Codec, CodecConfig, Track, TrackKind, VideoParams};

use parser::{find_child, BoxCursor, ChildBoxes, FTYP, MDAT, MOOV, MVHD, TRAK};
use track::{parse_trak, ParsedTrack};

/// Upper bound on the `moov` payload read into memory.
const MAX_MOOV_SIZE: u64 = 256 * 1024 * 1024;

/// One compressed sample. Owned by the caller for a single decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub data: Vec<u8>,
    /// Decode timestamp in track ticks.
    pub timestamp: u64,
    pub duration: u32,
    pub composition_offset: i32,
    pub is_keyframe: bool,
}

/// Serializable summary of an opened file.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub major_brand: Option<String>,
    pub file_size: u64,
    pub movie_timescale: u32,
    pub duration: f64,
    pub tracks: Vec<Track>,
}

struct TrackState {
    parsed: ParsedTrack,
    cursor: usize,
}

pub struct Mp4Demuxer {
    source: Box<dyn ByteSource>,
    tracks: Vec<TrackState>,
    major_brand: Option<String>,
    movie_timescale: u32,
    movie_duration: u64,
    /// Index of the track whose reads drive `current_time`.
    clock_track: usize,
    current_time: f64,
    error: ErrorSlot,
}

impl std::fmt::Debug for Mp4Demuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4Demuxer")
            .field("tracks", &self.tracks.len())
            .field("duration", &self.duration())
            .field("current_time", &self.current_time)
            .finish()
    }
}

impl Mp4Demuxer {
    /// Open a file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let source = FileSource::open(path).map_err(|e| Error::from_open(&name, e))?;
        let demuxer = Self::from_source(source)?;
        tracing::info!(
            "Opened {}: {} track(s), {:.3}s",
            name,
            demuxer.tracks.len(),
            demuxer.duration()
        );
        Ok(demuxer)
    }

    /// Open any random-access byte source.
    pub fn from_source<S: ByteSource + 'static>(source: S) -> Result<Self> {
        let mut demuxer = Self {
            source: Box::new(source),
            tracks: Vec::new(),
            major_brand: None,
            movie_timescale: 0,
            movie_duration: 0,
            clock_track: 0,
            current_time: 0.0,
            error: ErrorSlot::new(),
        };
        demuxer.parse_top_level()?;

        if demuxer.tracks.is_empty() {
            return Err(Error::UnsupportedFormat("no audio or video tracks".into()));
        }
        demuxer.clock_track = demuxer
            .tracks
            .iter()
            .position(|t| t.parsed.track.is_h264_video())
            .or_else(|| {
                demuxer
                    .tracks
                    .iter()
                    .position(|t| t.parsed.track.kind == TrackKind::Video)
            })
            .unwrap_or(0);

        for t in &demuxer.tracks {
            let track = &t.parsed.track;
            tracing::debug!(
                "track {}: {:?} {:?} timescale={} samples={} duration={:.3}s",
                track.track_id,
                track.kind,
                track.codec,
                track.timescale,
                track.sample_count,
                track.duration
            );
        }
        Ok(demuxer)
    }

    fn read_range(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let len = usize::try_from(len)
            .map_err(|_| Error::UnsupportedFormat(format!("box of {} bytes", len)))?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|e| Error::OutOfMemory(format!("{} byte read: {}", len, e)))?;
        buf.resize(len, 0);
        read_exact_at(self.source.as_mut(), offset, &mut buf)
            .map_err(|e| Error::FileOpenFailed(format!("read at {}: {}", offset, e)))?;
        Ok(buf)
    }

    fn parse_top_level(&mut self) -> Result<()> {
        let file_size = self.source.len();
        let mut pos = 0u64;
        let mut saw_moov = false;

        while pos + 8 <= file_size {
            let mut head = [0u8; 16];
            let avail = self
                .source
                .read_at(pos, &mut head)
                .map_err(|e| Error::FileOpenFailed(format!("read at {}: {}", pos, e)))?;
            let header = match read_box_header(&head[..avail]) {
                Ok(h) => h,
                Err(e) if pos == 0 => {
                    return Err(Error::UnsupportedFormat(format!("not an MP4 file: {}", e)))
                }
                Err(e) => {
                    tracing::warn!("stopping box walk at {}: {}", pos, e);
                    break;
                }
            };

            let size = if header.size == 0 { file_size - pos } else { header.size };
            let payload_start = pos + header.header_size;
            let payload_len = size.saturating_sub(header.header_size);

            let end = match pos.checked_add(size) {
                Some(end) => end,
                None if saw_moov => break,
                None => {
                    return Err(Error::UnsupportedFormat(format!(
                        "box '{}' at {} has size {}",
                        fourcc_str(&header.box_type),
                        pos,
                        size
                    )))
                }
            };
            if end > file_size && header.box_type != MDAT {
                if header.box_type == MOOV || !saw_moov {
                    return Err(Error::UnsupportedFormat(format!(
                        "box '{}' at {} runs past end of file",
                        fourcc_str(&header.box_type),
                        pos
                    )));
                }
                break;
            }

            match header.box_type {
                FTYP if payload_len >= 4 => {
                    let brand = self.read_range(payload_start, 4)?;
                    self.major_brand = Some(String::from_utf8_lossy(&brand).into_owned());
                }
                MOOV => {
                    if payload_len > MAX_MOOV_SIZE {
                        return Err(Error::UnsupportedFormat(format!(
                            "moov of {} bytes",
                            payload_len
                        )));
                    }
                    let moov = self.read_range(payload_start, payload_len)?;
                    self.parse_moov(&moov)?;
                    saw_moov = true;
                }
                _ => {}
            }

            pos = end;
        }

        if !saw_moov {
            return Err(Error::UnsupportedFormat("missing moov box".into()));
        }
        Ok(())
    }

    fn parse_moov(&mut self, moov: &[u8]) -> Result<()> {
        if let Some(mvhd) = find_child(moov, MVHD)? {
            let mut c = BoxCursor::new(mvhd, "mvhd");
            let (version, _) = c.full_box_header()?;
            if version == 1 {
                c.skip(16)?;
                self.movie_timescale = c.u32()?;
                self.movie_duration = c.u64_split()?;
            } else {
                c.skip(8)?;
                self.movie_timescale = c.u32()?;
                self.movie_duration = c.u32()? as u64;
            }
        }

        let mut index = 0u32;
        for child in ChildBoxes::new(moov) {
            let (header, payload) = child?;
            if header.box_type != TRAK {
                continue;
            }
            index += 1;
            if let Some(parsed) = parse_trak(payload, index)? {
                self.tracks.push(TrackState { parsed, cursor: 0 });
            }
        }
        Ok(())
    }

    fn state(&self, track_id: u32) -> Option<&TrackState> {
        self.tracks.iter().find(|t| t.parsed.track.track_id == track_id)
    }

    fn state_index(&self, track_id: u32) -> Result<usize> {
        self.tracks
            .iter()
            .position(|t| t.parsed.track.track_id == track_id)
            .ok_or_else(|| Error::InvalidParam(format!("no track with id {}", track_id)))
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().map(|t| &t.parsed.track)
    }

    pub fn track(&self, track_id: u32) -> Option<&Track> {
        self.state(track_id).map(|t| &t.parsed.track)
    }

    /// First H.264 video track.
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks().find(|t| t.is_h264_video())
    }

    /// First AAC audio track.
    pub fn audio_track(&self) -> Option<&Track> {
        self.tracks().find(|t| t.is_aac_audio())
    }

    pub fn sample_count(&self, track_id: u32) -> usize {
        self.state(track_id).map(|t| t.parsed.samples.len()).unwrap_or(0)
    }

    /// Index of the next sample `read_next_sample` will return.
    pub fn cursor(&self, track_id: u32) -> Option<usize> {
        self.state(track_id).map(|t| t.cursor)
    }

    /// Codec configuration needed before payload samples can be decoded.
    pub fn extract_config_record(&self, track_id: u32) -> Option<CodecConfig> {
        self.state(track_id).and_then(|t| t.parsed.config.clone())
    }

    /// Next sample of `track_id` in container order, or `None` at end of track.
    pub fn read_next_sample(&mut self, track_id: u32) -> Result<Option<Sample>> {
        let result = self.read_next_sample_inner(track_id);
        self.error.track(result)
    }

    fn read_next_sample_inner(&mut self, track_id: u32) -> Result<Option<Sample>> {
        let idx = self.state_index(track_id)?;
        let state = &mut self.tracks[idx];
        let Some(entry) = state.parsed.samples.get(state.cursor).copied() else {
            return Ok(None);
        };
        // Advance first so a bad sample cannot wedge the cursor.
        state.cursor += 1;
        let timescale = state.parsed.track.timescale;

        let mut data = Vec::new();
        data.try_reserve_exact(entry.size as usize)
            .map_err(|e| Error::OutOfMemory(format!("{} byte sample: {}", entry.size, e)))?;
        data.resize(entry.size as usize, 0);
        read_exact_at(self.source.as_mut(), entry.offset, &mut data).map_err(|e| {
            Error::DecodeFailed(format!(
                "track {} sample at {} ({} bytes): {}",
                track_id, entry.offset, entry.size, e
            ))
        })?;

        if idx == self.clock_track && timescale > 0 {
            self.current_time = entry.dts as f64 / timescale as f64;
        }

        Ok(Some(Sample {
            data,
            timestamp: entry.dts,
            duration: entry.duration,
            composition_offset: entry.composition_offset,
            is_keyframe: entry.is_keyframe,
        }))
    }

    /// Move every track cursor to the first sample at or after `t` seconds.
    ///
    /// Linear scan per track; not frame accurate.
    pub fn seek_to_time(&mut self, t: f64) -> Result<()> {
        if !t.is_finite() {
            let err = Error::InvalidParam(format!("seek target {}", t));
            self.error.set(err.clone());
            return Err(err);
        }
        let t = t.clamp(0.0, self.duration().max(0.0));

        if t == 0.0 {
            self.reset_cursors();
            return Ok(());
        }

        for state in &mut self.tracks {
            let timescale = state.parsed.track.timescale;
            if timescale == 0 {
                state.cursor = 0;
                continue;
            }
            let target = (t * timescale as f64) as u64;
            state.cursor = state
                .parsed
                .samples
                .iter()
                .position(|s| s.dts >= target)
                .unwrap_or(state.parsed.samples.len());
        }
        self.current_time = t;
        tracing::debug!("demuxer seek to {:.3}s", t);
        Ok(())
    }

    pub fn reset_cursors(&mut self) {
        for state in &mut self.tracks {
            state.cursor = 0;
        }
        self.current_time = 0.0;
    }

    /// Longest track duration in seconds, falling back to the movie header.
    pub fn duration(&self) -> f64 {
        let longest = self
            .tracks()
            .map(|t| t.duration)
            .fold(0.0f64, f64::max);
        if longest > 0.0 || self.movie_timescale == 0 {
            longest
        } else {
            self.movie_duration as f64 / self.movie_timescale as f64
        }
    }

    /// Timestamp of the most recently read video sample, or the last seek target.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn file_info(&self) -> FileInfo {
        FileInfo {
            major_brand: self.major_brand.clone(),
            file_size: self.source.len(),
            movie_timescale: self.movie_timescale,
            duration: self.duration(),
            tracks: self.tracks().cloned().collect(),
        }
    }

    pub fn last_error(&self) -> Option<crate::error::ErrorKind> {
        self.error.last_error()
    }

    pub fn last_message(&self) -> &str {
        self.error.last_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::source::MemorySource;
    use crate::testutil::MovieSpec;

    fn open(spec: &MovieSpec) -> Mp4Demuxer {
        Mp4Demuxer::from_source(MemorySource::new(spec.build())).expect("open")
    }

    #[test]
    fn test_track_table() {
        let demuxer = open(&MovieSpec::default());
        let video = demuxer.video_track().unwrap().clone();
        let audio = demuxer.audio_track().unwrap().clone();

        assert_eq!(video.codec, Codec::H264);
        assert_eq!(video.width(), 320);
        assert_eq!(video.height(), 240);
        assert_eq!(video.sample_count, 300);
        assert_eq!(audio.codec, Codec::Aac);
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.channels(), 2);
        assert!((demuxer.duration() - 10.0).abs() < 0.01);
        assert_eq!(demuxer.file_info().major_brand.as_deref(), Some("isom"));
    }

    #[test]
    fn test_config_records() {
        let demuxer = open(&MovieSpec::default());
        let video = demuxer.video_track().unwrap().track_id;
        let audio = demuxer.audio_track().unwrap().track_id;

        match demuxer.extract_config_record(video) {
            Some(CodecConfig::Avc(avc)) => {
                assert_eq!(avc.nal_length_size, 4);
                assert_eq!(avc.sps.len(), 1);
                assert_eq!(avc.pps.len(), 1);
            }
            other => panic!("unexpected config {:?}", other),
        }
        assert_eq!(
            demuxer.extract_config_record(audio),
            Some(CodecConfig::Aac(vec![0x12, 0x10]))
        );
        assert!(demuxer.extract_config_record(999).is_none());
    }

    #[test]
    fn test_monotonic_cursor_until_end() {
        let mut demuxer = open(&MovieSpec::default());
        let ids: Vec<u32> = demuxer.tracks().map(|t| t.track_id).collect();
        for id in ids {
            let mut last = 0u64;
            let mut count = 0;
            while let Some(sample) = demuxer.read_next_sample(id).unwrap() {
                assert!(sample.timestamp >= last);
                assert!(!sample.data.is_empty());
                last = sample.timestamp;
                count += 1;
            }
            assert_eq!(count, demuxer.sample_count(id));
            // End of track is sticky and not an error.
            assert!(demuxer.read_next_sample(id).unwrap().is_none());
            assert!(demuxer.last_error().is_none());
        }
    }

    #[test]
    fn test_sample_payload_matches_index() {
        let mut demuxer = open(&MovieSpec::default());
        let video = demuxer.video_track().unwrap().track_id;
        for i in 0..5u32 {
            let sample = demuxer.read_next_sample(video).unwrap().unwrap();
            assert_eq!(crate::testutil::video_frame_index(&sample.data), Some(i));
            assert_eq!(sample.is_keyframe, i == 0);
        }
    }

    #[test]
    fn test_current_time_follows_video() {
        let mut demuxer = open(&MovieSpec::default());
        let video = demuxer.video_track().unwrap().track_id;
        let audio = demuxer.audio_track().unwrap().track_id;
        for _ in 0..31 {
            demuxer.read_next_sample(video).unwrap();
        }
        assert!((demuxer.current_time() - 1.0).abs() < 1e-9);
        for _ in 0..100 {
            demuxer.read_next_sample(audio).unwrap();
        }
        assert!((demuxer.current_time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek() {
        let mut demuxer = open(&MovieSpec::default());
        let video = demuxer.video_track().unwrap().track_id;
        let audio = demuxer.audio_track().unwrap().track_id;

        demuxer.seek_to_time(5.0).unwrap();
        let v = demuxer.read_next_sample(video).unwrap().unwrap();
        assert!(v.timestamp as f64 / 90_000.0 >= 5.0);
        assert!(v.timestamp as f64 / 90_000.0 < 5.04);
        let a = demuxer.read_next_sample(audio).unwrap().unwrap();
        assert!(a.timestamp as f64 / 44_100.0 >= 5.0);

        // Past the end clamps to duration: nothing left to read on video.
        demuxer.seek_to_time(99.0).unwrap();
        assert!(demuxer.read_next_sample(video).unwrap().is_none());

        assert!(demuxer.seek_to_time(f64::NAN).is_err());
        assert_eq!(demuxer.last_error(), Some(ErrorKind::InvalidParam));
    }

    #[test]
    fn test_seek_to_zero_is_exact() {
        let mut demuxer = open(&MovieSpec::default());
        let video = demuxer.video_track().unwrap().track_id;
        let first = demuxer.read_next_sample(video).unwrap().unwrap();
        for _ in 0..40 {
            demuxer.read_next_sample(video).unwrap();
        }
        demuxer.seek_to_time(0.0).unwrap();
        assert_eq!(demuxer.cursor(video), Some(0));
        assert_eq!(demuxer.read_next_sample(video).unwrap().unwrap(), first);

        demuxer.seek_to_time(-3.0).unwrap();
        assert_eq!(demuxer.cursor(video), Some(0));
    }

    #[test]
    fn test_chunked_co64_and_long_mdhd() {
        let spec = MovieSpec {
            samples_per_chunk: 5,
            use_co64: true,
            mdhd_v1: true,
            ..MovieSpec::default()
        };
        let mut demuxer = open(&spec);
        let video = demuxer.video_track().unwrap().track_id;
        assert!((demuxer.duration() - 10.0).abs() < 0.01);
        for i in 0..12u32 {
            let s = demuxer.read_next_sample(video).unwrap().unwrap();
            assert_eq!(crate::testutil::video_frame_index(&s.data), Some(i));
        }
    }

    #[test]
    fn test_video_only() {
        let spec = MovieSpec {
            audio: false,
            duration_secs: 2.0,
            ..MovieSpec::default()
        };
        let demuxer = open(&spec);
        assert!(demuxer.audio_track().is_none());
        assert_eq!(demuxer.tracks().count(), 1);
        assert!((demuxer.duration() - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_rejects_non_mp4() {
        let err = Mp4Demuxer::from_source(MemorySource::new(b"hello, this is not a movie".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

        let err = Mp4Demuxer::from_source(MemorySource::new(Vec::<u8>::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_rejects_oversized_largesize_box() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&16u32.to_be_bytes());
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(b"isom");
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());

        let err = Mp4Demuxer::from_source(MemorySource::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_rejects_file_without_tracks() {
        let spec = MovieSpec {
            audio: false,
            video: false,
            ..MovieSpec::default()
        };
        let err = Mp4Demuxer::from_source(MemorySource::new(spec.build())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_open_missing_file() {
        let err = Mp4Demuxer::open("/definitely/not/here.mp4").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_open_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut tmp, &MovieSpec::default().build()).unwrap();
        let mut demuxer = Mp4Demuxer::open(tmp.path()).unwrap();
        let video = demuxer.video_track().unwrap().track_id;
        assert!(demuxer.read_next_sample(video).unwrap().is_some());
    }

    #[test]
    fn test_truncated_mdat_reports_read_error() {
        let mut bytes = MovieSpec::default().build();
        bytes.truncate(bytes.len() - 4000);
        let mut demuxer = Mp4Demuxer::from_source(MemorySource::new(bytes)).unwrap();
        let video = demuxer.video_track().unwrap().track_id;
        let total = demuxer.sample_count(video);

        let mut errors = 0;
        for _ in 0..total {
            if demuxer.read_next_sample(video).is_err() {
                errors += 1;
            }
        }
        assert!(errors > 0);
        assert_eq!(demuxer.last_error(), Some(ErrorKind::DecodeFailed));
        assert!(demuxer.read_next_sample(video).unwrap().is_none());
    }
}
