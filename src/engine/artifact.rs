// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Durable output of synthesized audio.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::error::ArtifactError;
use super::RawAudio;
use crate::tasks::{ResultLocator, TaskId};

/// Persists raw engine output and returns where it landed.
///
/// Blocking; invoked off the async executor.
pub trait ArtifactWriter: Send + Sync + 'static {
    fn persist(&self, task_id: &TaskId, audio: RawAudio) -> Result<ResultLocator, ArtifactError>;
}

/// Writes 16-bit mono PCM WAV files into one directory.
///
/// Files are named `tts_{task_id}_{unix_seconds}.wav`.
#[derive(Debug, Clone)]
pub struct WavArtifactWriter {
    output_dir: PathBuf,
}

impl WavArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn file_name(task_id: &TaskId) -> String {
        format!("tts_{}_{}.wav", task_id, Utc::now().timestamp())
    }
}

fn to_pcm16(sample: f32) -> i16 {
    let clamped = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
    (clamped * f32::from(i16::MAX)) as i16
}

fn write_wav(path: &Path, audio: &RawAudio) -> Result<(), ArtifactError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &audio.samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

impl ArtifactWriter for WavArtifactWriter {
    fn persist(&self, task_id: &TaskId, audio: RawAudio) -> Result<ResultLocator, ArtifactError> {
        if audio.samples.is_empty() {
            return Err(ArtifactError::EmptyAudio);
        }
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join(Self::file_name(task_id));
        if let Err(e) = write_wav(&path, &audio) {
            // Never leave a truncated file behind.
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }

        tracing::debug!(
            task_id = %task_id,
            path = %path.display(),
            duration_secs = audio.duration_secs(),
            "audio persisted"
        );
        Ok(ResultLocator::new(path))
    }
}
