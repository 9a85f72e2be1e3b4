//! Collaborator interfaces for obtaining audio, with file-backed implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::audio::decoder;
use crate::pronunciation::{ErrorKind, PronunciationError, Result};
use crate::types::AudioSignal;

const REFERENCE_EXTENSIONS: [&str; 4] = ["wav", "flac", "ogg", "mp3"];

/// Looks up the native-speaker recording for a word.
pub trait ReferenceAudioProvider: Send + Sync {
    /// `Ok(None)` when no recording exists for `word`.
    fn get(&self, word: &str) -> Result<Option<AudioSignal>>;
}

/// Turns an uploaded recording into a mono waveform.
pub trait UserAudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<AudioSignal>;
}

impl ReferenceAudioProvider for HashMap<String, AudioSignal> {
    fn get(&self, word: &str) -> Result<Option<AudioSignal>> {
        Ok(HashMap::get(self, word).cloned())
    }
}

/// Reference recordings stored as `<dir>/<word>.<ext>`.
#[derive(Debug, Clone)]
pub struct DirectoryReferenceProvider {
    root: PathBuf,
}

impl DirectoryReferenceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, word: &str) -> Option<PathBuf> {
        REFERENCE_EXTENSIONS
            .iter()
            .map(|extension| self.root.join(format!("{word}.{extension}")))
            .find(|candidate| candidate.is_file())
    }
}

impl ReferenceAudioProvider for DirectoryReferenceProvider {
    fn get(&self, word: &str) -> Result<Option<AudioSignal>> {
        let word = word.trim().to_lowercase();
        let safe = !word.is_empty()
            && word
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '\'');
        if !safe {
            warn!(word = %word, "rejecting reference lookup for malformed word");
            return Ok(None);
        }
        let Some(path) = self.locate(&word) else {
            debug!(word = %word, root = %self.root.display(), "no reference recording found");
            return Ok(None);
        };
        decoder::decode_file(&path).map(Some).map_err(|err| {
            PronunciationError::new(
                ErrorKind::MissingReference,
                format!("reference recording for '{word}' is unreadable: {err:#}"),
            )
        })
    }
}

/// Container-agnostic decoder backed by symphonia.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    extension_hint: Option<String>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hint the container format (e.g. "wav", "webm") to speed up probing.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension_hint: Some(extension.into()),
        }
    }
}

impl UserAudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioSignal> {
        decoder::decode_bytes(bytes.to_vec(), self.extension_hint.as_deref()).map_err(|err| {
            match err.downcast_ref::<PronunciationError>() {
                Some(inner) => inner.clone(),
                None => PronunciationError::new(
                    ErrorKind::InvalidSignal,
                    format!("could not decode audio: {err:#}"),
                ),
            }
        })
    }
}
