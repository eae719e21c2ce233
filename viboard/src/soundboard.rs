//! Folder-backed soundboards.
//!
//! A soundboard mirrors the supported clip files of one folder. Refreshing
//! diffs the folder against the loaded assets: vanished files are dropped,
//! new files are loaded, and files still present keep their asset untouched,
//! hotkey and gain overrides included.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::audio::{is_supported, AudioError, AudioResult, SoundAsset, SoundId};

/// Process-unique identity of a soundboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoardId(u64);

impl BoardId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Stable reference to one sound on one board
///
/// Handles survive reordering and removal of other entries. A handle whose
/// board or sound is gone simply resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle {
    pub board: BoardId,
    pub sound: SoundId,
}

/// Supported clip files in `folder`, sorted by path
pub fn list_supported(folder: &Path) -> AudioResult<Vec<PathBuf>> {
    let unreadable = |e: std::io::Error| AudioError::FolderUnreadable {
        path: folder.to_path_buf(),
        reason: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(folder).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && is_supported(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// A folder and the clips loaded from it
#[derive(Debug)]
pub struct Soundboard {
    id: BoardId,
    path: PathBuf,
    sounds: Vec<SoundAsset>,
}

impl Soundboard {
    /// A board for `path` with no sounds loaded
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = std::path::absolute(&path).unwrap_or(path);
        Self {
            id: BoardId::next(),
            path,
            sounds: Vec::new(),
        }
    }

    /// Load every supported clip in `path`
    ///
    /// Files that fail to decode are skipped and reported; an unreadable
    /// folder yields an empty board and its error.
    pub fn scan(path: impl Into<PathBuf>) -> (Self, Vec<AudioError>) {
        let mut board = Self::empty(path);
        let errors = board.refresh();
        info!(
            "Loaded soundboard {} ({} sounds, {} errors)",
            board.path.display(),
            board.sounds.len(),
            errors.len()
        );
        (board, errors)
    }

    /// Rescan the folder and diff it against the loaded sounds
    ///
    /// If the folder can no longer be read every sound is dropped.
    pub fn refresh(&mut self) -> Vec<AudioError> {
        let files = match list_supported(&self.path) {
            Ok(files) => files,
            Err(e) => {
                warn!("{}", e);
                self.sounds.clear();
                return vec![e];
            }
        };

        let present: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
        let before = self.sounds.len();
        self.sounds.retain(|sound| present.contains(sound.path()));
        let removed = before - self.sounds.len();

        let tracked: HashSet<PathBuf> = self
            .sounds
            .iter()
            .map(|sound| sound.path().to_path_buf())
            .collect();

        let mut errors = Vec::new();
        let mut added = 0;
        for file in files.iter().filter(|file| !tracked.contains(*file)) {
            match SoundAsset::load(file) {
                Ok(sound) => {
                    self.sounds.push(sound);
                    added += 1;
                }
                Err(e) => {
                    warn!("{}", e);
                    errors.push(e);
                }
            }
        }

        debug!(
            board = %self.path.display(),
            added,
            removed,
            "Refreshed soundboard"
        );
        errors
    }

    pub fn id(&self) -> BoardId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder name shown to the user
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn sounds(&self) -> &[SoundAsset] {
        &self.sounds
    }

    pub fn sounds_mut(&mut self) -> &mut [SoundAsset] {
        &mut self.sounds
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn find(&self, id: SoundId) -> Option<&SoundAsset> {
        self.sounds.iter().find(|sound| sound.id() == id)
    }

    pub fn find_mut(&mut self, id: SoundId) -> Option<&mut SoundAsset> {
        self.sounds.iter_mut().find(|sound| sound.id() == id)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&SoundAsset> {
        self.sounds.iter().find(|sound| sound.path() == path)
    }

    /// Handle to the sound with `id` on this board
    pub fn handle(&self, id: SoundId) -> SoundHandle {
        SoundHandle {
            board: self.id,
            sound: id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_wav(path: &Path) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..16 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("b.wav"));
        write_wav(&dir.path().join("a.wav"));
        fs::write(dir.path().join("notes.txt"), "not audio").unwrap();
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let (board, errors) = Soundboard::scan(dir.path());
        assert!(errors.is_empty());
        let names: Vec<String> = board.sounds().iter().map(SoundAsset::name).collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }

    #[test]
    fn test_scan_reports_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("good.wav"));
        fs::write(dir.path().join("bad.wav"), "garbage").unwrap();

        let (board, errors) = Soundboard::scan(dir.path());
        assert_eq!(board.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AudioError::Decode { .. }));
    }

    #[test]
    fn test_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let (board, errors) = Soundboard::scan(dir.path().join("gone"));
        assert!(board.is_empty());
        assert!(matches!(errors[0], AudioError::FolderUnreadable { .. }));
    }

    #[test]
    fn test_refresh_keeps_existing_assets() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"));
        write_wav(&dir.path().join("b.wav"));

        let (mut board, _) = Soundboard::scan(dir.path());
        let a_id = board.sounds()[0].id();

        fs::remove_file(dir.path().join("b.wav")).unwrap();
        write_wav(&dir.path().join("c.wav"));
        assert!(board.refresh().is_empty());

        let names: Vec<String> = board.sounds().iter().map(SoundAsset::name).collect();
        assert_eq!(names, vec!["a.wav", "c.wav"]);
        assert_eq!(board.sounds()[0].id(), a_id);
    }

    #[test]
    fn test_refresh_of_deleted_folder_clears() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("board");
        fs::create_dir(&folder).unwrap();
        write_wav(&folder.join("a.wav"));

        let (mut board, _) = Soundboard::scan(&folder);
        assert_eq!(board.len(), 1);

        fs::remove_dir_all(&folder).unwrap();
        assert_eq!(board.refresh().len(), 1);
        assert!(board.is_empty());
    }

    #[test]
    fn test_handles() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"));
        let (board, _) = Soundboard::scan(dir.path());

        let id = board.sounds()[0].id();
        let handle = board.handle(id);
        assert_eq!(handle.board, board.id());
        assert!(board.find(handle.sound).is_some());
        assert_eq!(board.name(), dir.path().file_name().unwrap().to_string_lossy());
    }
}
