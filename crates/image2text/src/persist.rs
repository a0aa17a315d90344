use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::{config::AppConfig, error::Image2TextError};

/// Stem used when the first input has no usable name.
pub const FALLBACK_STEM: &str = "image";

/// Extension of the persisted text files.
pub const EXTENSION: &str = "txt";

/// The output file name for a name hint: its stem plus `.txt`.
///
/// # Example
///
/// ```
/// use image2text::file_name_for;
///
/// assert_eq!(file_name_for(Some("uploads/photo.png")), "photo.txt");
/// assert_eq!(file_name_for(Some("")), "image.txt");
/// assert_eq!(file_name_for(None), "image.txt");
/// ```
pub fn file_name_for(name_hint: Option<&str>) -> String {
    let stem = name_hint
        .and_then(|hint| Path::new(hint.trim()).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_string());
    format!("{stem}.{EXTENSION}")
}

/// Write `text` as UTF-8 to `<output_dir>/<stem of name_hint>.txt`.
///
/// An existing file is overwritten.
///
/// # Errors
///
/// [`Image2TextError::PersistenceFailed`] when the file cannot be written.
pub fn save(
    text: &str,
    name_hint: Option<&str>,
    output_dir: &Path,
) -> Result<PathBuf, Image2TextError> {
    let path = output_dir.join(file_name_for(name_hint));
    std::fs::write(&path, text.as_bytes()).map_err(|source| Image2TextError::PersistenceFailed {
        path: path.clone(),
        source,
    })?;
    info!("saved {} bytes to {}", text.len(), path.display());
    Ok(path)
}

/// Output directory resolution.
pub struct OutputDir;

impl OutputDir {
    /// Directory name used under the system temporary directory as a last resort.
    pub const TEMP_SUBDIR: &'static str = "image2text";

    /// Pick the output directory.
    ///
    /// The explicit directory is preferred, then `default`. The first of them that
    /// can be created and written to is returned. If neither is usable the process
    /// temporary directory is used. Resolution itself never fails; a directory that
    /// turns out to be unusable surfaces when writing.
    pub fn resolve(explicit: Option<&Path>, default: &Path) -> PathBuf {
        for candidate in explicit.into_iter().chain(std::iter::once(default)) {
            let candidate = absolute(candidate);
            match Self::prepare(&candidate) {
                Ok(()) => return candidate,
                Err(e) => warn!("output directory {} is not usable: {e}", candidate.display()),
            }
        }

        let fallback = std::env::temp_dir().join(Self::TEMP_SUBDIR);
        if let Err(e) = Self::prepare(&fallback) {
            warn!("output directory {} is not usable: {e}", fallback.display());
        }
        fallback
    }

    // create the directory and check that a file can be written to it
    fn prepare(dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        tempfile::NamedTempFile::new_in(dir)?;
        Ok(())
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Writes results into a directory resolved once at construction.
#[derive(Clone, Debug)]
pub struct ResultPersister {
    output_dir: PathBuf,
}

impl ResultPersister {
    /// Write into `output_dir` as is, without resolution.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Resolve the output directory of `config` with [`OutputDir::resolve`].
    pub fn from_config(config: &AppConfig) -> Self {
        let output_dir =
            OutputDir::resolve(config.output_dir.as_deref(), &config.default_output_dir);
        info!("writing results to {}", output_dir.display());
        Self { output_dir }
    }

    /// The directory results are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `text` named after `name_hint`. See [`save`].
    pub fn save(&self, text: &str, name_hint: Option<&str>) -> Result<PathBuf, Image2TextError> {
        save(text, name_hint, &self.output_dir)
    }
}
