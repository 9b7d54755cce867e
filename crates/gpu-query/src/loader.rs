//! Shared library resolution.
//!
//! Every failure to open a library is reported as `None`: a missing vendor
//! library is an expected operating condition on machines without a GPU.

use std::ffi::OsStr;
use std::path::PathBuf;

use libloading::Library;

/// Where to look for a shared library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// Base name without extension, e.g. `libcudart`. The platform suffix is
    /// appended and the dynamic linker search path is used.
    Name(&'static str),
    /// Exact file name or path, loaded verbatim.
    Path(PathBuf),
}

/// Returns the platform-specific file name for `name`, or `None` on
/// platforms without a known convention.
pub fn library_file_name(name: &str) -> Option<String> {
    if cfg!(target_os = "linux") {
        Some(format!("{name}.so"))
    } else if cfg!(target_os = "macos") {
        Some(format!("{name}.dylib"))
    } else {
        None
    }
}

/// Loads `name` using the platform naming convention.
pub fn load(name: &str) -> Option<Library> {
    let Some(file_name) = library_file_name(name) else {
        tracing::debug!("No shared library convention for this platform, skipping {name}");
        return None;
    };
    open(file_name)
}

/// Opens a library by exact file name or path.
pub fn open(path: impl AsRef<OsStr>) -> Option<Library> {
    let path = path.as_ref();
    match open_library(path) {
        Ok(library) => Some(library),
        Err(err) => {
            tracing::debug!(error = %err, "Failed to load {}", path.to_string_lossy());
            None
        }
    }
}

/// Tries each source in order and returns the first library that loads.
///
/// A configured path that fails to load is reported at warn level before
/// falling back to the next source.
pub fn load_first(sources: &[LibrarySource]) -> Option<Library> {
    sources.iter().find_map(|source| match source {
        LibrarySource::Name(name) => load(name),
        LibrarySource::Path(path) => match open_library(path.as_os_str()) {
            Ok(library) => Some(library),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load {}", path.display());
                None
            }
        },
    })
}

fn open_library(path: &OsStr) -> Result<Library, libloading::Error> {
    // SAFETY: vendor libraries run only their own initializers on load.
    let library = unsafe { Library::new(path) }?;
    tracing::debug!("Loaded {}", path.to_string_lossy());
    Ok(library)
}
