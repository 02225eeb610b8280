//! Binary artifact readers.
//!
//! - [`detect`]: magic-number sniffing ([`detect_format`])
//! - [`reader`]: symbol, section and shared-library dependency tables for
//!   ELF, Mach-O, PE and `ar` archives
//! - [`cursor`]: the bounds-checked byte cursor used by the hand-written
//!   parsers in [`crate::debuginfo::lightweight`]
//!
//! Every operation takes a path, reads the file in one scoped call and
//! returns `Err` without producing any partial output when the file is
//! missing, a directory, empty, unreadable or not in the expected format.

pub mod cursor;
mod detect;
mod reader;

pub use detect::{detect_file_format, detect_format, BinaryFormat};
pub use reader::{
    dependencies_from_bytes, extract_dependencies, extract_dependencies_as, extract_sections,
    extract_sections_as, extract_symbols, extract_symbols_as, file_type_of, inspect_bytes,
    sections_from_bytes, symbols_from_bytes, BinaryInspection,
};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why an input file could not be read as a binary artifact.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("file is empty: {0}")]
    EmptyFile(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("expected {expected} input, found {found}")]
    FormatMismatch {
        expected: BinaryFormat,
        found: BinaryFormat,
    },

    #[error("unrecognized binary format")]
    UnknownFormat,

    #[error("malformed {format} file: {message}")]
    Malformed {
        format: BinaryFormat,
        message: String,
    },
}

impl ExtractError {
    pub(crate) fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub(crate) fn malformed(format: BinaryFormat, err: impl std::fmt::Display) -> Self {
        Self::Malformed {
            format,
            message: err.to_string(),
        }
    }
}

/// Reject paths that cannot hold a binary before opening them.
pub(crate) fn check_input(path: &Path) -> Result<(), ExtractError> {
    let metadata = std::fs::metadata(path).map_err(|e| ExtractError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(ExtractError::NotAFile(path.to_path_buf()));
    }
    if metadata.len() == 0 {
        return Err(ExtractError::EmptyFile(path.to_path_buf()));
    }
    Ok(())
}

/// Read a whole input file. The handle is closed before this returns.
pub fn read_input(path: &Path) -> Result<Vec<u8>, ExtractError> {
    check_input(path)?;
    let data = std::fs::read(path).map_err(|e| ExtractError::from_io(path, e))?;
    if data.is_empty() {
        return Err(ExtractError::EmptyFile(path.to_path_buf()));
    }
    Ok(data)
}

pub(crate) fn ensure_format(data: &[u8], expected: BinaryFormat) -> Result<(), ExtractError> {
    let found = detect_format(data);
    if found == expected {
        Ok(())
    } else {
        Err(ExtractError::FormatMismatch { expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_input_rejects_directories_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_input(dir.path()),
            Err(ExtractError::NotAFile(_))
        ));

        let empty = dir.path().join("empty.o");
        std::fs::File::create(&empty).unwrap();
        assert!(matches!(read_input(&empty), Err(ExtractError::EmptyFile(_))));

        let missing = dir.path().join("missing.o");
        assert!(matches!(read_input(&missing), Err(ExtractError::NotFound(_))));
    }

    #[test]
    fn test_read_input_returns_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x7fELF").unwrap();
        assert_eq!(read_input(file.path()).unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_ensure_format() {
        assert!(ensure_format(b"!<arch>\n", BinaryFormat::Archive).is_ok());
        assert!(matches!(
            ensure_format(b"!<arch>\n", BinaryFormat::Elf),
            Err(ExtractError::FormatMismatch {
                expected: BinaryFormat::Elf,
                found: BinaryFormat::Archive
            })
        ));
    }
}
