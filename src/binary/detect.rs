//! Magic-number based classification of binary artifacts.

use super::ExtractError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Container format of an input artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryFormat {
    Elf,
    MachO,
    Pe,
    Archive,
    Unknown,
}

impl BinaryFormat {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Elf => "ELF",
            Self::MachO => "Mach-O",
            Self::Pe => "PE",
            Self::Archive => "archive",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ARCHIVE_MAGIC: &[u8; 8] = b"!<arch>\n";
const THIN_ARCHIVE_MAGIC: &[u8; 8] = b"!<thin>\n";
/// 32/64-bit, big/little-endian Mach-O magics as they appear on disk.
const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xcf, 0xfa, 0xed, 0xfe],
];
const PE_SIGNATURE: [u8; 4] = [b'P', b'E', 0, 0];
/// Offset of `e_lfanew` in the DOS header.
const PE_POINTER_OFFSET: usize = 0x3c;

/// Bytes read from disk by [`detect_file_format`]. Large enough for any
/// realistic DOS stub in front of a PE header.
const SNIFF_LEN: u64 = 64 * 1024;

/// Classify a byte buffer by its leading magic number.
///
/// Never fails: empty, tiny or unrecognized input is [`BinaryFormat::Unknown`].
/// A DOS `MZ` header without a valid `PE\0\0` signature is also unknown.
#[must_use]
pub fn detect_format(bytes: &[u8]) -> BinaryFormat {
    if bytes.starts_with(&ELF_MAGIC) {
        return BinaryFormat::Elf;
    }
    if bytes.starts_with(ARCHIVE_MAGIC) || bytes.starts_with(THIN_ARCHIVE_MAGIC) {
        return BinaryFormat::Archive;
    }
    if MACHO_MAGICS.iter().any(|magic| bytes.starts_with(magic)) {
        return BinaryFormat::MachO;
    }
    if bytes.starts_with(b"MZ") && has_pe_signature(bytes) {
        return BinaryFormat::Pe;
    }
    BinaryFormat::Unknown
}

fn has_pe_signature(bytes: &[u8]) -> bool {
    let Some(pointer) = bytes.get(PE_POINTER_OFFSET..PE_POINTER_OFFSET + 4) else {
        return false;
    };
    let mut raw = [0u8; 4];
    raw.copy_from_slice(pointer);
    let Ok(pe_offset) = usize::try_from(u32::from_le_bytes(raw)) else {
        return false;
    };
    pe_offset
        .checked_add(4)
        .and_then(|end| bytes.get(pe_offset..end))
        .is_some_and(|sig| sig == PE_SIGNATURE)
}

/// Sniff the format of a file on disk, reading at most a small prefix.
pub fn detect_file_format(path: &Path) -> Result<BinaryFormat, ExtractError> {
    super::check_input(path)?;
    let mut prefix = Vec::new();
    File::open(path)
        .map_err(|e| ExtractError::from_io(path, e))?
        .take(SNIFF_LEN)
        .read_to_end(&mut prefix)
        .map_err(|e| ExtractError::from_io(path, e))?;
    Ok(detect_format(&prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pe_stub(pe_offset: u32, signature: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x80];
        bytes[0] = b'M';
        bytes[1] = b'Z';
        bytes[PE_POINTER_OFFSET..PE_POINTER_OFFSET + 4].copy_from_slice(&pe_offset.to_le_bytes());
        let at = pe_offset as usize;
        bytes.resize(at.max(bytes.len()), 0);
        bytes.truncate(at);
        bytes.extend_from_slice(signature);
        bytes
    }

    #[test]
    fn test_detects_each_magic() {
        assert_eq!(detect_format(b"\x7fELF\x02\x01\x01"), BinaryFormat::Elf);
        assert_eq!(detect_format(b"!<arch>\nfoo.o/"), BinaryFormat::Archive);
        assert_eq!(detect_format(b"!<thin>\n"), BinaryFormat::Archive);
        for magic in MACHO_MAGICS {
            assert_eq!(detect_format(&magic), BinaryFormat::MachO);
        }
        assert_eq!(detect_format(&pe_stub(0x40, b"PE\0\0")), BinaryFormat::Pe);
    }

    #[test]
    fn test_empty_and_tiny_inputs_are_unknown() {
        assert_eq!(detect_format(&[]), BinaryFormat::Unknown);
        assert_eq!(detect_format(&[0x7f]), BinaryFormat::Unknown);
        assert_eq!(detect_format(b"\x7fEL"), BinaryFormat::Unknown);
        assert_eq!(detect_format(b"MZ"), BinaryFormat::Unknown);
    }

    #[test]
    fn test_dos_stub_without_pe_signature() {
        assert_eq!(detect_format(&pe_stub(0x40, b"NE\0\0")), BinaryFormat::Unknown);
        // e_lfanew pointing far past the buffer
        let mut bytes = pe_stub(0x40, b"PE\0\0");
        bytes[PE_POINTER_OFFSET..PE_POINTER_OFFSET + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(detect_format(&bytes), BinaryFormat::Unknown);
    }

    #[test]
    fn test_detect_file_format_missing_file() {
        let err = detect_file_format(Path::new("/nonexistent/definitely/missing")).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
    }
}
