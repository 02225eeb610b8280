//! Hand-written ELF/DWARF reader.
//!
//! Locates debug sections through the ELF section table and decodes
//! `.debug_info`, `.debug_abbrev` and `.debug_line` with a bounds-checked
//! [`Cursor`](crate::binary::cursor::Cursor). When those sections are present
//! but cannot be decoded, source names are recovered by scanning the raw
//! section bytes and function names from `.symtab`. Relocations against the
//! debug sections of unlinked objects are applied to a copy of the image
//! before decoding.
//!
//! The extractor holds no state; one value can serve any number of threads.

mod dwarf;
mod elf;
mod line;

use super::{join_path, normalize_names, DebugInfo, DebugInfoError, DebugInfoExtractor, LineInfo};
use crate::binary::read_input;
use elf::ElfSections;
use std::path::Path;

/// Longest string the byte scan accepts as a file name.
const MAX_SCANNED_NAME: usize = 512;

const SOURCE_EXTENSIONS: &[&str] = &[".c", ".cc", ".cpp", ".cxx", ".h", ".hh", ".hpp", ".hxx"];

#[derive(Debug, Clone, Copy, Default)]
pub struct LightweightExtractor;

impl LightweightExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// All four categories from an in-memory ELF image.
    pub fn debug_info_from_bytes(&self, data: &[u8]) -> Result<DebugInfo, DebugInfoError> {
        let data = elf::relocate_debug_sections(data)?;
        let sections = elf::parse_sections(&data)?;
        if !sections.has_any_debug_section() {
            return Err(DebugInfoError::NoDebugInfo);
        }
        let units = decode_units(&sections);
        let info = DebugInfo {
            source_files: source_files(&sections, units.as_ref()),
            compile_units: compile_units(&sections, units.as_ref()),
            functions: functions(&sections, units.as_ref()),
            line_info: line_rows(&sections, units.as_ref()),
            strategy: self.strategy().to_string(),
        };
        if info.is_empty() {
            return Err(DebugInfoError::Empty("source files, functions or line rows"));
        }
        Ok(info)
    }

    /// Read `path` and hand its debug sections to `f`.
    fn with_sections<T>(
        path: &Path,
        f: impl FnOnce(&ElfSections<'_>) -> Result<T, DebugInfoError>,
    ) -> Result<T, DebugInfoError> {
        let data = read_input(path)?;
        let data = elf::relocate_debug_sections(&data)?;
        let sections = elf::parse_sections(&data)?;
        if !sections.has_any_debug_section() {
            return Err(DebugInfoError::NoDebugInfo);
        }
        f(&sections)
    }
}

/// Decoded `.debug_info`, or `None` when it is absent, undecodable or empty.
fn decode_units(sections: &ElfSections<'_>) -> Option<dwarf::InfoSummary> {
    if !sections.has_debug_info() {
        return None;
    }
    match dwarf::read_info(sections) {
        Ok(summary) if !summary.units.is_empty() => Some(summary),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, "Falling back to debug section scan");
            None
        }
    }
}

fn compile_units(sections: &ElfSections<'_>, units: Option<&dwarf::InfoSummary>) -> Vec<String> {
    match units {
        Some(summary) => normalize_names(summary.units.iter().filter_map(|u| u.name.clone())),
        None => scan_source_names(sections),
    }
}

fn source_files(sections: &ElfSections<'_>, units: Option<&dwarf::InfoSummary>) -> Vec<String> {
    let Some(summary) = units else {
        return scan_source_names(sections);
    };
    let mut files = Vec::new();
    for unit in &summary.units {
        let comp_dir = unit.comp_dir.as_deref();
        if let Some(name) = &unit.name {
            files.push(join_path(comp_dir, name));
        }
        if let Some(offset) = unit.stmt_list {
            match line::read_line_table(sections, offset, comp_dir) {
                Ok(table) => files.extend(table.files),
                Err(err) => tracing::trace!(offset, error = %err, "Skipping line table"),
            }
        }
    }
    let files = normalize_names(files);
    if files.is_empty() {
        scan_source_names(sections)
    } else {
        files
    }
}

fn functions(sections: &ElfSections<'_>, units: Option<&dwarf::InfoSummary>) -> Vec<String> {
    let from_dies = units
        .map(|summary| {
            normalize_names(summary.units.iter().flat_map(|u| u.functions.iter().cloned()))
        })
        .unwrap_or_default();
    if from_dies.is_empty() {
        normalize_names(elf::function_symbols(sections))
    } else {
        from_dies
    }
}

fn line_rows(sections: &ElfSections<'_>, units: Option<&dwarf::InfoSummary>) -> Vec<LineInfo> {
    let Some(summary) = units else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for unit in &summary.units {
        let Some(offset) = unit.stmt_list else {
            continue;
        };
        if let Ok(table) = line::read_line_table(sections, offset, unit.comp_dir.as_deref()) {
            rows.extend(table.rows);
        }
    }
    rows
}

/// Scan every debug section for NUL or whitespace delimited tokens that look
/// like C or C++ source and header names.
fn scan_source_names(sections: &ElfSections<'_>) -> Vec<String> {
    let mut names = Vec::new();
    for bytes in &sections.debug_sections {
        for token in bytes.split(|b| *b == 0 || b.is_ascii_whitespace()) {
            if token.is_empty() || token.len() >= MAX_SCANNED_NAME {
                continue;
            }
            if !token.iter().all(|b| b.is_ascii_graphic()) {
                continue;
            }
            let Ok(text) = std::str::from_utf8(token) else {
                continue;
            };
            if looks_like_source(text) {
                names.push(text.to_string());
            }
        }
    }
    normalize_names(names)
}

fn looks_like_source(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SOURCE_EXTENSIONS
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
}

impl DebugInfoExtractor for LightweightExtractor {
    fn strategy(&self) -> &'static str {
        "lightweight"
    }

    fn extract_source_files(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        Self::with_sections(path, |sections| {
            Ok(source_files(sections, decode_units(sections).as_ref()))
        })
    }

    fn extract_compile_units(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        Self::with_sections(path, |sections| {
            Ok(compile_units(sections, decode_units(sections).as_ref()))
        })
    }

    fn extract_functions(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        Self::with_sections(path, |sections| {
            Ok(functions(sections, decode_units(sections).as_ref()))
        })
    }

    fn extract_line_info(&self, path: &Path) -> Result<Vec<LineInfo>, DebugInfoError> {
        Self::with_sections(path, |sections| {
            Ok(line_rows(sections, decode_units(sections).as_ref()))
        })
    }

    fn has_dwarf_info(&self, path: &Path) -> bool {
        read_input(path)
            .ok()
            .and_then(|data| elf::parse_sections(&data).ok().map(|s| s.has_debug_info()))
            .unwrap_or(false)
    }

    fn extract_all_debug_info(&self, path: &Path) -> Result<DebugInfo, DebugInfoError> {
        let data = read_input(path)?;
        let info = self.debug_info_from_bytes(&data)?;
        tracing::debug!(
            path = %path.display(),
            sources = info.source_files.len(),
            functions = info.functions.len(),
            "Extracted debug info with lightweight parser"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryFormat;
    use std::io::Write;

    fn temp_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn test_source_name_heuristic() {
        assert!(looks_like_source("fib.c"));
        assert!(looks_like_source("/usr/include/stdio.H"));
        assert!(looks_like_source("vector.hpp"));
        assert!(!looks_like_source(".c"));
        assert!(!looks_like_source("libc.so.6"));
        assert!(!looks_like_source("main"));
    }

    #[test]
    fn test_scan_finds_names_between_separators() {
        let blob = b"\x01\x02junk\0/src/fib.c\0GNU C17 11.4.0 -O2 util.cpp\0\xffbad.c\xfe";
        let sections = ElfSections {
            debug_sections: vec![&blob[..]],
            ..ElfSections::default()
        };
        assert_eq!(scan_source_names(&sections), ["/src/fib.c", "util.cpp"]);
    }

    #[test]
    fn test_non_elf_input_is_unsupported() {
        let file = temp_file(b"!<arch>\nnot an elf file at all");
        let result = LightweightExtractor::new().extract_functions(file.path());
        assert!(matches!(
            result,
            Err(DebugInfoError::UnsupportedFormat(BinaryFormat::Archive))
        ));
    }

    #[test]
    fn test_bad_class_and_truncated_header() {
        let mut header = vec![0x7f, b'E', b'L', b'F', 9, 1, 1, 0];
        header.resize(64, 0);
        let file = temp_file(&header);
        let extractor = LightweightExtractor::new();
        assert!(matches!(
            extractor.extract_source_files(file.path()),
            Err(DebugInfoError::Malformed(_))
        ));

        let file = temp_file(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(extractor.extract_compile_units(file.path()).is_err());
        assert!(!extractor.has_dwarf_info(file.path()));
    }

    #[test]
    fn test_missing_and_empty_files_fail() {
        let extractor = LightweightExtractor::new();
        assert!(matches!(
            extractor.extract_line_info(Path::new("/nonexistent/a.out")),
            Err(DebugInfoError::Input(_))
        ));
        let empty = temp_file(b"");
        assert!(extractor.extract_all_debug_info(empty.path()).is_err());
    }
}
