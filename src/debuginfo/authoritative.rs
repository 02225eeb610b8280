//! DWARF extraction through `gimli`.
//!
//! Sections are located with `object` (which maps `.debug_*` names onto the
//! Mach-O `__debug_*` spelling and decompresses `SHF_COMPRESSED` data) and
//! copied into reference-counted buffers so that one loaded [`Dwarf`] can be
//! walked by several collectors in sequence. Relocations recorded against a
//! debug section are applied as it is read, so unlinked objects decode with
//! the same names as linked images.

use super::{join_path, normalize_names, DebugInfo, DebugInfoError, DebugInfoExtractor, LineInfo};
use crate::binary::{detect_format, read_input, BinaryFormat};
use gimli::{
    Dwarf, EndianArcSlice, Reader, ReaderOffset, Relocate, RelocateReader, RunTimeEndian,
    SectionId, Unit,
};
use object::read::RelocationMap;
use object::{Object, ObjectSection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

type DwarfReader = RelocateReader<EndianArcSlice<RunTimeEndian>, SectionRelocations>;

/// Relocations against one debug section, keyed by offset in that section.
///
/// Relocatable objects store string and line-table offsets as zero plus a
/// relocation; reads through [`RelocateReader`] add the resolved value.
#[derive(Debug, Clone, Default)]
struct SectionRelocations(Arc<RelocationMap>);

impl Relocate for SectionRelocations {
    fn relocate_address(&self, offset: usize, value: u64) -> gimli::Result<u64> {
        Ok(self.0.relocate(offset as u64, value))
    }

    fn relocate_offset(&self, offset: usize, value: usize) -> gimli::Result<usize> {
        <usize as ReaderOffset>::from_u64(self.0.relocate(offset as u64, value as u64))
    }
}

/// Serializes every use of the authoritative extractor in the process.
static AUTHORITATIVE_LOCK: Mutex<()> = Mutex::new(());

/// Exclusive right to use the authoritative DWARF extractor.
///
/// At most one guard exists per process. Acquiring blocks until the previous
/// holder drops theirs. The guard is not `Send`, so it cannot be handed to
/// another thread while held.
#[derive(Debug)]
pub struct AuthoritativeGuard {
    _lock: MutexGuard<'static, ()>,
}

impl AuthoritativeGuard {
    /// Block until the extractor is free.
    #[must_use]
    pub fn acquire() -> Self {
        // A panic in a previous holder leaves no state behind the mutex.
        let lock = AUTHORITATIVE_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self { _lock: lock }
    }

    /// Take the guard only if nobody else holds it.
    #[must_use]
    pub fn try_acquire() -> Option<Self> {
        match AUTHORITATIVE_LOCK.try_lock() {
            Ok(lock) => Some(Self { _lock: lock }),
            Err(TryLockError::Poisoned(poisoned)) => Some(Self {
                _lock: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// `gimli`-backed extractor. Holds the process-wide guard for its lifetime.
#[derive(Debug)]
pub struct AuthoritativeExtractor {
    _guard: AuthoritativeGuard,
}

impl Default for AuthoritativeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthoritativeExtractor {
    /// Acquire the guard, blocking while another instance is alive.
    #[must_use]
    pub fn new() -> Self {
        Self::with_guard(AuthoritativeGuard::acquire())
    }

    #[must_use]
    pub fn with_guard(guard: AuthoritativeGuard) -> Self {
        Self { _guard: guard }
    }

    /// Open → parse. The returned DWARF owns copies of all debug sections.
    fn open(&self, path: &Path) -> Result<Dwarf<DwarfReader>, DebugInfoError> {
        let data = read_input(path)?;
        let format = detect_format(&data);
        if !matches!(format, BinaryFormat::Elf | BinaryFormat::MachO | BinaryFormat::Pe) {
            return Err(DebugInfoError::UnsupportedFormat(format));
        }
        let file = object::File::parse(&*data)?;
        if has_debug_info_section(&file) {
            tracing::debug!(path = %path.display(), "Loading embedded DWARF");
            return load_dwarf(&file);
        }

        let Some(bundle) = resolve_debug_bundle(path) else {
            return Err(DebugInfoError::NoDebugInfo);
        };
        tracing::debug!(bundle = %bundle.display(), "Loading DWARF from debug bundle");
        let bundle_data = read_input(&bundle)?;
        let bundle_file = object::File::parse(&*bundle_data)?;
        if !has_debug_info_section(&bundle_file) {
            return Err(DebugInfoError::NoDebugInfo);
        }
        load_dwarf(&bundle_file)
    }
}

impl DebugInfoExtractor for AuthoritativeExtractor {
    fn strategy(&self) -> &'static str {
        "gimli"
    }

    fn extract_source_files(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        let dwarf = self.open(path)?;
        collect_source_files(&dwarf)
    }

    fn extract_compile_units(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        let dwarf = self.open(path)?;
        collect_compile_units(&dwarf)
    }

    fn extract_functions(&self, path: &Path) -> Result<Vec<String>, DebugInfoError> {
        let dwarf = self.open(path)?;
        collect_functions(&dwarf)
    }

    fn extract_line_info(&self, path: &Path) -> Result<Vec<LineInfo>, DebugInfoError> {
        let dwarf = self.open(path)?;
        collect_line_info(&dwarf)
    }

    fn has_dwarf_info(&self, path: &Path) -> bool {
        self.open(path).is_ok()
    }

    fn extract_all_debug_info(&self, path: &Path) -> Result<DebugInfo, DebugInfoError> {
        let dwarf = self.open(path)?;
        let info = DebugInfo {
            source_files: or_empty("source files", collect_source_files(&dwarf)),
            compile_units: or_empty("compile units", collect_compile_units(&dwarf)),
            functions: or_empty("functions", collect_functions(&dwarf)),
            line_info: or_empty("line rows", collect_line_info(&dwarf)),
            strategy: self.strategy().to_string(),
        };
        if info.is_empty() {
            return Err(DebugInfoError::Empty("compile units, functions or line rows"));
        }
        tracing::debug!(
            path = %path.display(),
            sources = info.source_files.len(),
            functions = info.functions.len(),
            "Extracted DWARF with gimli"
        );
        Ok(info)
    }
}

/// A category that failed to decode contributes nothing to the combined
/// result; the other categories are kept.
fn or_empty<T: Default>(category: &'static str, result: Result<T, DebugInfoError>) -> T {
    result.unwrap_or_else(|err| {
        tracing::debug!(category, error = %err, "Partial DWARF extraction");
        T::default()
    })
}

/// Locate the split debug file macOS tooling writes next to a binary:
/// `<binary>.dSYM/Contents/Resources/DWARF/<binary name>`.
#[must_use]
pub fn resolve_debug_bundle(binary: &Path) -> Option<PathBuf> {
    let file_name = binary.file_name()?;
    let mut bundle = binary.as_os_str().to_owned();
    bundle.push(".dSYM");
    let candidate = PathBuf::from(bundle)
        .join("Contents")
        .join("Resources")
        .join("DWARF")
        .join(file_name);
    candidate.is_file().then_some(candidate)
}

fn has_debug_info_section(file: &object::File<'_>) -> bool {
    file.section_by_name(SectionId::DebugInfo.name())
        .is_some_and(|section| section.size() > 0)
}

fn load_dwarf(file: &object::File<'_>) -> Result<Dwarf<DwarfReader>, DebugInfoError> {
    let endian = if file.is_little_endian() {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };
    let load_section = |id: SectionId| -> Result<DwarfReader, DebugInfoError> {
        let Some(section) = file.section_by_name(id.name()) else {
            let empty: Arc<[u8]> = Arc::from(Vec::new());
            return Ok(RelocateReader::new(
                EndianArcSlice::new(empty, endian),
                SectionRelocations::default(),
            ));
        };
        let relocations = section.relocation_map().unwrap_or_else(|err| {
            tracing::debug!(section = id.name(), error = %err, "Ignoring unsupported relocations");
            RelocationMap::default()
        });
        let data: Arc<[u8]> = Arc::from(section.uncompressed_data()?.into_owned());
        Ok(RelocateReader::new(
            EndianArcSlice::new(data, endian),
            SectionRelocations(Arc::new(relocations)),
        ))
    };
    Dwarf::load(load_section)
}

fn reader_to_string(reader: &DwarfReader) -> Result<String, DebugInfoError> {
    Ok(reader.to_string_lossy()?.into_owned())
}

fn attr_to_string(
    dwarf: &Dwarf<DwarfReader>,
    unit: &Unit<DwarfReader>,
    value: gimli::AttributeValue<DwarfReader>,
) -> Option<String> {
    let reader = dwarf.attr_string(unit, value).ok()?;
    reader_to_string(&reader).ok()
}

/// Every unit whose header and line program parse. A damaged unit is
/// skipped so the rest of the file still decodes.
fn readable_units(dwarf: &Dwarf<DwarfReader>) -> Result<Vec<Unit<DwarfReader>>, DebugInfoError> {
    let mut units = Vec::new();
    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        let offset = header.offset();
        match dwarf.unit(header) {
            Ok(unit) => units.push(unit),
            Err(err) => tracing::debug!(?offset, error = %err, "Skipping unreadable unit"),
        }
    }
    Ok(units)
}

fn collect_compile_units(dwarf: &Dwarf<DwarfReader>) -> Result<Vec<String>, DebugInfoError> {
    let mut names = Vec::new();
    for unit in readable_units(dwarf)? {
        if let Some(name) = &unit.name {
            names.push(reader_to_string(name)?);
        }
    }
    Ok(normalize_names(names))
}

fn collect_source_files(dwarf: &Dwarf<DwarfReader>) -> Result<Vec<String>, DebugInfoError> {
    let mut files = Vec::new();
    for unit in readable_units(dwarf)? {
        let comp_dir = unit.comp_dir.as_ref().and_then(|d| reader_to_string(d).ok());
        if let Some(name) = &unit.name {
            files.push(join_path(comp_dir.as_deref(), &reader_to_string(name)?));
        }
        if let Some(program) = &unit.line_program {
            let line_header = program.header();
            for entry in line_header.file_names() {
                if let Some(path) = render_file(dwarf, &unit, line_header, entry) {
                    files.push(path);
                }
            }
        }
    }
    Ok(normalize_names(files))
}

fn render_file(
    dwarf: &Dwarf<DwarfReader>,
    unit: &Unit<DwarfReader>,
    header: &gimli::LineProgramHeader<DwarfReader>,
    entry: &gimli::FileEntry<DwarfReader>,
) -> Option<String> {
    let name = attr_to_string(dwarf, unit, entry.path_name())?;
    let dir = entry
        .directory(header)
        .and_then(|dir| attr_to_string(dwarf, unit, dir));
    Some(join_path(dir.as_deref(), &name))
}

fn collect_functions(dwarf: &Dwarf<DwarfReader>) -> Result<Vec<String>, DebugInfoError> {
    let mut functions = Vec::new();
    for unit in readable_units(dwarf)? {
        let mut entries = unit.entries();
        while let Some((_, entry)) = entries.next_dfs()? {
            if entry.tag() != gimli::DW_TAG_subprogram {
                continue;
            }
            if let Some(name) = subprogram_name(dwarf, &unit, entry)? {
                functions.push(name);
            }
        }
    }
    Ok(normalize_names(functions))
}

/// `DW_AT_name`, else `DW_AT_linkage_name`, else the name on the entry
/// referenced by `DW_AT_abstract_origin`/`DW_AT_specification` in the same unit.
fn subprogram_name(
    dwarf: &Dwarf<DwarfReader>,
    unit: &Unit<DwarfReader>,
    entry: &gimli::DebuggingInformationEntry<'_, '_, DwarfReader>,
) -> Result<Option<String>, DebugInfoError> {
    for attr in [gimli::DW_AT_name, gimli::DW_AT_linkage_name] {
        if let Some(value) = entry.attr_value(attr)? {
            if let Some(name) = attr_to_string(dwarf, unit, value) {
                return Ok(Some(name));
            }
        }
    }
    for attr in [gimli::DW_AT_abstract_origin, gimli::DW_AT_specification] {
        if let Some(gimli::AttributeValue::UnitRef(offset)) = entry.attr_value(attr)? {
            let origin = unit.entry(offset)?;
            if let Some(value) = origin.attr_value(gimli::DW_AT_name)? {
                return Ok(attr_to_string(dwarf, unit, value));
            }
        }
    }
    Ok(None)
}

fn collect_line_info(dwarf: &Dwarf<DwarfReader>) -> Result<Vec<LineInfo>, DebugInfoError> {
    let mut rows_out = Vec::new();
    for unit in readable_units(dwarf)? {
        let Some(program) = unit.line_program.clone() else {
            continue;
        };
        let mut rows = program.rows();
        while let Some((line_header, row)) = rows.next_row()? {
            if row.end_sequence() {
                continue;
            }
            let file = row
                .file(line_header)
                .and_then(|entry| render_file(dwarf, &unit, line_header, entry))
                .unwrap_or_default();
            rows_out.push(LineInfo {
                file,
                line: row.line().map_or(0, std::num::NonZeroU64::get),
                address: row.address(),
            });
        }
    }
    Ok(rows_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive() {
        let first = AuthoritativeGuard::acquire();
        assert!(AuthoritativeGuard::try_acquire().is_none());
        drop(first);
        let _again = AuthoritativeGuard::acquire();
    }

    #[test]
    fn test_debug_bundle_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("app");
        std::fs::write(&binary, b"\xcf\xfa\xed\xfe").unwrap();
        assert_eq!(resolve_debug_bundle(&binary), None);

        let dwarf_dir = dir.path().join("app.dSYM/Contents/Resources/DWARF");
        std::fs::create_dir_all(&dwarf_dir).unwrap();
        std::fs::write(dwarf_dir.join("app"), b"\xcf\xfa\xed\xfe").unwrap();
        assert_eq!(resolve_debug_bundle(&binary), Some(dwarf_dir.join("app")));
    }

    #[test]
    fn test_rejects_non_object_input() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"plain text, not a binary").unwrap();
        let extractor = AuthoritativeExtractor::new();
        assert!(matches!(
            extractor.extract_functions(file.path()),
            Err(DebugInfoError::UnsupportedFormat(BinaryFormat::Unknown))
        ));
        assert!(!extractor.has_dwarf_info(file.path()));
    }
}
