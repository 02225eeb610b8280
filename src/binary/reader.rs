//! Symbol, section and dependency tables.
//!
//! Symbols and sections come from the `object` crate, which gives one API
//! over ELF, Mach-O and PE. Declared shared-library dependencies come from
//! `goblin`, which exposes `DT_NEEDED`, `LC_LOAD_DYLIB` and the PE import
//! directory directly. Archives are walked member by member.

use super::{detect_format, ensure_format, read_input, BinaryFormat, ExtractError};
use crate::model::{FileType, Section, SectionFlags, Symbol, SymbolBinding};
use indexmap::IndexSet;
use object::read::archive::ArchiveFile;
use object::{Object, ObjectSection, ObjectSymbol, SectionKind, SymbolKind, SymbolSection};
use std::collections::HashSet;
use std::path::Path;

/// Everything the readers can learn from one artifact in a single pass.
#[derive(Debug, Clone)]
pub struct BinaryInspection {
    pub format: BinaryFormat,
    pub file_type: FileType,
    pub symbols: Vec<Symbol>,
    pub sections: Vec<Section>,
    pub dependencies: Vec<String>,
    /// `false` when the static symbol table is absent (stripped binary)
    pub has_symbol_table: bool,
}

/// Read the symbol table of any supported artifact.
pub fn extract_symbols(path: &Path) -> Result<Vec<Symbol>, ExtractError> {
    let data = read_input(path)?;
    let symbols = symbols_from_bytes(&data)?;
    tracing::debug!(path = %path.display(), count = symbols.len(), "Extracted symbols");
    Ok(symbols)
}

/// Like [`extract_symbols`], but fails unless the file is in `expected` format.
pub fn extract_symbols_as(path: &Path, expected: BinaryFormat) -> Result<Vec<Symbol>, ExtractError> {
    let data = read_input(path)?;
    ensure_format(&data, expected)?;
    symbols_from_bytes(&data)
}

/// Read the section table of any supported artifact.
pub fn extract_sections(path: &Path) -> Result<Vec<Section>, ExtractError> {
    let data = read_input(path)?;
    let sections = sections_from_bytes(&data)?;
    tracing::debug!(path = %path.display(), count = sections.len(), "Extracted sections");
    Ok(sections)
}

pub fn extract_sections_as(
    path: &Path,
    expected: BinaryFormat,
) -> Result<Vec<Section>, ExtractError> {
    let data = read_input(path)?;
    ensure_format(&data, expected)?;
    sections_from_bytes(&data)
}

/// Read the shared libraries an artifact declares it needs.
///
/// Archives have no dynamic dependencies and report an empty list.
pub fn extract_dependencies(path: &Path) -> Result<Vec<String>, ExtractError> {
    let data = read_input(path)?;
    let deps = dependencies_from_bytes(&data)?;
    tracing::debug!(path = %path.display(), count = deps.len(), "Extracted dependencies");
    Ok(deps)
}

pub fn extract_dependencies_as(
    path: &Path,
    expected: BinaryFormat,
) -> Result<Vec<String>, ExtractError> {
    let data = read_input(path)?;
    ensure_format(&data, expected)?;
    dependencies_from_bytes(&data)
}

/// Classify an artifact from its headers.
pub fn file_type_of(path: &Path) -> Result<FileType, ExtractError> {
    let data = read_input(path)?;
    match detect_format(&data) {
        BinaryFormat::Unknown => Err(ExtractError::UnknownFormat),
        format => Ok(file_type_from_bytes(&data, format)),
    }
}

pub fn symbols_from_bytes(data: &[u8]) -> Result<Vec<Symbol>, ExtractError> {
    match detect_format(data) {
        BinaryFormat::Unknown => Err(ExtractError::UnknownFormat),
        BinaryFormat::Archive => {
            let mut symbols = Vec::new();
            for_each_member(data, |member| {
                symbols.extend(collect_symbols(member).0);
            })?;
            Ok(symbols)
        }
        format => {
            let file = parse_object(data, format)?;
            Ok(collect_symbols(&file).0)
        }
    }
}

pub fn sections_from_bytes(data: &[u8]) -> Result<Vec<Section>, ExtractError> {
    match detect_format(data) {
        BinaryFormat::Unknown => Err(ExtractError::UnknownFormat),
        BinaryFormat::Archive => {
            let mut sections = Vec::new();
            for_each_member(data, |member| {
                for section in collect_sections(member) {
                    if !sections.iter().any(|s: &Section| s.name == section.name) {
                        sections.push(section);
                    }
                }
            })?;
            Ok(sections)
        }
        format => {
            let file = parse_object(data, format)?;
            Ok(collect_sections(&file))
        }
    }
}

pub fn dependencies_from_bytes(data: &[u8]) -> Result<Vec<String>, ExtractError> {
    let format = detect_format(data);
    match format {
        BinaryFormat::Unknown => return Err(ExtractError::UnknownFormat),
        BinaryFormat::Archive => return Ok(Vec::new()),
        _ => {}
    }
    let parsed = goblin::Object::parse(data).map_err(|e| ExtractError::malformed(format, e))?;
    let mut deps: IndexSet<String> = IndexSet::new();
    match parsed {
        goblin::Object::Elf(elf) => deps.extend(elf.libraries.iter().map(|l| (*l).to_string())),
        goblin::Object::Mach(goblin::mach::Mach::Binary(macho)) => deps.extend(
            macho
                .libs
                .iter()
                .filter(|lib| **lib != "self")
                .map(|l| (*l).to_string()),
        ),
        goblin::Object::PE(pe) => deps.extend(pe.libraries.iter().map(|l| (*l).to_string())),
        _ => {}
    }
    Ok(deps.into_iter().collect())
}

/// Run every reader over one buffer.
///
/// Fails as a whole if the symbol/section tables cannot be parsed; the
/// dependency list and file type degrade to empty/guessed values instead.
pub fn inspect_bytes(data: &[u8]) -> Result<BinaryInspection, ExtractError> {
    let format = detect_format(data);
    let (symbols, has_symbol_table, sections) = match format {
        BinaryFormat::Unknown => return Err(ExtractError::UnknownFormat),
        BinaryFormat::Archive => {
            let mut symbols = Vec::new();
            let mut sections = Vec::new();
            for_each_member(data, |member| {
                symbols.extend(collect_symbols(member).0);
                sections.extend(collect_sections(member));
            })?;
            let has_table = !symbols.is_empty();
            (symbols, has_table, sections)
        }
        _ => {
            let file = parse_object(data, format)?;
            let (symbols, has_table) = collect_symbols(&file);
            (symbols, has_table, collect_sections(&file))
        }
    };

    let dependencies = dependencies_from_bytes(data).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "Dependency table unreadable");
        Vec::new()
    });

    Ok(BinaryInspection {
        format,
        file_type: file_type_from_bytes(data, format),
        symbols,
        sections,
        dependencies,
        has_symbol_table,
    })
}

fn parse_object(data: &[u8], format: BinaryFormat) -> Result<object::File<'_>, ExtractError> {
    object::File::parse(data).map_err(|e| ExtractError::malformed(format, e))
}

/// Parse each archive member as an object file and hand it to `visit`.
///
/// Members that are not object files (symbol indexes, bitcode, thin-archive
/// references) are skipped.
fn for_each_member<'data, F>(data: &'data [u8], mut visit: F) -> Result<(), ExtractError>
where
    F: FnMut(&object::File<'data>),
{
    let archive =
        ArchiveFile::parse(data).map_err(|e| ExtractError::malformed(BinaryFormat::Archive, e))?;
    for member in archive.members() {
        let member = member.map_err(|e| ExtractError::malformed(BinaryFormat::Archive, e))?;
        let name = String::from_utf8_lossy(member.name()).into_owned();
        let Ok(member_data) = member.data(data) else {
            tracing::debug!(member = %name, "Skipping archive member without inline data");
            continue;
        };
        match object::File::parse(member_data) {
            Ok(file) => visit(&file),
            Err(err) => tracing::debug!(member = %name, error = %err, "Skipping non-object archive member"),
        }
    }
    Ok(())
}

/// Collect symbols from the static table, then the dynamic table, then
/// export/import directories, keeping the first occurrence of each name.
///
/// The flag reports whether a static symbol table was present.
fn collect_symbols(file: &object::File<'_>) -> (Vec<Symbol>, bool) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let mut has_static_table = false;

    for sym in file.symbols() {
        has_static_table = true;
        if let Some(symbol) = convert_symbol(file, &sym) {
            if seen.insert(symbol.name.clone()) {
                out.push(symbol);
            }
        }
    }
    for sym in file.dynamic_symbols() {
        if let Some(symbol) = convert_symbol(file, &sym) {
            if seen.insert(symbol.name.clone()) {
                out.push(symbol);
            }
        }
    }

    if let Ok(exports) = file.exports() {
        for export in exports {
            let name = String::from_utf8_lossy(export.name()).into_owned();
            if !name.is_empty() && seen.insert(name.clone()) {
                out.push(Symbol::new(name, export.address(), 0));
            }
        }
    }
    if let Ok(imports) = file.imports() {
        for import in imports {
            let name = String::from_utf8_lossy(import.name()).into_owned();
            if !name.is_empty() && seen.insert(name.clone()) {
                out.push(Symbol::new(name, 0, 0).undefined());
            }
        }
    }

    (out, has_static_table)
}

fn convert_symbol<'data, S>(file: &object::File<'data>, sym: &S) -> Option<Symbol>
where
    S: ObjectSymbol<'data>,
{
    if matches!(sym.kind(), SymbolKind::Section | SymbolKind::File) {
        return None;
    }
    let name = sym.name().ok().filter(|n| !n.is_empty())?;
    let binding = if sym.is_weak() {
        SymbolBinding::Weak
    } else if sym.is_global() {
        SymbolBinding::Global
    } else {
        SymbolBinding::Local
    };
    let mut symbol = Symbol::new(name, sym.address(), sym.size()).with_binding(binding);
    if sym.is_undefined() {
        symbol = symbol.undefined();
    }
    if let SymbolSection::Section(index) = sym.section() {
        if let Some(section_name) = file
            .section_by_index(index)
            .ok()
            .and_then(|s| s.name().ok().map(str::to_string))
        {
            symbol = symbol.in_section(section_name);
        }
    }
    Some(symbol)
}

fn collect_sections(file: &object::File<'_>) -> Vec<Section> {
    file.sections()
        .filter_map(|section| {
            let name = section.name().ok().filter(|n| !n.is_empty())?;
            let flags = section_flags(&section, name);
            Some(Section::new(name, section.address(), section.size(), flags))
        })
        .collect()
}

fn section_flags(section: &object::Section<'_, '_>, name: &str) -> SectionFlags {
    let kind = section.kind();
    let mut flags = SectionFlags {
        executable: kind == SectionKind::Text,
        writable: matches!(
            kind,
            SectionKind::Data
                | SectionKind::UninitializedData
                | SectionKind::Tls
                | SectionKind::UninitializedTls
                | SectionKind::Common
        ),
        debug: kind == SectionKind::Debug || Section::is_debug_name(name),
    };
    if let object::SectionFlags::Elf { sh_flags } = section.flags() {
        flags.writable |= sh_flags & u64::from(object::elf::SHF_WRITE) != 0;
        flags.executable |= sh_flags & u64::from(object::elf::SHF_EXECINSTR) != 0;
    }
    flags
}

/// Classify the artifact from its headers, falling back to `Unknown`.
fn file_type_from_bytes(data: &[u8], format: BinaryFormat) -> FileType {
    use goblin::elf::header::{ET_DYN, ET_EXEC, ET_REL};
    use goblin::mach::header::{MH_BUNDLE, MH_DYLIB, MH_EXECUTE, MH_OBJECT};

    if format == BinaryFormat::Archive {
        return FileType::StaticLibrary;
    }
    match goblin::Object::parse(data) {
        Ok(goblin::Object::Elf(elf)) => match elf.header.e_type {
            ET_REL => FileType::Object,
            ET_EXEC => FileType::Executable,
            // PIE executables are ET_DYN with an interpreter
            ET_DYN if elf.interpreter.is_some() => FileType::Executable,
            ET_DYN => FileType::SharedLibrary,
            _ => FileType::Unknown,
        },
        Ok(goblin::Object::Mach(goblin::mach::Mach::Binary(macho))) => match macho.header.filetype {
            MH_OBJECT => FileType::Object,
            MH_EXECUTE => FileType::Executable,
            MH_DYLIB | MH_BUNDLE => FileType::SharedLibrary,
            _ => FileType::Unknown,
        },
        Ok(goblin::Object::PE(pe)) if pe.is_lib => FileType::SharedLibrary,
        Ok(goblin::Object::PE(_)) => FileType::Executable,
        _ => FileType::Unknown,
    }
}
