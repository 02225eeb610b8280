//! Minimal ELF section table reader.

use super::super::DebugInfoError;
use crate::binary::cursor::{cstr_at, Cursor, Endian};
use std::borrow::Cow;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const SHT_RELA: u32 = 4;
const SHT_NOBITS: u32 = 8;
const SHT_REL: u32 = 9;
const SHF_COMPRESSED: u64 = 0x800;

const SHDR32_SIZE: u16 = 40;
const SHDR64_SIZE: u16 = 64;

/// Debug and symbol sections borrowed from the file image.
///
/// Compressed and `NOBITS` sections are left out, so every slice here is raw
/// DWARF or raw symbol-table bytes.
#[derive(Debug, Default, Clone)]
pub(crate) struct ElfSections<'a> {
    pub endian: Option<Endian>,
    pub is_64: bool,
    pub debug_info: Option<&'a [u8]>,
    pub debug_abbrev: Option<&'a [u8]>,
    pub debug_line: Option<&'a [u8]>,
    pub debug_str: Option<&'a [u8]>,
    pub debug_line_str: Option<&'a [u8]>,
    pub debug_str_offsets: Option<&'a [u8]>,
    pub symtab: Option<&'a [u8]>,
    pub strtab: Option<&'a [u8]>,
    /// Every non-empty `.debug_*` section, for the string-scan fallback
    pub debug_sections: Vec<&'a [u8]>,
}

impl ElfSections<'_> {
    pub fn endian(&self) -> Endian {
        self.endian.unwrap_or(Endian::Little)
    }

    pub fn has_debug_info(&self) -> bool {
        self.debug_info.is_some_and(|s| !s.is_empty())
    }

    pub fn has_any_debug_section(&self) -> bool {
        !self.debug_sections.is_empty()
    }
}

struct SectionHeader {
    name: u32,
    kind: u32,
    flags: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
}

/// Decoded ELF header fields and the section header table.
struct SectionTable<'a> {
    is_64: bool,
    endian: Endian,
    machine: u16,
    headers: Vec<SectionHeader>,
    names: &'a [u8],
}

impl<'a> SectionTable<'a> {
    fn name(&self, header: &SectionHeader) -> Option<&'a [u8]> {
        cstr_at(self.names, u64::from(header.name)).ok()
    }

    fn get(&self, index: u32) -> Option<&SectionHeader> {
        usize::try_from(index).ok().and_then(|i| self.headers.get(i))
    }
}

fn read_table(data: &[u8]) -> Result<SectionTable<'_>, DebugInfoError> {
    if data.len() < 16 || &data[..4] != ELF_MAGIC {
        return Err(DebugInfoError::UnsupportedFormat(
            crate::binary::detect_format(data),
        ));
    }
    let is_64 = match data[4] {
        ELFCLASS32 => false,
        ELFCLASS64 => true,
        other => {
            return Err(DebugInfoError::Malformed(format!(
                "unknown ELF class {other}"
            )))
        }
    };
    let endian = match data[5] {
        ELFDATA2LSB => Endian::Little,
        ELFDATA2MSB => Endian::Big,
        other => {
            return Err(DebugInfoError::Malformed(format!(
                "unknown ELF data encoding {other}"
            )))
        }
    };

    let machine = Cursor::at(data, 0x12, endian)?.u16()?;
    let mut cursor = Cursor::at(data, if is_64 { 0x28 } else { 0x20 }, endian)?;
    let shoff = cursor.offset(is_64)?;
    let _flags = cursor.u32()?;
    let _ehsize = cursor.u16()?;
    let _phentsize = cursor.u16()?;
    let _phnum = cursor.u16()?;
    let shentsize = cursor.u16()?;
    let shnum = cursor.u16()?;
    let shstrndx = cursor.u16()?;

    let mut table = SectionTable {
        is_64,
        endian,
        machine,
        headers: Vec::new(),
        names: &[],
    };
    if shnum == 0 || shoff == 0 {
        return Ok(table);
    }
    let min_entsize = if is_64 { SHDR64_SIZE } else { SHDR32_SIZE };
    if shentsize < min_entsize {
        return Err(DebugInfoError::Malformed(format!(
            "section header size {shentsize} too small"
        )));
    }
    let table_len = u64::from(shentsize)
        .checked_mul(u64::from(shnum))
        .and_then(|len| len.checked_add(shoff))
        .ok_or_else(|| DebugInfoError::Malformed("section table overflows".to_string()))?;
    if table_len > data.len() as u64 {
        return Err(DebugInfoError::Malformed(
            "section table extends past end of file".to_string(),
        ));
    }
    if shstrndx >= shnum {
        return Err(DebugInfoError::Malformed(format!(
            "section name index {shstrndx} out of range"
        )));
    }

    table.headers = (0..shnum)
        .map(|index| {
            let at = shoff + u64::from(index) * u64::from(shentsize);
            read_header(data, at, endian, is_64)
        })
        .collect::<Result<Vec<_>, DebugInfoError>>()?;
    table.names = section_bytes(data, &table.headers[usize::from(shstrndx)])?;
    Ok(table)
}

/// Parse the ELF header and section table of `data`.
pub(crate) fn parse_sections(data: &[u8]) -> Result<ElfSections<'_>, DebugInfoError> {
    let table = read_table(data)?;
    let mut sections = ElfSections {
        endian: Some(table.endian),
        is_64: table.is_64,
        ..ElfSections::default()
    };

    for header in &table.headers {
        if header.kind == SHT_NOBITS || header.flags & SHF_COMPRESSED != 0 {
            continue;
        }
        let Some(name) = table.name(header) else {
            continue;
        };
        let bytes = section_bytes(data, header)?;
        match name {
            b".debug_info" => sections.debug_info = Some(bytes),
            b".debug_abbrev" => sections.debug_abbrev = Some(bytes),
            b".debug_line" => sections.debug_line = Some(bytes),
            b".debug_str" => sections.debug_str = Some(bytes),
            b".debug_line_str" => sections.debug_line_str = Some(bytes),
            b".debug_str_offsets" => sections.debug_str_offsets = Some(bytes),
            b".symtab" => sections.symtab = Some(bytes),
            b".strtab" => sections.strtab = Some(bytes),
            _ => {}
        }
        if name.starts_with(b".debug_") && !bytes.is_empty() {
            sections.debug_sections.push(bytes);
        }
    }
    Ok(sections)
}

fn read_header(
    data: &[u8],
    at: u64,
    endian: Endian,
    is_64: bool,
) -> Result<SectionHeader, DebugInfoError> {
    let mut cursor = Cursor::at(data, at, endian)?;
    let name = cursor.u32()?;
    let kind = cursor.u32()?;
    let flags = cursor.offset(is_64)?;
    let _addr = cursor.offset(is_64)?;
    let offset = cursor.offset(is_64)?;
    let size = cursor.offset(is_64)?;
    let link = cursor.u32()?;
    let info = cursor.u32()?;
    Ok(SectionHeader {
        name,
        kind,
        flags,
        offset,
        size,
        link,
        info,
    })
}

fn section_bytes<'a>(data: &'a [u8], header: &SectionHeader) -> Result<&'a [u8], DebugInfoError> {
    if header.kind == SHT_NOBITS {
        return Ok(&[]);
    }
    let mut cursor = Cursor::at(data, header.offset, Endian::Little)?;
    let len = usize::try_from(header.size)
        .map_err(|_| DebugInfoError::Malformed("section size overflows".to_string()))?;
    Ok(cursor.bytes(len)?)
}

/// Apply the relocations recorded against `.debug_*` sections.
///
/// Unlinked objects leave string, abbreviation and line-table offsets in
/// their debug sections as zero and record the real value as a relocation.
/// Images with no such relocations are returned borrowed.
pub(crate) fn relocate_debug_sections(data: &[u8]) -> Result<Cow<'_, [u8]>, DebugInfoError> {
    let table = read_table(data)?;
    let mut patched: Option<Vec<u8>> = None;
    for header in &table.headers {
        let with_addend = match header.kind {
            SHT_RELA => true,
            SHT_REL => false,
            _ => continue,
        };
        let Some(target) = table.get(header.info) else {
            continue;
        };
        if target.kind == SHT_NOBITS || target.flags & SHF_COMPRESSED != 0 {
            continue;
        }
        if !table.name(target).is_some_and(|name| name.starts_with(b".debug_")) {
            continue;
        }
        let symbols = match table.get(header.link) {
            Some(symtab) => section_bytes(data, symtab)?,
            None => &[][..],
        };
        let entries = section_bytes(data, header)?;
        let image = patched.get_or_insert_with(|| data.to_vec());
        apply_relocations(&table, entries, with_addend, symbols, target, image)?;
    }
    Ok(patched.map_or(Cow::Borrowed(data), Cow::Owned))
}

fn apply_relocations(
    table: &SectionTable<'_>,
    entries: &[u8],
    with_addend: bool,
    symbols: &[u8],
    target: &SectionHeader,
    image: &mut [u8],
) -> Result<(), DebugInfoError> {
    let entry_size = match (table.is_64, with_addend) {
        (true, true) => 24,
        (true, false) => 16,
        (false, true) => 12,
        (false, false) => 8,
    };
    for entry in entries.chunks_exact(entry_size) {
        let mut cursor = Cursor::new(entry, table.endian);
        let offset = cursor.offset(table.is_64)?;
        let info = cursor.offset(table.is_64)?;
        let (symbol, kind) = if table.is_64 {
            (info >> 32, (info & 0xffff_ffff) as u32)
        } else {
            (info >> 8, (info & 0xff) as u32)
        };
        let Some(width) = relocation_width(table.machine, kind) else {
            tracing::trace!(machine = table.machine, kind, "Skipping relocation type");
            continue;
        };
        if offset.saturating_add(width as u64) > target.size {
            return Err(DebugInfoError::Malformed(format!(
                "relocation at {offset:#x} outside its section"
            )));
        }
        let place = target
            .offset
            .checked_add(offset)
            .and_then(|place| usize::try_from(place).ok())
            .filter(|place| place.saturating_add(width) <= image.len())
            .ok_or_else(|| {
                DebugInfoError::Malformed(format!("relocation at {offset:#x} past end of file"))
            })?;
        let addend = if with_addend {
            if table.is_64 {
                cursor.u64()? as i64
            } else {
                i64::from(cursor.u32()? as i32)
            }
        } else {
            read_uint(&image[place..place + width], table.endian) as i64
        };
        let value = symbol_value(table, symbols, symbol).wrapping_add_signed(addend);
        write_uint(&mut image[place..place + width], value, table.endian);
    }
    Ok(())
}

/// Width in bytes of the absolute data relocations debug sections use.
/// Every other relocation type is left alone.
fn relocation_width(machine: u16, kind: u32) -> Option<usize> {
    const EM_386: u16 = 3;
    const EM_PPC: u16 = 20;
    const EM_PPC64: u16 = 21;
    const EM_ARM: u16 = 40;
    const EM_X86_64: u16 = 62;
    const EM_AARCH64: u16 = 183;
    const EM_RISCV: u16 = 243;
    const EM_LOONGARCH: u16 = 258;

    match (machine, kind) {
        (EM_X86_64, 1) | (EM_AARCH64, 257) | (EM_RISCV, 2) | (EM_PPC64, 38) | (EM_LOONGARCH, 2) => {
            Some(8)
        }
        (EM_X86_64, 10 | 11)
        | (EM_386, 1)
        | (EM_ARM, 2)
        | (EM_AARCH64, 258)
        | (EM_RISCV, 1)
        | (EM_PPC | EM_PPC64, 1)
        | (EM_LOONGARCH, 1) => Some(4),
        _ => None,
    }
}

/// `st_value` of entry `index` in a symbol table; zero when out of range.
fn symbol_value(table: &SectionTable<'_>, symbols: &[u8], index: u64) -> u64 {
    let (entsize, value_at) = if table.is_64 { (24, 8) } else { (16, 4) };
    let Some(at) = index.checked_mul(entsize).and_then(|at| at.checked_add(value_at)) else {
        return 0;
    };
    Cursor::at(symbols, at, table.endian)
        .and_then(|mut cursor| cursor.offset(table.is_64))
        .unwrap_or(0)
}

fn read_uint(bytes: &[u8], endian: Endian) -> u64 {
    let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
    match endian {
        Endian::Little => bytes.iter().rev().fold(0, fold),
        Endian::Big => bytes.iter().fold(0, fold),
    }
}

fn write_uint(bytes: &mut [u8], value: u64, endian: Endian) {
    let width = bytes.len();
    for (i, byte) in bytes.iter_mut().enumerate() {
        let shift = match endian {
            Endian::Little => i * 8,
            Endian::Big => (width - 1 - i) * 8,
        };
        *byte = (value >> shift) as u8;
    }
}

/// Names of `STT_FUNC` entries in `.symtab`.
pub(crate) fn function_symbols(sections: &ElfSections<'_>) -> Vec<String> {
    const STT_FUNC: u8 = 2;
    let (Some(symtab), Some(strtab)) = (sections.symtab, sections.strtab) else {
        return Vec::new();
    };
    let entsize = if sections.is_64 { 24 } else { 16 };
    let mut names = Vec::new();
    for entry in symtab.chunks_exact(entsize) {
        let mut cursor = Cursor::new(entry, sections.endian());
        let Ok(name_off) = cursor.u32() else { continue };
        let info = if sections.is_64 {
            entry[4]
        } else {
            entry[12]
        };
        if info & 0xf != STT_FUNC || name_off == 0 {
            continue;
        }
        if let Ok(name) = cstr_at(strtab, u64::from(name_off)) {
            names.push(String::from_utf8_lossy(name).into_owned());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relocation_widths() {
        assert_eq!(relocation_width(62, 1), Some(8));
        assert_eq!(relocation_width(62, 10), Some(4));
        assert_eq!(relocation_width(183, 258), Some(4));
        assert_eq!(relocation_width(3, 1), Some(4));
        // R_X86_64_PC32 never appears in debug sections
        assert_eq!(relocation_width(62, 2), None);
        assert_eq!(relocation_width(0, 1), None);
    }

    #[test]
    fn test_uint_byte_order() {
        let mut le = [0u8; 4];
        write_uint(&mut le, 0x1122_3344, Endian::Little);
        assert_eq!(le, [0x44, 0x33, 0x22, 0x11]);
        assert_eq!(read_uint(&le, Endian::Little), 0x1122_3344);

        let mut be = [0u8; 8];
        write_uint(&mut be, 0x0102, Endian::Big);
        assert_eq!(be, [0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(read_uint(&be, Endian::Big), 0x0102);
    }

    #[test]
    fn test_image_without_relocations_is_borrowed() {
        let mut header = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
        header.resize(64, 0);
        assert!(matches!(relocate_debug_sections(&header), Ok(Cow::Borrowed(_))));
        assert!(relocate_debug_sections(b"MZ not an elf").is_err());
    }
}
