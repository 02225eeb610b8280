//! `.debug_abbrev` and `.debug_info` walking.
//!
//! Only a handful of attributes are interpreted; everything else is skipped
//! by form so the walk can cross any DIE the producer emits.

use super::super::DebugInfoError;
use super::elf::ElfSections;
use crate::binary::cursor::{cstr_at, Cursor, CursorResult, Endian};
use std::collections::HashMap;

const DW_TAG_COMPILE_UNIT: u64 = 0x11;
const DW_TAG_PARTIAL_UNIT: u64 = 0x3c;
const DW_TAG_SKELETON_UNIT: u64 = 0x4a;
const DW_TAG_SUBPROGRAM: u64 = 0x2e;

const DW_AT_NAME: u64 = 0x03;
const DW_AT_STMT_LIST: u64 = 0x10;
const DW_AT_COMP_DIR: u64 = 0x1b;
const DW_AT_LINKAGE_NAME: u64 = 0x6e;
const DW_AT_MIPS_LINKAGE_NAME: u64 = 0x2007;
const DW_AT_STR_OFFSETS_BASE: u64 = 0x72;

const DW_FORM_IMPLICIT_CONST: u64 = 0x21;

const DW_UT_SKELETON: u8 = 0x04;
const DW_UT_SPLIT_COMPILE: u8 = 0x05;
const DW_UT_TYPE: u8 = 0x02;
const DW_UT_SPLIT_TYPE: u8 = 0x06;

#[derive(Debug, Clone)]
struct AttrSpec {
    name: u64,
    form: u64,
    implicit_const: i64,
}

#[derive(Debug, Clone)]
struct Abbrev {
    tag: u64,
    has_children: bool,
    attrs: Vec<AttrSpec>,
}

type AbbrevTable = HashMap<u64, Abbrev>;

fn parse_abbrevs(data: &[u8], offset: u64, endian: Endian) -> CursorResult<AbbrevTable> {
    let mut cursor = Cursor::at(data, offset, endian)?;
    let mut table = AbbrevTable::new();
    loop {
        let code = cursor.uleb128()?;
        if code == 0 {
            return Ok(table);
        }
        let tag = cursor.uleb128()?;
        let has_children = cursor.u8()? != 0;
        let mut attrs = Vec::new();
        loop {
            let name = cursor.uleb128()?;
            let form = cursor.uleb128()?;
            if name == 0 && form == 0 {
                break;
            }
            let implicit_const = if form == DW_FORM_IMPLICIT_CONST {
                cursor.sleb128()?
            } else {
                0
            };
            attrs.push(AttrSpec {
                name,
                form,
                implicit_const,
            });
        }
        table.insert(
            code,
            Abbrev {
                tag,
                has_children,
                attrs,
            },
        );
    }
}

/// Encoding parameters shared by every DIE in a unit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnitEncoding {
    pub version: u16,
    pub is_dwarf64: bool,
    pub address_size: u8,
}

/// A string-valued attribute before section lookups.
#[derive(Debug, Clone, Copy)]
enum RawString<'a> {
    Inline(&'a [u8]),
    Strp(u64),
    LineStrp(u64),
    Strx(u64),
}

/// Attribute values that matter here, decoded from one form.
#[derive(Debug, Clone, Copy)]
enum Value<'a> {
    Str(RawString<'a>),
    Unsigned(u64),
    Other,
}

fn read_value<'a>(
    cursor: &mut Cursor<'a>,
    form: u64,
    implicit_const: i64,
    enc: UnitEncoding,
) -> Result<Value<'a>, DebugInfoError> {
    let offset_size = if enc.is_dwarf64 { 8 } else { 4 };
    let value = match form {
        // addr
        0x01 => Value::Unsigned(cursor.uint(enc.address_size)?),
        // block2, block4, block, block1, exprloc
        0x03 => {
            let len = cursor.u16()?;
            cursor.skip(u64::from(len))?;
            Value::Other
        }
        0x04 => {
            let len = cursor.u32()?;
            cursor.skip(u64::from(len))?;
            Value::Other
        }
        0x09 | 0x18 => {
            let len = cursor.uleb128()?;
            cursor.skip(len)?;
            Value::Other
        }
        0x0a => {
            let len = cursor.u8()?;
            cursor.skip(u64::from(len))?;
            Value::Other
        }
        // data1/2/4/8, flag, ref1/2/4/8, ref_sig8, ref_sup8, strx1-4, addrx1-4
        0x0b | 0x0c | 0x11 => Value::Unsigned(u64::from(cursor.u8()?)),
        0x05 | 0x12 => Value::Unsigned(u64::from(cursor.u16()?)),
        0x06 | 0x13 => Value::Unsigned(u64::from(cursor.u32()?)),
        0x07 | 0x14 | 0x20 | 0x24 => Value::Unsigned(cursor.u64()?),
        0x1e => {
            cursor.skip(16)?;
            Value::Other
        }
        0x25 => Value::Str(RawString::Strx(u64::from(cursor.u8()?))),
        0x26 => Value::Str(RawString::Strx(u64::from(cursor.u16()?))),
        0x27 => Value::Str(RawString::Strx(cursor.u24()?)),
        0x28 => Value::Str(RawString::Strx(u64::from(cursor.u32()?))),
        0x29 => Value::Unsigned(u64::from(cursor.u8()?)),
        0x2a => Value::Unsigned(u64::from(cursor.u16()?)),
        0x2b => Value::Unsigned(cursor.u24()?),
        0x2c => Value::Unsigned(u64::from(cursor.u32()?)),
        // string
        0x08 => Value::Str(RawString::Inline(cursor.cstr()?)),
        // sdata, udata, ref_udata, strx, addrx, loclistx, rnglistx
        0x0d => Value::Unsigned(cursor.sleb128()? as u64),
        0x0f | 0x15 | 0x1b | 0x22 | 0x23 => Value::Unsigned(cursor.uleb128()?),
        0x1a => Value::Str(RawString::Strx(cursor.uleb128()?)),
        // strp, line_strp, sec_offset, ref_addr (v3+), strp_sup, ref_sup4
        0x0e => Value::Str(RawString::Strp(cursor.offset(enc.is_dwarf64)?)),
        0x1f => Value::Str(RawString::LineStrp(cursor.offset(enc.is_dwarf64)?)),
        0x17 | 0x1d => Value::Unsigned(cursor.offset(enc.is_dwarf64)?),
        0x10 => {
            if enc.version <= 2 {
                cursor.uint(enc.address_size)?;
            } else {
                cursor.uint(offset_size)?;
            }
            Value::Other
        }
        0x1c => {
            cursor.u32()?;
            Value::Other
        }
        // flag_present, implicit_const
        0x19 => Value::Unsigned(1),
        DW_FORM_IMPLICIT_CONST => Value::Unsigned(implicit_const as u64),
        // indirect
        0x16 => {
            let actual = cursor.uleb128()?;
            let implicit = if actual == DW_FORM_IMPLICIT_CONST {
                cursor.sleb128()?
            } else {
                0
            };
            return read_value(cursor, actual, implicit, enc);
        }
        // GNU_addr_index, GNU_str_index
        0x1f01 => Value::Unsigned(cursor.uleb128()?),
        0x1f02 => Value::Str(RawString::Strx(cursor.uleb128()?)),
        // GNU_ref_alt, GNU_strp_alt point into a supplementary file
        0x1f20 | 0x1f21 => {
            cursor.offset(enc.is_dwarf64)?;
            Value::Other
        }
        other => {
            return Err(DebugInfoError::Malformed(format!(
                "unknown attribute form {other:#x}"
            )))
        }
    };
    Ok(value)
}

/// Compile unit level facts collected from `.debug_info`.
#[derive(Debug, Clone, Default)]
pub(crate) struct UnitSummary {
    pub name: Option<String>,
    pub comp_dir: Option<String>,
    pub stmt_list: Option<u64>,
    pub functions: Vec<String>,
}

/// Everything recovered from `.debug_info`.
#[derive(Debug, Default)]
pub(crate) struct InfoSummary {
    pub units: Vec<UnitSummary>,
    /// Units that could not be decoded and were skipped
    pub malformed_units: usize,
}

/// Resolves string attributes against the string sections.
struct Strings<'a, 's> {
    sections: &'s ElfSections<'a>,
    str_offsets_base: Option<u64>,
    is_dwarf64: bool,
}

impl Strings<'_, '_> {
    fn resolve(&self, raw: RawString<'_>) -> Option<String> {
        let bytes = match raw {
            RawString::Inline(bytes) => bytes,
            RawString::Strp(offset) => cstr_at(self.sections.debug_str?, offset).ok()?,
            RawString::LineStrp(offset) => {
                cstr_at(self.sections.debug_line_str?, offset).ok()?
            }
            RawString::Strx(index) => {
                let table = self.sections.debug_str_offsets?;
                let entry_size = if self.is_dwarf64 { 8 } else { 4 };
                // DWARF 5 producers always emit the base; 8 skips the table header.
                let base = self.str_offsets_base.unwrap_or(8);
                let at = base.checked_add(index.checked_mul(entry_size)?)?;
                let mut cursor = Cursor::at(table, at, self.sections.endian()).ok()?;
                let offset = cursor.offset(self.is_dwarf64).ok()?;
                cstr_at(self.sections.debug_str?, offset).ok()?
            }
        };
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Walk every unit in `.debug_info`.
///
/// A unit whose header or DIE stream cannot be decoded is counted and
/// skipped; walking continues at the next unit boundary.
pub(crate) fn read_info(sections: &ElfSections<'_>) -> Result<InfoSummary, DebugInfoError> {
    let info = sections.debug_info.ok_or(DebugInfoError::NoDebugInfo)?;
    let abbrev = sections
        .debug_abbrev
        .ok_or_else(|| DebugInfoError::Malformed("missing .debug_abbrev".to_string()))?;
    let endian = sections.endian();

    let mut summary = InfoSummary::default();
    let mut cursor = Cursor::new(info, endian);
    while !cursor.is_empty() {
        let mut length = u64::from(cursor.u32()?);
        let is_dwarf64 = length == 0xffff_ffff;
        if is_dwarf64 {
            length = cursor.u64()?;
        } else if length >= 0xffff_fff0 {
            return Err(DebugInfoError::Malformed(format!(
                "reserved unit length {length:#x}"
            )));
        }
        if length == 0 {
            continue;
        }
        let Ok(mut unit) = cursor.sub_cursor(length) else {
            // A length past the end of the section ends the walk.
            summary.malformed_units += 1;
            break;
        };
        match read_unit(&mut unit, abbrev, sections, is_dwarf64) {
            Ok(Some(unit_summary)) => summary.units.push(unit_summary),
            Ok(None) => {}
            Err(err) => {
                tracing::trace!(error = %err, "Skipping malformed compile unit");
                summary.malformed_units += 1;
            }
        }
    }
    Ok(summary)
}

fn read_unit(
    unit: &mut Cursor<'_>,
    abbrev_section: &[u8],
    sections: &ElfSections<'_>,
    is_dwarf64: bool,
) -> Result<Option<UnitSummary>, DebugInfoError> {
    let version = unit.u16()?;
    if !(2..=5).contains(&version) {
        return Err(DebugInfoError::Malformed(format!(
            "unsupported DWARF version {version}"
        )));
    }
    let (abbrev_offset, address_size) = if version >= 5 {
        let unit_type = unit.u8()?;
        let address_size = unit.u8()?;
        let abbrev_offset = unit.offset(is_dwarf64)?;
        match unit_type {
            DW_UT_SKELETON | DW_UT_SPLIT_COMPILE => {
                unit.u64()?;
            }
            DW_UT_TYPE | DW_UT_SPLIT_TYPE => {
                unit.u64()?;
                unit.offset(is_dwarf64)?;
            }
            _ => {}
        }
        (abbrev_offset, address_size)
    } else {
        let abbrev_offset = unit.offset(is_dwarf64)?;
        (abbrev_offset, unit.u8()?)
    };
    let enc = UnitEncoding {
        version,
        is_dwarf64,
        address_size,
    };
    let abbrevs = parse_abbrevs(abbrev_section, abbrev_offset, unit.endian())?;

    let mut strings = Strings {
        sections,
        str_offsets_base: None,
        is_dwarf64,
    };
    let mut summary: Option<UnitSummary> = None;
    let mut depth: usize = 0;
    while !unit.is_empty() {
        let code = unit.uleb128()?;
        if code == 0 {
            if depth == 0 {
                // Trailing padding after the unit's top-level DIE.
                continue;
            }
            depth -= 1;
            continue;
        }
        let abbrev = abbrevs
            .get(&code)
            .ok_or_else(|| DebugInfoError::Malformed(format!("unknown abbrev code {code}")))?;

        let mut name: Option<RawString<'_>> = None;
        let mut linkage_name: Option<RawString<'_>> = None;
        let mut comp_dir: Option<RawString<'_>> = None;
        let mut stmt_list: Option<u64> = None;
        for spec in &abbrev.attrs {
            let value = read_value(unit, spec.form, spec.implicit_const, enc)?;
            match (spec.name, value) {
                (DW_AT_NAME, Value::Str(raw)) => name = Some(raw),
                (DW_AT_LINKAGE_NAME | DW_AT_MIPS_LINKAGE_NAME, Value::Str(raw)) => {
                    linkage_name = Some(raw);
                }
                (DW_AT_COMP_DIR, Value::Str(raw)) => comp_dir = Some(raw),
                (DW_AT_STMT_LIST, Value::Unsigned(offset)) => stmt_list = Some(offset),
                (DW_AT_STR_OFFSETS_BASE, Value::Unsigned(base)) => {
                    strings.str_offsets_base = Some(base);
                }
                _ => {}
            }
        }

        match abbrev.tag {
            DW_TAG_COMPILE_UNIT | DW_TAG_PARTIAL_UNIT | DW_TAG_SKELETON_UNIT
                if summary.is_none() =>
            {
                summary = Some(UnitSummary {
                    name: name.and_then(|raw| strings.resolve(raw)),
                    comp_dir: comp_dir.and_then(|raw| strings.resolve(raw)),
                    stmt_list,
                    functions: Vec::new(),
                });
            }
            DW_TAG_SUBPROGRAM => {
                let resolved = name
                    .and_then(|raw| strings.resolve(raw))
                    .or_else(|| linkage_name.and_then(|raw| strings.resolve(raw)));
                if let (Some(function), Some(unit_summary)) = (resolved, summary.as_mut()) {
                    unit_summary.functions.push(function);
                }
            }
            _ => {}
        }

        if abbrev.has_children {
            depth += 1;
        }
    }
    Ok(summary)
}
