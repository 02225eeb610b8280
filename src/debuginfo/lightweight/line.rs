//! `.debug_line` header decoding and line-number state machine.

use super::super::{join_path, DebugInfoError, LineInfo};
use super::elf::ElfSections;
use crate::binary::cursor::{cstr_at, Cursor};

const DW_LNS_COPY: u8 = 1;
const DW_LNS_ADVANCE_PC: u8 = 2;
const DW_LNS_ADVANCE_LINE: u8 = 3;
const DW_LNS_SET_FILE: u8 = 4;
const DW_LNS_SET_COLUMN: u8 = 5;
const DW_LNS_NEGATE_STMT: u8 = 6;
const DW_LNS_SET_BASIC_BLOCK: u8 = 7;
const DW_LNS_CONST_ADD_PC: u8 = 8;
const DW_LNS_FIXED_ADVANCE_PC: u8 = 9;
const DW_LNS_SET_PROLOGUE_END: u8 = 10;
const DW_LNS_SET_EPILOGUE_BEGIN: u8 = 11;
const DW_LNS_SET_ISA: u8 = 12;

const DW_LNE_END_SEQUENCE: u8 = 1;
const DW_LNE_SET_ADDRESS: u8 = 2;

const DW_LNCT_PATH: u64 = 1;
const DW_LNCT_DIRECTORY_INDEX: u64 = 2;

const DW_FORM_STRING: u64 = 0x08;
const DW_FORM_LINE_STRP: u64 = 0x1f;
const DW_FORM_STRP: u64 = 0x0e;
const DW_FORM_UDATA: u64 = 0x0f;
const DW_FORM_DATA1: u64 = 0x0b;
const DW_FORM_DATA2: u64 = 0x05;
const DW_FORM_DATA4: u64 = 0x06;
const DW_FORM_DATA8: u64 = 0x07;
const DW_FORM_DATA16: u64 = 0x1e;
const DW_FORM_BLOCK: u64 = 0x09;

/// Decoded line table for one compile unit.
#[derive(Debug, Default)]
pub(crate) struct LineTable {
    /// Every file the header names, joined with its directory
    pub files: Vec<String>,
    pub rows: Vec<LineInfo>,
}

struct Header {
    version: u16,
    address_size: u8,
    min_inst_length: u8,
    max_ops_per_inst: u8,
    line_base: i8,
    line_range: u8,
    opcode_base: u8,
    standard_lengths: Vec<u8>,
    dirs: Vec<String>,
    files: Vec<(String, u64)>,
}

impl Header {
    /// Full path of file `index` as referenced by `DW_LNS_set_file`.
    fn file_path(&self, index: u64, comp_dir: Option<&str>) -> Option<String> {
        let idx = if self.version >= 5 {
            index
        } else {
            index.checked_sub(1)?
        };
        let (name, dir_index) = self.files.get(usize::try_from(idx).ok()?)?;
        Some(self.join(name, *dir_index, comp_dir))
    }

    fn join(&self, name: &str, dir_index: u64, comp_dir: Option<&str>) -> String {
        // Before DWARF 5 directory 0 is the compilation directory.
        let dir = if self.version < 5 && dir_index == 0 {
            comp_dir.map(str::to_string)
        } else {
            let idx = if self.version >= 5 {
                dir_index
            } else {
                dir_index - 1
            };
            usize::try_from(idx)
                .ok()
                .and_then(|i| self.dirs.get(i))
                .cloned()
        };
        join_path(dir.as_deref(), name)
    }
}

/// Decode the line program at `offset` in `.debug_line`.
pub(crate) fn read_line_table(
    sections: &ElfSections<'_>,
    offset: u64,
    comp_dir: Option<&str>,
) -> Result<LineTable, DebugInfoError> {
    let data = sections.debug_line.ok_or(DebugInfoError::NoDebugInfo)?;
    let mut outer = Cursor::at(data, offset, sections.endian())?;

    let mut length = u64::from(outer.u32()?);
    let is_dwarf64 = length == 0xffff_ffff;
    if is_dwarf64 {
        length = outer.u64()?;
    } else if length >= 0xffff_fff0 {
        return Err(DebugInfoError::Malformed(format!(
            "reserved line table length {length:#x}"
        )));
    }
    let mut unit = outer.sub_cursor(length)?;
    let header = read_header(&mut unit, sections, is_dwarf64)?;

    let files = header
        .files
        .iter()
        .map(|(name, dir)| header.join(name, *dir, comp_dir))
        .collect();
    let rows = run_program(&mut unit, &header, comp_dir)?;
    Ok(LineTable { files, rows })
}

fn read_header(
    unit: &mut Cursor<'_>,
    sections: &ElfSections<'_>,
    is_dwarf64: bool,
) -> Result<Header, DebugInfoError> {
    let version = unit.u16()?;
    if !(2..=5).contains(&version) {
        return Err(DebugInfoError::Malformed(format!(
            "unsupported line table version {version}"
        )));
    }
    let mut address_size = 8;
    if version >= 5 {
        address_size = unit.u8()?;
        let _segment_selector_size = unit.u8()?;
    }
    let header_length = unit.offset(is_dwarf64)?;
    let program_start = (unit.position() as u64)
        .checked_add(header_length)
        .ok_or_else(|| DebugInfoError::Malformed("header length overflows".to_string()))?;

    let min_inst_length = unit.u8()?;
    let max_ops_per_inst = if version >= 4 { unit.u8()? } else { 1 };
    let _default_is_stmt = unit.u8()?;
    let line_base = unit.i8()?;
    let line_range = unit.u8()?;
    if line_range == 0 {
        return Err(DebugInfoError::Malformed("line_range is zero".to_string()));
    }
    let opcode_base = unit.u8()?;
    let standard_lengths = unit
        .bytes(usize::from(opcode_base.saturating_sub(1)))?
        .to_vec();

    let mut header = Header {
        version,
        address_size,
        min_inst_length,
        max_ops_per_inst,
        line_base,
        line_range,
        opcode_base,
        standard_lengths,
        dirs: Vec::new(),
        files: Vec::new(),
    };

    if version >= 5 {
        header.dirs = read_v5_entries(unit, sections, is_dwarf64)?
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        header.files = read_v5_entries(unit, sections, is_dwarf64)?;
    } else {
        loop {
            let dir = unit.cstr()?;
            if dir.is_empty() {
                break;
            }
            header.dirs.push(String::from_utf8_lossy(dir).into_owned());
        }
        loop {
            let name = unit.cstr()?;
            if name.is_empty() {
                break;
            }
            let dir_index = unit.uleb128()?;
            let _mtime = unit.uleb128()?;
            let _length = unit.uleb128()?;
            header
                .files
                .push((String::from_utf8_lossy(name).into_owned(), dir_index));
        }
    }

    unit.seek(program_start)?;
    Ok(header)
}

/// DWARF 5 directory or file entry list: `(path, directory index)` pairs.
fn read_v5_entries(
    unit: &mut Cursor<'_>,
    sections: &ElfSections<'_>,
    is_dwarf64: bool,
) -> Result<Vec<(String, u64)>, DebugInfoError> {
    let format_count = unit.u8()?;
    let mut formats = Vec::with_capacity(usize::from(format_count));
    for _ in 0..format_count {
        formats.push((unit.uleb128()?, unit.uleb128()?));
    }
    let count = unit.uleb128()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let mut path = String::new();
        let mut dir_index = 0;
        for &(content, form) in &formats {
            let value = read_entry_value(unit, sections, form, is_dwarf64)?;
            match (content, value) {
                (DW_LNCT_PATH, EntryValue::Text(text)) => path = text,
                (DW_LNCT_DIRECTORY_INDEX, EntryValue::Number(n)) => dir_index = n,
                _ => {}
            }
        }
        entries.push((path, dir_index));
    }
    Ok(entries)
}

enum EntryValue {
    Text(String),
    Number(u64),
    Skipped,
}

fn read_entry_value(
    unit: &mut Cursor<'_>,
    sections: &ElfSections<'_>,
    form: u64,
    is_dwarf64: bool,
) -> Result<EntryValue, DebugInfoError> {
    let lookup = |table: Option<&[u8]>, offset: u64| -> EntryValue {
        table
            .and_then(|t| cstr_at(t, offset).ok())
            .map_or(EntryValue::Skipped, |s| {
                EntryValue::Text(String::from_utf8_lossy(s).into_owned())
            })
    };
    Ok(match form {
        DW_FORM_STRING => EntryValue::Text(String::from_utf8_lossy(unit.cstr()?).into_owned()),
        DW_FORM_LINE_STRP => lookup(sections.debug_line_str, unit.offset(is_dwarf64)?),
        DW_FORM_STRP => lookup(sections.debug_str, unit.offset(is_dwarf64)?),
        DW_FORM_UDATA => EntryValue::Number(unit.uleb128()?),
        DW_FORM_DATA1 => EntryValue::Number(u64::from(unit.u8()?)),
        DW_FORM_DATA2 => EntryValue::Number(u64::from(unit.u16()?)),
        DW_FORM_DATA4 => EntryValue::Number(u64::from(unit.u32()?)),
        DW_FORM_DATA8 => EntryValue::Number(unit.u64()?),
        DW_FORM_DATA16 => {
            unit.skip(16)?;
            EntryValue::Skipped
        }
        DW_FORM_BLOCK => {
            let len = unit.uleb128()?;
            unit.skip(len)?;
            EntryValue::Skipped
        }
        other => {
            return Err(DebugInfoError::Malformed(format!(
                "unsupported line table entry form {other:#x}"
            )))
        }
    })
}

struct Registers {
    address: u64,
    op_index: u64,
    file: u64,
    line: u64,
}

impl Registers {
    fn new() -> Self {
        Self {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
        }
    }

    fn advance(&mut self, header: &Header, operation_advance: u64) {
        let min_inst = u64::from(header.min_inst_length);
        let max_ops = u64::from(header.max_ops_per_inst.max(1));
        if max_ops == 1 {
            self.address = self
                .address
                .wrapping_add(min_inst.wrapping_mul(operation_advance));
        } else {
            let total = self.op_index.wrapping_add(operation_advance);
            self.address = self
                .address
                .wrapping_add(min_inst.wrapping_mul(total / max_ops));
            self.op_index = total % max_ops;
        }
    }

    fn add_line(&mut self, delta: i64) {
        self.line = self.line.wrapping_add_signed(delta);
    }
}

fn run_program(
    unit: &mut Cursor<'_>,
    header: &Header,
    comp_dir: Option<&str>,
) -> Result<Vec<LineInfo>, DebugInfoError> {
    let mut rows = Vec::new();
    let mut regs = Registers::new();
    let emit = |regs: &Registers, rows: &mut Vec<LineInfo>| {
        rows.push(LineInfo {
            file: header.file_path(regs.file, comp_dir).unwrap_or_default(),
            line: regs.line,
            address: regs.address,
        });
    };
    while !unit.is_empty() {
        let opcode = unit.u8()?;
        if opcode >= header.opcode_base {
            let adjusted = opcode - header.opcode_base;
            regs.advance(header, u64::from(adjusted / header.line_range));
            regs.add_line(i64::from(header.line_base) + i64::from(adjusted % header.line_range));
            emit(&regs, &mut rows);
            continue;
        }
        match opcode {
            0 => {
                let len = unit.uleb128()?;
                let mut ext = unit.sub_cursor(len)?;
                if ext.is_empty() {
                    continue;
                }
                match ext.u8()? {
                    DW_LNE_END_SEQUENCE => regs = Registers::new(),
                    DW_LNE_SET_ADDRESS => {
                        let size = u8::try_from(ext.remaining()).unwrap_or(header.address_size);
                        regs.address = ext.uint(size)?;
                        regs.op_index = 0;
                    }
                    // define_file, set_discriminator and vendor extensions
                    _ => {}
                }
            }
            DW_LNS_COPY => emit(&regs, &mut rows),
            DW_LNS_ADVANCE_PC => {
                let advance = unit.uleb128()?;
                regs.advance(header, advance);
            }
            DW_LNS_ADVANCE_LINE => {
                let delta = unit.sleb128()?;
                regs.add_line(delta);
            }
            DW_LNS_SET_FILE => regs.file = unit.uleb128()?,
            DW_LNS_SET_COLUMN => {
                unit.uleb128()?;
            }
            DW_LNS_NEGATE_STMT | DW_LNS_SET_BASIC_BLOCK | DW_LNS_SET_PROLOGUE_END
            | DW_LNS_SET_EPILOGUE_BEGIN => {}
            DW_LNS_CONST_ADD_PC => {
                let adjusted = 255 - header.opcode_base;
                regs.advance(header, u64::from(adjusted / header.line_range));
            }
            DW_LNS_FIXED_ADVANCE_PC => {
                regs.address = regs.address.wrapping_add(u64::from(unit.u16()?));
                regs.op_index = 0;
            }
            DW_LNS_SET_ISA => {
                unit.uleb128()?;
            }
            other => {
                // Unknown standard opcode: skip its declared ULEB operands.
                let operands = header
                    .standard_lengths
                    .get(usize::from(other) - 1)
                    .copied()
                    .unwrap_or(0);
                for _ in 0..operands {
                    unit.uleb128()?;
                }
            }
        }
    }
    Ok(rows)
}
