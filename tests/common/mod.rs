//! Binary fixtures.
//!
//! Most fixtures are relocatable objects assembled in memory with
//! `object::write`, with DWARF v4 sections encoded by hand. Objects built by
//! gcc from `tests/fixtures/fib.c` live next to that source and are loaded
//! with [`compiled_fixture`].

#![allow(dead_code)]

use object::write::{Object, Symbol, SymbolSection};
use object::write::StandardSegment;
use object::{Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope};
use std::path::{Path, PathBuf};

pub const COMP_DIR: &str = "/src";
pub const SOURCE_NAME: &str = "fib.c";
pub const FUNCTIONS: [&str; 2] = ["main", "fibonacci"];

/// Subprograms gcc emits for `tests/fixtures/fib.c`, sorted.
pub const COMPILED_FUNCTIONS: [&str; 4] = ["fibonacci", "helper", "main", "printf"];
/// Sources named by the line tables of the compiled fixtures, sorted.
pub const COMPILED_SOURCES: [&str; 2] = ["/src/fib.c", "/usr/include/stdio.h"];
/// gcc objects: DWARF 5 and DWARF 4 relocatable objects and a linked executable.
pub const COMPILED_FIXTURES: [&str; 3] = ["fib-dwarf5.o", "fib-dwarf4.o", "fib"];

/// Size of `.text`; keeps every table past the first kilobyte of the file.
const TEXT_SIZE: usize = 2048;

/// Interns strings into a `.debug_str` image.
#[derive(Default)]
struct StrTable {
    bytes: Vec<u8>,
}

impl StrTable {
    fn add(&mut self, s: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }
}

fn uleb(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn sleb(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// `.debug_abbrev`: a compile unit with children, and a childless subprogram.
fn debug_abbrev() -> Vec<u8> {
    vec![
        // 1: DW_TAG_compile_unit, children
        0x01, 0x11, 0x01,
        0x25, 0x0e, // producer: strp
        0x13, 0x05, // language: data2
        0x03, 0x0e, // name: strp
        0x1b, 0x0e, // comp_dir: strp
        0x10, 0x17, // stmt_list: sec_offset
        0x00, 0x00,
        // 2: DW_TAG_subprogram, no children
        0x02, 0x2e, 0x00,
        0x03, 0x0e, // name: strp
        0x3f, 0x19, // external: flag_present
        0x00, 0x00,
        0x00,
    ]
}

/// `.debug_info` and `.debug_str` for one C compile unit defining `functions`.
fn debug_info(functions: &[&str]) -> (Vec<u8>, Vec<u8>) {
    let mut strings = StrTable::default();
    let producer = strings.add("GNU C17 11.4.0 -g");
    let name = strings.add(SOURCE_NAME);
    let comp_dir = strings.add(COMP_DIR);

    let mut body = Vec::new();
    body.extend_from_slice(&4u16.to_le_bytes()); // version
    body.extend_from_slice(&0u32.to_le_bytes()); // debug_abbrev_offset
    body.push(8); // address_size

    body.push(1);
    body.extend_from_slice(&producer.to_le_bytes());
    body.extend_from_slice(&0x000cu16.to_le_bytes()); // DW_LANG_C99
    body.extend_from_slice(&name.to_le_bytes());
    body.extend_from_slice(&comp_dir.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // stmt_list
    for function in functions {
        body.push(2);
        body.extend_from_slice(&strings.add(function).to_le_bytes());
    }
    body.push(0);

    let mut info = (body.len() as u32).to_le_bytes().to_vec();
    info.extend_from_slice(&body);
    (info, strings.bytes)
}

/// `.debug_line` v4 with one file, wrapping `program`.
fn debug_line(program: &[u8]) -> Vec<u8> {
    let mut header = vec![
        1,    // minimum_instruction_length
        1,    // maximum_operations_per_instruction
        1,    // default_is_stmt
        0xfb, // line_base = -5
        14,   // line_range
        13,   // opcode_base
        0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1,
    ];
    header.extend_from_slice(COMP_DIR.as_bytes());
    header.extend_from_slice(&[0, 0]);
    header.extend_from_slice(SOURCE_NAME.as_bytes());
    header.extend_from_slice(&[0, 1, 0, 0, 0]);

    let mut body = 4u16.to_le_bytes().to_vec();
    body.extend_from_slice(&(header.len() as u32).to_le_bytes());
    body.extend_from_slice(&header);
    body.extend_from_slice(program);

    let mut line = (body.len() as u32).to_le_bytes().to_vec();
    line.extend_from_slice(&body);
    line
}

/// Two rows at 0x1000 and 0x1010, then end_sequence.
fn two_row_program() -> Vec<u8> {
    let mut program = vec![0x00, 9, 0x02];
    program.extend_from_slice(&0x1000u64.to_le_bytes());
    program.push(0x03); // advance_line
    sleb(&mut program, 2);
    program.push(0x01); // copy
    program.push(0x02); // advance_pc
    uleb(&mut program, 16);
    program.push(0x03);
    sleb(&mut program, 5);
    program.push(0x01);
    program.push(0x02);
    uleb(&mut program, 8);
    program.extend_from_slice(&[0x00, 1, 0x01]); // end_sequence
    program
}

/// Object in `format` with text symbols for `functions` and, when
/// `line_program` is given, DWARF v4 describing them.
fn object_file(format: BinaryFormat, functions: &[&str], line_program: Option<&[u8]>) -> Vec<u8> {
    let mut obj = Object::new(format, Architecture::X86_64, Endianness::Little);
    let text_segment = obj.segment_name(StandardSegment::Text).to_vec();
    let text = obj.add_section(text_segment, b".text".to_vec(), SectionKind::Text);
    obj.append_section_data(text, &[0x90; TEXT_SIZE], 16);

    let step = (TEXT_SIZE / functions.len().max(1)) as u64;
    for (i, function) in functions.iter().enumerate() {
        obj.add_symbol(Symbol {
            name: function.as_bytes().to_vec(),
            value: i as u64 * step,
            size: step,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
    }

    if let Some(program) = line_program {
        let (info, strings) = debug_info(functions);
        let debug_segment = obj.segment_name(StandardSegment::Debug).to_vec();
        for (name, data) in [
            (".debug_abbrev", debug_abbrev()),
            (".debug_info", info),
            (".debug_str", strings),
            (".debug_line", debug_line(program)),
        ] {
            // Mach-O spells the DWARF sections `__debug_*` inside `__DWARF`
            let name = match format {
                BinaryFormat::MachO => name.replacen(".debug_", "__debug_", 1),
                _ => name.to_string(),
            };
            let id = obj.add_section(debug_segment.clone(), name.into_bytes(), SectionKind::Debug);
            obj.append_section_data(id, &data, 1);
        }
    }

    obj.write().expect("write object fixture")
}

/// Relocatable x86-64 ELF object with text symbols for `functions` and,
/// when `with_dwarf`, DWARF v4 describing them.
pub fn elf_object(functions: &[&str], with_dwarf: bool) -> Vec<u8> {
    let program = two_row_program();
    object_file(BinaryFormat::Elf, functions, with_dwarf.then_some(program.as_slice()))
}

/// The `main`/`fibonacci` object as a Mach-O file with `__DWARF` sections.
pub fn macho_fibonacci_object() -> Vec<u8> {
    let program = two_row_program();
    object_file(BinaryFormat::MachO, &FUNCTIONS, Some(&program))
}

/// The `main`/`fibonacci` ELF object whose line program stops in the middle
/// of an extended opcode. The line table header is intact.
pub fn broken_line_object() -> Vec<u8> {
    object_file(BinaryFormat::Elf, &FUNCTIONS, Some(&[0x00, 0x7f]))
}

/// The `main`/`fibonacci` object with debug info.
pub fn fibonacci_object() -> Vec<u8> {
    elf_object(&FUNCTIONS, true)
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

/// Path of a gcc-built object under `tests/fixtures`.
pub fn compiled_fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
