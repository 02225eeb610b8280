//! Integration tests for sbom-binscan
//!
//! These tests run the extractors, the session and the comparison engine
//! over objects assembled in memory by `common` and over gcc output checked
//! in under `tests/fixtures`.

mod common;

use sbom_binscan::{
    debuginfo::AuthoritativeExtractor, detect_file_format, detect_format, diff, BinaryFormat,
    DebugInfoError, DebugInfoExtractor, DifferenceType, DualStrategyExtractor, FileType, FormatFactory,
    FormatHandler, LightweightExtractor, SbomComponent, SbomSession, ScanConfig,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Fixtures
// ============================================================================

fn fibonacci_fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = common::write_fixture(dir.path(), "fib.o", &common::fibonacci_object());
    (dir, path)
}

fn written_fixture(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = common::write_fixture(dir.path(), name, bytes);
    (dir, path)
}

fn truncated_fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let bytes = common::fibonacci_object();
    let path = common::write_fixture(dir.path(), "truncated.o", &bytes[..1000]);
    (dir, path)
}

/// Run `check` against each strategy in turn. The authoritative extractor
/// holds the process-wide guard, so it is dropped before the dual extractor
/// is built.
fn for_each_extractor(mut check: impl FnMut(&dyn DebugInfoExtractor)) {
    check(&AuthoritativeExtractor::new());
    check(&LightweightExtractor::new());
    check(&DualStrategyExtractor::new());
}

// ============================================================================
// Binary Readers
// ============================================================================

mod binary_tests {
    use super::*;
    use sbom_binscan::binary::{extract_dependencies, extract_sections, extract_symbols, file_type_of};

    #[test]
    fn test_fixture_is_an_elf_object() {
        let (_dir, path) = fibonacci_fixture();
        assert_eq!(detect_file_format(&path).unwrap(), BinaryFormat::Elf);
        assert_eq!(file_type_of(&path).unwrap(), FileType::Object);

        let symbols = extract_symbols(&path).unwrap();
        for function in common::FUNCTIONS {
            assert!(symbols.iter().any(|s| s.name == function), "missing symbol {function}");
        }

        let sections = extract_sections(&path).unwrap();
        assert!(sections.iter().any(|s| s.name == ".text"));
        assert!(sections.iter().any(|s| s.name == ".debug_info" && s.flags.debug));

        // A relocatable object has no dynamic section
        assert!(extract_dependencies(&path).unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_sniffs_as_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = common::write_fixture(dir.path(), "empty", &[]);
        assert_eq!(detect_format(&[]), BinaryFormat::Unknown);
        assert!(matches!(detect_file_format(&path), Ok(BinaryFormat::Unknown) | Err(_)));
        assert!(extract_symbols(&path).is_err());
    }

    #[test]
    fn test_truncated_elf_fails_every_reader() {
        let (_dir, path) = truncated_fixture();
        // The magic survives truncation
        assert_eq!(detect_file_format(&path).unwrap(), BinaryFormat::Elf);

        assert!(extract_symbols(&path).is_err());
        assert!(extract_sections(&path).is_err());
        assert!(extract_dependencies(&path).is_err());
    }
}

// ============================================================================
// Debug Info Extraction
// ============================================================================

mod debuginfo_tests {
    use super::*;

    #[test]
    fn test_functions_found_by_every_strategy() {
        let (_dir, path) = fibonacci_fixture();
        for_each_extractor(|extractor| {
            let functions = extractor.extract_functions(&path).unwrap();
            for function in common::FUNCTIONS {
                assert!(
                    functions.iter().any(|f| f == function),
                    "{} missed {function}: {functions:?}",
                    extractor.strategy()
                );
            }
            assert!(extractor.has_dwarf_info(&path), "{}", extractor.strategy());
        });
    }

    #[test]
    fn test_source_files_and_units() {
        let (_dir, path) = fibonacci_fixture();
        let expected = format!("{}/{}", common::COMP_DIR, common::SOURCE_NAME);
        for_each_extractor(|extractor| {
            let files = extractor.extract_source_files(&path).unwrap();
            assert!(files.contains(&expected), "{}: {files:?}", extractor.strategy());

            let units = extractor.extract_compile_units(&path).unwrap();
            assert!(
                units.iter().any(|u| u.ends_with(common::SOURCE_NAME)),
                "{}: {units:?}",
                extractor.strategy()
            );
        });
    }

    #[test]
    fn test_extract_all_matches_individual_calls() {
        let (_dir, path) = fibonacci_fixture();
        let extractor = LightweightExtractor::new();
        let all = extractor.extract_all_debug_info(&path).unwrap();
        assert_eq!(all.functions, extractor.extract_functions(&path).unwrap());
        assert_eq!(all.source_files, extractor.extract_source_files(&path).unwrap());
        assert!(!all.strategy.is_empty());
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let (_dir, path) = fibonacci_fixture();
        let extractor = DualStrategyExtractor::new();
        let first = extractor.extract_all_debug_info(&path).unwrap();
        let second = extractor.extract_all_debug_info(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_object_without_dwarf() {
        let dir = tempfile::tempdir().unwrap();
        let path = common::write_fixture(
            dir.path(),
            "plain.o",
            &common::elf_object(&common::FUNCTIONS, false),
        );
        for_each_extractor(|extractor| {
            assert!(!extractor.has_dwarf_info(&path), "{}", extractor.strategy());
            assert!(extractor.extract_source_files(&path).is_err(), "{}", extractor.strategy());
        });
    }

    #[test]
    fn test_truncated_elf_yields_nothing() {
        let (_dir, path) = truncated_fixture();
        for_each_extractor(|extractor| {
            let strategy = extractor.strategy();
            assert!(!extractor.has_dwarf_info(&path), "{strategy}");
            assert!(extractor.extract_source_files(&path).is_err(), "{strategy}");
            assert!(extractor.extract_compile_units(&path).is_err(), "{strategy}");
            assert!(extractor.extract_functions(&path).is_err(), "{strategy}");
            assert!(extractor.extract_line_info(&path).is_err(), "{strategy}");
            assert!(extractor.extract_all_debug_info(&path).is_err(), "{strategy}");
        });
    }

    #[test]
    fn test_compiled_objects_agree_across_strategies() {
        const LINES: [u64; 12] = [4, 5, 6, 9, 10, 11, 12, 13, 16, 17, 18, 19];
        for name in common::COMPILED_FIXTURES {
            let path = common::compiled_fixture(name);
            for_each_extractor(|extractor| {
                let strategy = extractor.strategy();
                assert!(extractor.has_dwarf_info(&path), "{strategy} {name}");
                assert_eq!(
                    extractor.extract_functions(&path).unwrap(),
                    common::COMPILED_FUNCTIONS,
                    "{strategy} {name}"
                );
                assert_eq!(
                    extractor.extract_source_files(&path).unwrap(),
                    common::COMPILED_SOURCES,
                    "{strategy} {name}"
                );
                assert_eq!(
                    extractor.extract_compile_units(&path).unwrap(),
                    [common::SOURCE_NAME],
                    "{strategy} {name}"
                );

                let rows = extractor.extract_line_info(&path).unwrap();
                assert!(rows.iter().all(|row| row.file == "/src/fib.c"), "{strategy} {name}");
                let mut lines: Vec<u64> = rows.iter().map(|row| row.line).collect();
                lines.sort_unstable();
                lines.dedup();
                assert_eq!(lines, LINES, "{strategy} {name}");
            });
        }
    }

    #[test]
    fn test_relocated_names_in_unlinked_objects() {
        // gcc leaves every string offset in an unlinked object's .debug_info
        // as zero plus a relocation; unrelocated reads repeat the first
        // string in .debug_str for every name.
        let linked = LightweightExtractor::new()
            .extract_all_debug_info(&common::compiled_fixture("fib"))
            .unwrap();
        for name in ["fib-dwarf5.o", "fib-dwarf4.o"] {
            let path = common::compiled_fixture(name);
            let lightweight = LightweightExtractor::new().extract_all_debug_info(&path).unwrap();
            assert_eq!(lightweight.functions, linked.functions, "{name}");
            assert_eq!(lightweight.compile_units, linked.compile_units, "{name}");

            let authoritative = AuthoritativeExtractor::new().extract_all_debug_info(&path).unwrap();
            assert_eq!(authoritative.functions, linked.functions, "{name}");
            assert_eq!(authoritative.source_files, lightweight.source_files, "{name}");
        }
    }

    #[test]
    fn test_broken_line_program_keeps_other_categories() {
        let (_dir, path) = written_fixture("broken-line.o", &common::broken_line_object());
        let expected = format!("{}/{}", common::COMP_DIR, common::SOURCE_NAME);
        for_each_extractor(|extractor| {
            let strategy = extractor.strategy();
            let info = extractor.extract_all_debug_info(&path).unwrap();
            assert_eq!(info.functions, ["fibonacci", "main"], "{strategy}");
            assert_eq!(info.compile_units, [common::SOURCE_NAME], "{strategy}");
            assert!(info.source_files.contains(&expected), "{strategy}");
            assert!(info.line_info.is_empty(), "{strategy}");
        });

        // On its own the line table still reports the failure
        let authoritative = AuthoritativeExtractor::new();
        assert!(authoritative.extract_line_info(&path).is_err());
        assert_eq!(
            authoritative.extract_functions(&path).unwrap(),
            ["fibonacci", "main"]
        );
    }

    #[test]
    fn test_macho_object() {
        let (_dir, path) = written_fixture("fib-macho.o", &common::macho_fibonacci_object());
        assert_eq!(detect_file_format(&path).unwrap(), BinaryFormat::MachO);
        let expected = format!("{}/{}", common::COMP_DIR, common::SOURCE_NAME);

        let authoritative = AuthoritativeExtractor::new();
        assert!(authoritative.has_dwarf_info(&path));
        assert_eq!(
            authoritative.extract_functions(&path).unwrap(),
            ["fibonacci", "main"]
        );
        assert_eq!(authoritative.extract_source_files(&path).unwrap(), [expected.clone()]);
        assert_eq!(
            authoritative.extract_compile_units(&path).unwrap(),
            [common::SOURCE_NAME]
        );
        drop(authoritative);

        // The section-table walk only understands ELF
        let lightweight = LightweightExtractor::new();
        assert!(!lightweight.has_dwarf_info(&path));
        assert!(matches!(
            lightweight.extract_functions(&path),
            Err(DebugInfoError::UnsupportedFormat(BinaryFormat::MachO))
        ));

        let info = DualStrategyExtractor::new().extract_all_debug_info(&path).unwrap();
        assert_eq!(info.strategy, "gimli");
        assert_eq!(info.functions, ["fibonacci", "main"]);
        assert_eq!(info.source_files, [expected]);
    }

    #[test]
    fn test_missing_file() {
        let missing = Path::new("/nonexistent/fib.o");
        for_each_extractor(|extractor| {
            assert!(!extractor.has_dwarf_info(missing));
            assert!(extractor.extract_functions(missing).is_err());
        });
    }
}

// ============================================================================
// Session
// ============================================================================

mod session_tests {
    use super::*;

    #[test]
    fn test_scan_fixture_to_cyclonedx() {
        let (dir, path) = fibonacci_fixture();
        let output = dir.path().join("out/app.cdx.json");

        let mut session = SbomSession::new(ScanConfig::default());
        session.set_format("cyclonedx-1.6").unwrap();
        session.set_output_path(&output);
        assert!(session.process_input_file(&path).unwrap());
        assert!(!session.process_input_file(&path).unwrap());

        let component = session.graph().get("fib.o").unwrap();
        assert_eq!(component.file_type(), FileType::Object);
        assert!(!component.is_stripped());
        assert!(component.contains_debug_info());
        assert!(component.functions().iter().any(|f| f == "fibonacci"));
        assert_eq!(component.checksum().map(str::len), Some(64));

        let written = session.finalize().unwrap();
        assert_eq!(written, output);

        let document = std::fs::read_to_string(&output).unwrap();
        let handler = FormatFactory::detect(&document).unwrap();
        assert_eq!(handler.format_version(), "1.6");
        assert!(handler.validate(&document).is_valid);
        let parsed = handler.parse_components(&document);
        assert!(parsed.iter().any(|c| c.name == "fib.o"));

        let stats = session.statistics();
        assert_eq!(stats.files_processed(), 1);
        assert_eq!(stats.skipped_files, 0);
        assert!(stats.symbols >= 2);
    }

    #[test]
    fn test_truncated_input_is_kept_with_error() {
        let (_dir, path) = truncated_fixture();
        let mut session = SbomSession::new(ScanConfig::default());
        assert!(session.process_input_file(&path).unwrap());

        let component = session.graph().get("truncated.o").unwrap();
        assert!(component.processing_error().is_some());
        assert!(!component.contains_debug_info());
    }

    #[test]
    fn test_parallel_scan_uses_lightweight_reader() {
        let (dir, path) = fibonacci_fixture();
        let other = common::write_fixture(
            dir.path(),
            "util.o",
            &common::elf_object(&["helper"], false),
        );

        let mut session = SbomSession::new(ScanConfig::default());
        let added = session.process_input_files(&[path, other, dir.path().join("missing.o")]);
        assert_eq!(added, 2);
        assert_eq!(session.statistics().skipped_files, 1);

        let fib = session.graph().get("fib.o").unwrap();
        assert_eq!(fib.detected_by(), Some("lightweight"));
        assert!(fib.functions().iter().any(|f| f == "main"));
    }
}

// ============================================================================
// Comparison
// ============================================================================

mod compare_tests {
    use super::*;

    #[test]
    fn test_version_bump_is_one_modification() {
        let old = vec![SbomComponent::new("libc", "libc", "2.31")];
        let new = vec![SbomComponent::new("libc", "libc", "2.32")];

        let diffs = diff(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DifferenceType::Modified);
        assert_eq!(diffs[0].component.id, "libc");
        assert_eq!(diffs[0].component.version, "2.32");
        assert_eq!(diffs[0].old_component.as_ref().unwrap().version, "2.31");
    }

    #[test]
    fn test_diff_through_every_format() {
        let old = vec![
            SbomComponent::new("libc", "libc", "2.31"),
            SbomComponent::new("zlib", "zlib", "1.3"),
        ];
        let new = vec![
            SbomComponent::new("libc", "libc", "2.32"),
            SbomComponent::new("libm", "libm", "2.32"),
        ];
        let metadata = sbom_binscan::DocumentMetadata::new("roundtrip");

        for (family, version) in FormatFactory::supported_formats() {
            let handler = FormatFactory::create_for(family, version).unwrap();
            let old_doc = handler.generate(&old, &metadata).unwrap();
            let new_doc = handler.generate(&new, &metadata).unwrap();

            let diffs = diff(
                &handler.parse_components(&old_doc),
                &handler.parse_components(&new_doc),
            );
            let kinds = |kind: DifferenceType| diffs.iter().filter(|d| d.kind == kind).count();
            assert_eq!(kinds(DifferenceType::Added), 1, "{family} {version}");
            assert_eq!(kinds(DifferenceType::Removed), 1, "{family} {version}");
            assert_eq!(kinds(DifferenceType::Modified), 1, "{family} {version}");
        }
    }
}
