//! Symbol and section records extracted from a binary.

use serde::{Deserialize, Serialize};

/// Linkage binding of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolBinding {
    Local,
    #[default]
    Global,
    Weak,
}

/// A single entry from a symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub binding: SymbolBinding,
    /// `false` for imports and other undefined references
    pub defined: bool,
    /// Name of the section the symbol lives in, when defined
    pub section: Option<String>,
}

/// Prefixes used by toolchains and runtimes for their own symbols.
const SYSTEM_SYMBOL_PREFIXES: &[&str] = &["__", "_GLOBAL_", "."];

impl Symbol {
    /// Create a defined, global symbol.
    #[must_use]
    pub fn new(name: impl Into<String>, address: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            address,
            size,
            binding: SymbolBinding::Global,
            defined: true,
            section: None,
        }
    }

    #[must_use]
    pub fn with_binding(mut self, binding: SymbolBinding) -> Self {
        self.binding = binding;
        self
    }

    #[must_use]
    pub fn undefined(mut self) -> Self {
        self.defined = false;
        self
    }

    #[must_use]
    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    #[must_use]
    pub fn is_weak(&self) -> bool {
        self.binding == SymbolBinding::Weak
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.binding == SymbolBinding::Global
    }

    /// Whether the symbol belongs to the toolchain or C runtime rather than
    /// to user code (`__libc_start_main`, `_GLOBAL_OFFSET_TABLE_`, ...).
    #[must_use]
    pub fn is_system(&self) -> bool {
        SYSTEM_SYMBOL_PREFIXES
            .iter()
            .any(|prefix| self.name.starts_with(prefix))
    }

    /// ELF symbol version suffix, e.g. `GLIBC_2.2.5` for `memcpy@@GLIBC_2.2.5`.
    #[must_use]
    pub fn version_suffix(&self) -> Option<&str> {
        let (_, version) = self.name.split_once('@')?;
        let version = version.trim_start_matches('@');
        (!version.is_empty()).then_some(version)
    }
}

/// Attribute flags of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SectionFlags {
    pub executable: bool,
    pub writable: bool,
    pub debug: bool,
}

/// A section header entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub flags: SectionFlags,
}

impl Section {
    #[must_use]
    pub fn new(name: impl Into<String>, address: u64, size: u64, flags: SectionFlags) -> Self {
        Self {
            name: name.into(),
            address,
            size,
            flags,
        }
    }

    /// `.debug_*` (ELF/PE) or `__debug_*` (Mach-O) sections.
    #[must_use]
    pub fn is_debug_name(name: &str) -> bool {
        name.starts_with(".debug_") || name.starts_with("__debug_") || name.starts_with(".zdebug_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_version_suffix() {
        let sym = Symbol::new("memcpy@@GLIBC_2.14", 0, 0);
        assert_eq!(sym.version_suffix(), Some("GLIBC_2.14"));

        let sym = Symbol::new("printf@GLIBC_2.2.5", 0, 0).undefined();
        assert_eq!(sym.version_suffix(), Some("GLIBC_2.2.5"));
        assert!(!sym.defined);

        assert_eq!(Symbol::new("main", 0, 0).version_suffix(), None);
        assert_eq!(Symbol::new("odd@", 0, 0).version_suffix(), None);
    }

    #[test]
    fn test_system_symbols() {
        assert!(Symbol::new("__libc_start_main", 0, 0).is_system());
        assert!(Symbol::new("_GLOBAL_OFFSET_TABLE_", 0, 0).is_system());
        assert!(!Symbol::new("fibonacci", 0x1130, 42).is_system());
    }

    #[test]
    fn test_binding_predicates() {
        let weak = Symbol::new("__gmon_start__", 0, 0).with_binding(SymbolBinding::Weak);
        assert!(weak.is_weak());
        assert!(!weak.is_global());
    }

    #[test]
    fn test_debug_section_names() {
        assert!(Section::is_debug_name(".debug_info"));
        assert!(Section::is_debug_name("__debug_line"));
        assert!(!Section::is_debug_name(".text"));
    }
}
