//! Path-pattern heuristics for package-manager attribution.
//!
//! These rules are best-effort guesses from install-tree shapes, not
//! authoritative provenance. They run in order and the first match wins.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Package manager and supplier guessed for an artifact path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub manager: &'static str,
    pub supplier: &'static str,
    pub download_location: Option<String>,
}

impl Provenance {
    const fn new(manager: &'static str, supplier: &'static str) -> Self {
        Self {
            manager,
            supplier,
            download_location: None,
        }
    }

    /// `{unknown, ""}`: no rule matched.
    #[must_use]
    pub const fn unknown() -> Self {
        Self::new("unknown", "")
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.manager == "unknown"
    }
}

struct Rule {
    manager: &'static str,
    supplier: &'static str,
    patterns: &'static [&'static str],
}

/// OS package databases first, then cross-platform install trees. Paths under
/// the generic system prefixes that match none of these are `system`.
const RULES: &[Rule] = &[
    Rule {
        manager: "rpm",
        supplier: "system-package-manager",
        patterns: &["/usr/lib/rpm", "/var/lib/rpm"],
    },
    Rule {
        manager: "deb",
        supplier: "system-package-manager",
        patterns: &[
            "/usr/lib/x86_64-linux-gnu",
            "/usr/lib/aarch64-linux-gnu",
            "/usr/lib/arm-linux-gnueabihf",
            "/var/lib/dpkg",
        ],
    },
    Rule {
        manager: "pacman",
        supplier: "system-package-manager",
        patterns: &["/usr/lib/pacman", "/var/lib/pacman"],
    },
    Rule {
        manager: "conan",
        supplier: "conan-center",
        patterns: &["/.conan/", "conan"],
    },
    Rule {
        manager: "vcpkg",
        supplier: "vcpkg",
        patterns: &["vcpkg"],
    },
    Rule {
        manager: "spack",
        supplier: "spack",
        patterns: &["spack"],
    },
    Rule {
        manager: "homebrew",
        supplier: "homebrew",
        patterns: &["/Cellar/", "/opt/homebrew/"],
    },
];

/// Attribute `path` to a package manager by the first matching rule.
#[must_use]
pub fn classify_package_manager(path: &Path) -> Provenance {
    let text = path.to_string_lossy();
    let Some(rule) = RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| text.contains(p)))
    else {
        if is_system_library(path) {
            return Provenance::new("system", "system-package-manager");
        }
        return Provenance::unknown();
    };

    let mut provenance = Provenance::new(rule.manager, rule.supplier);
    provenance.download_location = match rule.manager {
        "conan" => package_after(path, &["data", "conan"])
            .map(|name| format!("https://conan.io/center/{name}")),
        "vcpkg" => Some("https://github.com/microsoft/vcpkg".to_string()),
        "homebrew" => package_after(path, &["Cellar"])
            .map(|name| format!("https://formulae.brew.sh/formula/{name}")),
        _ => None,
    };
    provenance
}

/// Path segment right after the first segment named one of `markers`, e.g.
/// `openssl` in `.../Cellar/openssl/3.1.0/`.
fn package_after(path: &Path, markers: &[&str]) -> Option<String> {
    let segments: Vec<_> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let at = segments.iter().position(|s| markers.contains(&s.as_str()))?;
    segments.get(at + 1).cloned()
}

/// Libraries living under the OS library prefixes.
#[must_use]
pub fn is_system_library(path: &Path) -> bool {
    const PREFIXES: &[&str] = &[
        "/usr/lib/",
        "/usr/lib64/",
        "/lib/",
        "/lib64/",
        "/usr/local/lib/",
        "/System/Library/",
        "/usr/lib/system/",
    ];
    let text = path.to_string_lossy();
    PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

static VERSION_IN_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("static regex"));

/// First `major.minor.patch` found anywhere in the path, e.g. `1.1.1` in
/// `libssl.so.1.1.1` or `3.1.0` in `Cellar/openssl/3.1.0/lib/libssl.dylib`.
#[must_use]
pub fn extract_version_from_path(path: &Path) -> Option<String> {
    let text = path.to_string_lossy();
    VERSION_IN_PATH.find(&text).map(|m| m.as_str().to_string())
}
