use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tree_sitter::Language;

/// Languages whose definitions can be pulled out with a grammar query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LangId {
    Rust,
    C,
    Cpp,
    Python,
    Javascript,
    Typescript,
    Tsx,
    Go,
    Php,
    Java,
    Swift,
    #[serde(rename = "csharp")]
    CSharp,
    Bash,
}

/// Lower-cased extension → language. Headers count as C.
const EXTENSIONS: &[(&str, LangId)] = &[
    ("rs", LangId::Rust),
    ("c", LangId::C),
    ("h", LangId::C),
    ("cc", LangId::Cpp),
    ("cpp", LangId::Cpp),
    ("cxx", LangId::Cpp),
    ("hh", LangId::Cpp),
    ("hpp", LangId::Cpp),
    ("hxx", LangId::Cpp),
    ("py", LangId::Python),
    ("pyi", LangId::Python),
    ("js", LangId::Javascript),
    ("jsx", LangId::Javascript),
    ("mjs", LangId::Javascript),
    ("cjs", LangId::Javascript),
    ("ts", LangId::Typescript),
    ("mts", LangId::Typescript),
    ("cts", LangId::Typescript),
    ("tsx", LangId::Tsx),
    ("go", LangId::Go),
    ("php", LangId::Php),
    ("java", LangId::Java),
    ("swift", LangId::Swift),
    ("cs", LangId::CSharp),
    ("sh", LangId::Bash),
    ("bash", LangId::Bash),
];

/// Interpreter names recognised in a `#!` line, checked in order.
const INTERPRETERS: &[(&str, LangId)] = &[
    ("python", LangId::Python),
    ("node", LangId::Javascript),
    ("php", LangId::Php),
    ("bash", LangId::Bash),
    ("/sh", LangId::Bash),
];

impl LangId {
    pub const ALL: [LangId; 13] = [
        LangId::Rust,
        LangId::C,
        LangId::Cpp,
        LangId::Python,
        LangId::Javascript,
        LangId::Typescript,
        LangId::Tsx,
        LangId::Go,
        LangId::Php,
        LangId::Java,
        LangId::Swift,
        LangId::CSharp,
        LangId::Bash,
    ];

    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        let ext = path.extension()?.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|&(_, lang)| lang)
    }

    pub fn from_shebang(first_line: &str) -> Option<Self> {
        let interpreter = first_line.strip_prefix("#!")?.to_ascii_lowercase();
        INTERPRETERS
            .iter()
            .find(|(name, _)| interpreter.contains(name))
            .map(|&(_, lang)| lang)
    }

    /// Extension first, then the `#!` line of `source`.
    pub fn detect(path: &Utf8Path, source: &str) -> Option<Self> {
        Self::from_path(path).or_else(|| Self::from_shebang(source.lines().next()?))
    }

    pub fn ts_language(self) -> Language {
        let raw = match self {
            Self::Rust => tree_sitter_rust::LANGUAGE,
            Self::C => tree_sitter_c::LANGUAGE,
            Self::Cpp => tree_sitter_cpp::LANGUAGE,
            Self::Python => tree_sitter_python::LANGUAGE,
            Self::Javascript => tree_sitter_javascript::LANGUAGE,
            Self::Typescript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX,
            Self::Go => tree_sitter_go::LANGUAGE,
            Self::Php => tree_sitter_php::LANGUAGE_PHP,
            Self::Java => tree_sitter_java::LANGUAGE,
            Self::Swift => tree_sitter_swift::LANGUAGE,
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE,
            Self::Bash => tree_sitter_bash::LANGUAGE,
        };
        Language::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_extension() {
        let cases = [
            ("src/main.rs", LangId::Rust),
            ("drivers/gpu/kgsl.c", LangId::C),
            ("include/linux/kgsl.h", LangId::C),
            ("lib/core.HPP", LangId::Cpp),
            ("tools/gen.py", LangId::Python),
            ("web/app.ts", LangId::Typescript),
            ("web/view.tsx", LangId::Tsx),
            ("Main.java", LangId::Java),
            ("Program.cs", LangId::CSharp),
            ("deploy.sh", LangId::Bash),
        ];
        for (path, expected) in cases {
            assert_eq!(LangId::from_path(Utf8Path::new(path)), Some(expected), "{path}");
        }
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(LangId::from_path(Utf8Path::new("Kconfig")), None);
        assert_eq!(LangId::from_path(Utf8Path::new("file.xyz")), None);
    }

    #[test]
    fn shebang_fallback() {
        assert_eq!(
            LangId::detect(Utf8Path::new("scripts/build"), "#!/usr/bin/env python3\nprint()"),
            Some(LangId::Python)
        );
        assert_eq!(LangId::from_shebang("#!/bin/sh"), Some(LangId::Bash));
        assert_eq!(LangId::from_shebang("no shebang"), None);
        assert_eq!(LangId::detect(Utf8Path::new("Makefile"), ""), None);
    }

    #[test]
    fn every_language_has_a_grammar() {
        for lang in LangId::ALL {
            assert!(lang.ts_language().abi_version() > 0, "{lang:?}");
        }
    }
}
