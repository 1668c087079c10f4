//! Language registry: the read-only per-language configuration table.
//!
//! Built once at engine construction. Entries describe how to materialize,
//! compile, and run a submission; they carry no request-scoped state.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Fixed class name Java submissions are wrapped in. The source file name
/// and the `java` invocation both derive from it.
pub const JAVA_MAIN_CLASS: &str = "Solution";

/// How one language is compiled and executed.
///
/// Command templates may use these placeholders:
/// - `{file}` — absolute path of the materialized source file
/// - `{exe}`  — absolute path of the compiled binary
/// - `{dir}`  — the per-run working directory
/// - `{class}` — the fixed main class name (Java)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub name: String,
    /// File name the source is written to inside the run directory.
    pub file_name: String,
    /// Compile command template; `None` for interpreted languages.
    #[serde(default)]
    pub compile_cmd: Option<Vec<String>>,
    pub run_cmd: Vec<String>,
    /// Template the submission is embedded into before writing, with
    /// `{code}` marking the insertion point (Java class wrapping).
    #[serde(default)]
    pub scaffold: Option<String>,
}

impl LanguageSpec {
    /// Program names that must resolve on PATH before anything is spawned.
    /// Placeholder-only entries (e.g. a run command of `{exe}`) point at
    /// artifacts we produce ourselves and are skipped.
    pub fn required_binaries(&self) -> Vec<&str> {
        let mut bins = Vec::new();
        if let Some(cmd) = &self.compile_cmd {
            if let Some(first) = cmd.first() {
                if !first.contains('{') {
                    bins.push(first.as_str());
                }
            }
        }
        if let Some(first) = self.run_cmd.first() {
            if !first.contains('{') {
                bins.push(first.as_str());
            }
        }
        bins
    }

    pub fn source_code(&self, code: &str) -> String {
        match &self.scaffold {
            Some(template) => template.replace("{code}", code),
            None => code.to_string(),
        }
    }
}

/// Expand command-template placeholders against a concrete run directory.
pub fn render_command(template: &[String], dir: &Path, file_name: &str) -> Vec<String> {
    let file = dir.join(file_name).to_string_lossy().into_owned();
    let exe = dir.join("prog").to_string_lossy().into_owned();
    let dir = dir.to_string_lossy().into_owned();
    template
        .iter()
        .map(|part| {
            part.replace("{file}", &file)
                .replace("{exe}", &exe)
                .replace("{dir}", &dir)
                .replace("{class}", JAVA_MAIN_CLASS)
        })
        .collect()
}

/// Immutable map of language name → spec.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    specs: HashMap<String, LanguageSpec>,
}

impl LanguageRegistry {
    /// Registry with the built-in languages: python and javascript are
    /// interpreted; c, cpp, and java compile first.
    pub fn builtin() -> Self {
        let mut registry = LanguageRegistry {
            specs: HashMap::new(),
        };

        registry.insert(LanguageSpec {
            name: "python".into(),
            file_name: "main.py".into(),
            compile_cmd: None,
            run_cmd: vec!["python3".into(), "{file}".into()],
            scaffold: None,
        });
        registry.insert(LanguageSpec {
            name: "javascript".into(),
            file_name: "main.js".into(),
            compile_cmd: None,
            run_cmd: vec!["node".into(), "{file}".into()],
            scaffold: None,
        });
        registry.insert(LanguageSpec {
            name: "c".into(),
            file_name: "main.c".into(),
            compile_cmd: Some(vec![
                "gcc".into(),
                "-O2".into(),
                "-std=c17".into(),
                "-o".into(),
                "{exe}".into(),
                "{file}".into(),
            ]),
            run_cmd: vec!["{exe}".into()],
            scaffold: None,
        });
        registry.insert(LanguageSpec {
            name: "cpp".into(),
            file_name: "main.cpp".into(),
            compile_cmd: Some(vec![
                "g++".into(),
                "-O2".into(),
                "-std=c++17".into(),
                "-o".into(),
                "{exe}".into(),
                "{file}".into(),
            ]),
            run_cmd: vec!["{exe}".into()],
            scaffold: None,
        });
        registry.insert(LanguageSpec {
            name: "java".into(),
            file_name: format!("{JAVA_MAIN_CLASS}.java"),
            compile_cmd: Some(vec!["javac".into(), "{file}".into()]),
            run_cmd: vec![
                "java".into(),
                "-cp".into(),
                "{dir}".into(),
                "{class}".into(),
            ],
            scaffold: Some(format!(
                "public class {JAVA_MAIN_CLASS} {{\n{{code}}\n}}"
            )),
        });

        registry
    }

    fn insert(&mut self, spec: LanguageSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Extend the registry with a custom language entry.
    pub fn with_language(mut self, spec: LanguageSpec) -> Self {
        self.insert(spec);
        self
    }

    pub fn get(&self, language: &str) -> Result<&LanguageSpec, EngineError> {
        self.specs
            .get(&language.to_lowercase())
            .ok_or_else(|| EngineError::UnsupportedLanguage(language.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.specs.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}
