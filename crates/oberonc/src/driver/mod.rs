//! Compilation driver and pipeline orchestration
//!
//! A [`Pipeline`] compiles modules one after another. The interface of
//! every module that compiles cleanly is kept, so later modules of the
//! same run can import it. Imports that are not known yet are looked up
//! as `<Module>.Mod` in the include directories and compiled first.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{Arena, Module};
use crate::common::{CompileError, CompileResult, Diagnostic};
use crate::frontend::lexer::{OberonLexer, TokenKind};
use crate::frontend::{analyze_source, CompilerConfig, FrontendOutput};
use crate::interface::{export, InterfaceLibrary, ModuleInterface};
use crate::lifter::lift;

/// Source file extensions tried when searching for an imported module
const EXTENSIONS: [&str; 3] = ["Mod", "mod", "ob07"];

/// A module that passed analysis
#[derive(Debug)]
pub struct CompiledModule {
    pub module: Module,
    pub arena: Arena,
    pub interface: ModuleInterface,
    /// Warnings and lower-severity messages of the run
    pub diagnostics: Vec<Diagnostic>,
}

/// Diagnostics of one compiled source, kept for rendering
#[derive(Debug, Clone)]
pub struct Report {
    pub file: String,
    pub source: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compilation pipeline that carries interfaces from module to module
pub struct Pipeline {
    config: CompilerConfig,
    library: InterfaceLibrary,
    include: Vec<PathBuf>,
    /// Modules whose compilation has started but not finished
    pending: HashSet<String>,
    reports: Vec<Report>,
}

impl Pipeline {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            library: InterfaceLibrary::new(),
            include: Vec::new(),
            pending: HashSet::new(),
            reports: Vec::new(),
        }
    }

    pub fn with_include_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include.extend(dirs);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn library(&self) -> &InterfaceLibrary {
        &self.library
    }

    /// Reports of every source compiled since the last call, dependencies first
    pub fn take_reports(&mut self) -> Vec<Report> {
        std::mem::take(&mut self.reports)
    }

    /// Compile a module read from disk
    pub fn compile_file(&mut self, path: &Path) -> CompileResult<CompiledModule> {
        let source = fs::read_to_string(path)?;
        self.compile_source(&path.display().to_string(), &source)
    }

    /// Analyze, export and lift one module
    pub fn compile_source(&mut self, name: &str, source: &str) -> CompileResult<CompiledModule> {
        let _span = tracing::info_span!("compile", file = name).entered();
        self.resolve_imports(source)?;

        let FrontendOutput { module, mut arena, logger } = analyze_source(source, &self.config, Some(&self.library));
        let errors = logger.error_count();
        let diagnostics = logger.into_diagnostics();
        self.reports.push(Report { file: name.to_string(), source: source.to_string(), diagnostics: diagnostics.clone() });

        let Some(mut module) = module else {
            return Err(CompileError::analysis(name, errors.max(1)));
        };
        if errors > 0 {
            return Err(CompileError::analysis(&module.name, errors));
        }

        let interface = export(&module, &arena);
        self.library.insert(interface.clone());
        if self.config.lift {
            lift(&mut module, &mut arena)?;
        }
        tracing::info!(module = %module.name, exports = interface.decls.len(), "module compiled");
        Ok(CompiledModule { module, arena, interface, diagnostics })
    }

    /// Compile imported modules that are neither known nor in progress but
    /// can be found in an include directory.
    fn resolve_imports(&mut self, source: &str) -> CompileResult<()> {
        for import in scan_imports(source) {
            if self.library.contains(&import) || self.pending.contains(&import) {
                continue;
            }
            let Some(path) = self.find_module(&import) else {
                continue;
            };
            tracing::info!(module = %import, path = %path.display(), "compiling imported module");
            self.pending.insert(import.clone());
            let result = self.compile_file(&path);
            self.pending.remove(&import);
            result?;
        }
        Ok(())
    }

    fn find_module(&self, name: &str) -> Option<PathBuf> {
        self.include
            .iter()
            .flat_map(|dir| EXTENSIONS.iter().map(move |ext| dir.join(format!("{}.{}", name, ext))))
            .find(|path| path.is_file())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

/// Module names listed in the import list of a source text. Scanning stops
/// at the first token that does not fit the module header.
pub fn scan_imports(source: &str) -> Vec<String> {
    let mut lexer = OberonLexer::new(source);
    let mut next = move || lexer.next_token().map(|token| token.kind).unwrap_or(TokenKind::Eof);

    let header = [next(), next(), next(), next()];
    let [TokenKind::Module, TokenKind::Ident(_), TokenKind::Semicolon, TokenKind::Import] = header else {
        return Vec::new();
    };
    let mut modules = Vec::new();
    loop {
        let TokenKind::Ident(first) = next() else {
            break;
        };
        match next() {
            TokenKind::Becomes => {
                let TokenKind::Ident(module) = next() else {
                    break;
                };
                modules.push(module);
                if next() != TokenKind::Comma {
                    break;
                }
            }
            TokenKind::Comma => modules.push(first),
            _ => {
                modules.push(first);
                break;
            }
        }
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Severity;
    use pretty_assertions::assert_eq;

    const COUNTER: &str = "MODULE Counter; VAR value*: INTEGER; \
        PROCEDURE Increment*(by: INTEGER); BEGIN value := value + by END Increment; \
        END Counter.";

    #[test]
    fn test_scan_imports() {
        assert_eq!(
            scan_imports("MODULE M; IMPORT A, B := Lists, C; VAR x: INTEGER; END M."),
            vec!["A", "Lists", "C"]
        );
        assert_eq!(scan_imports("MODULE M; END M."), Vec::<String>::new());
        assert_eq!(scan_imports("MODULE M; IMPORT A"), vec!["A"]);
    }

    #[test]
    fn test_later_modules_import_earlier_ones() {
        let mut pipeline = Pipeline::default();
        let counter = pipeline.compile_source("Counter.Mod", COUNTER).unwrap();
        assert_eq!(counter.interface.decls.len(), 2);

        let main = pipeline
            .compile_source("Main.Mod", "MODULE Main; IMPORT Counter; BEGIN Counter.Increment(2) END Main.")
            .unwrap();
        assert_eq!(main.module.imports.len(), 1);
        assert_eq!(pipeline.library().len(), 2);
        assert_eq!(pipeline.take_reports().len(), 2);
    }

    #[test]
    fn test_errors_stop_the_module() {
        let mut pipeline = Pipeline::default();
        let error = pipeline
            .compile_source("Broken.Mod", "MODULE Broken; VAR x: INTEGER; BEGIN x := TRUE; y := 1 END Broken.")
            .unwrap_err();
        assert_eq!(error.to_string(), "compilation of module Broken failed with 2 error(s)");
        assert!(!pipeline.library().contains("Broken"));

        let reports = pipeline.take_reports();
        assert_eq!(reports.len(), 1);
        let errors = reports[0].diagnostics.iter().filter(|d| d.severity == Severity::Error).count();
        assert_eq!(errors, 2);
    }

    #[test]
    fn test_lift_can_be_disabled() {
        let source = "MODULE M; PROCEDURE P(x: INTEGER); PROCEDURE Q; BEGIN x := 1 END Q; BEGIN Q END P; END M.";
        let mut pipeline = Pipeline::default();
        assert_eq!(pipeline.compile_source("M.Mod", source).unwrap().module.block.procedures.len(), 2);

        let mut pipeline = Pipeline::new(CompilerConfig { lift: false, ..CompilerConfig::default() });
        assert_eq!(pipeline.compile_source("M.Mod", source).unwrap().module.block.procedures.len(), 1);
    }

    #[test]
    fn test_imports_found_in_include_dirs() {
        let dir = std::env::temp_dir().join(format!("oberonc-driver-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Counter.Mod"), COUNTER).unwrap();

        let mut pipeline = Pipeline::default().with_include_dirs([dir.clone()]);
        let result = pipeline.compile_source("Main.Mod", "MODULE Main; IMPORT C := Counter; BEGIN C.Increment(1) END Main.");
        fs::remove_dir_all(&dir).unwrap();

        assert!(result.is_ok());
        let files: Vec<String> = pipeline.take_reports().into_iter().map(|report| report.file).collect();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("Counter.Mod"));
        assert_eq!(files[1], "Main.Mod");
    }

    #[test]
    fn test_missing_file() {
        let mut pipeline = Pipeline::default();
        let error = pipeline.compile_file(Path::new("/nonexistent/Missing.Mod")).unwrap_err();
        assert!(matches!(error, CompileError::Io(_)));
    }
}
