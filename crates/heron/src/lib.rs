//! heron lowers a statically-typed, garbage-collected, imperative source
//! language to a pure, monadic vernacular representation over an algebraic
//! effect signature, suitable for mechanized reasoning.
//!
//! This crate is the facade: it re-exports the translator surface and wires
//! the external frontend (parser + typechecker) to the translation pipeline
//! behind the [`Frontend`] seam. Parsing and typechecking the source
//! language are collaborator concerns; heron consumes the resolved tree.

use std::path::Path;

use heron_ast::Package;

pub use heron_diag::{Diagnostic, Kind, TranslationError};
pub use heron_translate::{Config, translate_package};
pub use heron_vernac::File;

/// The external parser/typechecker contract.
///
/// Implementations load a source directory into a fully resolved, typed
/// [`Package`]; the error string is whatever the underlying toolchain
/// reports.
pub trait Frontend {
    fn load_package(&self, dir: &Path) -> Result<Package, String>;
}

/// A failure of the directory-level driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load package: {0}")]
    Frontend(String),
    #[error("{report}")]
    Translation {
        /// The full diagnostic listing with file names resolved.
        report: String,
        source: TranslationError,
    },
}

impl Error {
    /// The structured diagnostics of a translation failure, if that is what
    /// this error is.
    pub fn diagnostics(&self) -> Option<&[Diagnostic]> {
        match self {
            Error::Frontend(_) => None,
            Error::Translation { source, .. } => Some(source.diagnostics()),
        }
    }
}

fn render_report(err: &TranslationError, files: &[String]) -> String {
    err.diagnostics()
        .iter()
        .map(|diag| diag.display_with_files(files))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Load a package from `dir` through `frontend` and translate it.
///
/// On failure the error's `Display` is the complete report: every diagnostic
/// in source-position order, with file names resolved against the package's
/// file table.
pub fn translate_dir(
    frontend: &impl Frontend,
    dir: &Path,
    config: &Config,
) -> Result<File, Error> {
    let pkg = frontend
        .load_package(dir)
        .map_err(Error::Frontend)?;
    translate_package(&pkg, config).map_err(|err| Error::Translation {
        report: render_report(&err, &pkg.files),
        source: err,
    })
}

/// Print a driver failure to stderr, one diagnostic per line.
pub fn emit_error(err: &Error) {
    eprintln!("{err}");
}
