//! A line-level re-parser for rendered vernacular output.
//!
//! Recovers the declaration skeleton (kind and name, in order) from rendered
//! text, ignoring comments. Used to check that rendering a [`File`] round
//! trips: one output declaration per input declaration, same order, same
//! names. This is deliberately not a full target-language parser; the
//! skeleton is the structural identity the output format guarantees.

use crate::{Decl, File};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkeletonKind {
    Func,
    Struct,
    TypeDef,
    Const,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclSkeleton {
    pub kind: SkeletonKind,
    pub name: String,
}

impl DeclSkeleton {
    fn new(kind: SkeletonKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }
}

/// The skeleton a [`File`] should render to, read off the tree itself.
/// Comment declarations are skipped, mirroring [`parse`].
pub fn of_file(file: &File) -> Vec<DeclSkeleton> {
    file.decls
        .iter()
        .filter_map(|decl| match decl {
            Decl::Func(d) => Some(DeclSkeleton::new(SkeletonKind::Func, &d.name)),
            Decl::Struct(d) => Some(DeclSkeleton::new(SkeletonKind::Struct, &d.name)),
            Decl::TypeDef(d) => Some(DeclSkeleton::new(SkeletonKind::TypeDef, &d.name)),
            Decl::Const(d) => Some(DeclSkeleton::new(SkeletonKind::Const, &d.name)),
            Decl::Comment(_) => None,
        })
        .collect()
}

/// Parse rendered output back into its declaration skeleton.
///
/// Declarations start in column zero; bodies, module interiors, and comment
/// continuations are indented, so a single pass over column-zero lines
/// suffices. Typing theorems and prelude imports are not declarations of the
/// source package and are skipped.
pub fn parse(rendered: &str) -> Vec<DeclSkeleton> {
    let mut decls = Vec::new();
    let mut open_module: Option<String> = None;

    for line in rendered.lines() {
        if line.is_empty() || line.starts_with(' ') {
            continue;
        }
        if let Some(name) = &open_module {
            if line == format!("End {name}.") {
                open_module = None;
            }
            continue;
        }
        if line.starts_with("(*") || line.starts_with("From ") {
            continue;
        }
        if line.starts_with("Theorem ") || line.starts_with("Proof.") || line.starts_with("Hint ")
        {
            continue;
        }
        if let Some(rest) = line.strip_prefix("Module ") {
            let name = rest.strip_suffix('.').unwrap_or(rest);
            decls.push(DeclSkeleton::new(SkeletonKind::Struct, name));
            open_module = Some(name.to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("Definition ") {
            let Some(colon) = rest.find(':') else {
                continue;
            };
            let name = rest[..colon].trim_end();
            let sort = rest[colon + 1..].trim_start();
            let kind = if sort.starts_with("val") {
                SkeletonKind::Func
            } else if sort.starts_with("ty") {
                SkeletonKind::TypeDef
            } else if sort.starts_with("expr") {
                SkeletonKind::Const
            } else {
                continue;
            };
            decls.push(DeclSkeleton::new(kind, name));
        }
    }
    decls
}
