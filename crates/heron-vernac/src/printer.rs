//! The indenting buffer behind all vernacular rendering.
//!
//! Rendering works by appending (possibly multi-line) strings to a [`Buffer`]
//! at the current indent level. Continuation lines of a multi-line insertion
//! are re-indented to the column of insertion, so nested renders compose
//! without the caller tracking columns. Output is spaces-only and every line
//! is right-trimmed on build.

use std::fmt;

#[derive(Debug, Default)]
pub struct Buffer {
    lines: Vec<String>,
    indent_level: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn indentation(&self) -> String {
        " ".repeat(self.indent_level)
    }

    /// Append a line (or a multi-line string) at the current indent level.
    pub fn add_line(&mut self, line: &str) {
        if line.is_empty() {
            self.lines.push(String::new());
        } else {
            let mut s = self.indentation();
            s.push_str(&reindent(self.indent_level, line));
            self.lines.push(s);
        }
    }

    pub fn add(&mut self, args: fmt::Arguments<'_>) {
        self.add_line(&args.to_string());
    }

    pub fn indent(&mut self, delta: isize) {
        let level = self.indent_level as isize + delta;
        debug_assert!(level >= 0, "indent level went negative");
        self.indent_level = level.max(0) as usize;
    }

    /// Emit `prefix + body`, indenting continuation lines of `body` by the
    /// prefix width, and leave the buffer indented by that width.
    pub fn block(&mut self, prefix: &str, body: &str) {
        let mut line = prefix.to_string();
        line.push_str(&reindent(prefix.len(), body));
        self.add_line(&line);
        self.indent(prefix.len() as isize);
    }

    /// Emit a `(* … *)` comment block; empty comments emit nothing.
    pub fn add_comment(&mut self, comment: &str) {
        if comment.is_empty() {
            return;
        }
        self.block("(* ", &format!("{comment} *)"));
        self.indent(-("(* ".len() as isize));
    }

    /// Join the accumulated lines, right-trimming each physical line.
    pub fn build(self) -> String {
        let joined = self.lines.join("\n");
        let mut out = joined
            .split('\n')
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
        // split/join never invents a trailing newline; strip one anyway if
        // the last appended line was itself empty.
        while out.ends_with('\n') {
            out.pop();
        }
        out
    }
}

/// Re-indent the continuation lines of a multi-line string by `spaces`.
/// The first line and empty lines are left alone.
pub fn reindent(spaces: usize, s: &str) -> String {
    let indentation = " ".repeat(spaces);
    s.split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("{indentation}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_well_balanced(s: &str, left: &str, right: &str) -> bool {
    s.starts_with(left) && s.ends_with(right)
}

/// Conservative parenthesization: wrap unless the string has no spaces or is
/// already delimited by `(...)` or `{|...|}`.
pub fn add_parens(s: &str) -> String {
    if !s.contains(' ') || is_well_balanced(s, "(", ")") || is_well_balanced(s, "{|", "|}") {
        s.to_string()
    } else {
        format!("({s})")
    }
}

/// Quote a program-level name. The wildcard `_` renders as `<>`.
pub fn quote(s: &str) -> String {
    if s == "_" {
        "<>".to_string()
    } else {
        format!("\"{s}\"")
    }
}

/// Render a binder position; identical to [`quote`], kept separate because
/// binders and quoted values are distinct syntactic positions.
pub fn binder(s: &str) -> String {
    quote(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_line_applies_indent() {
        let mut pp = Buffer::new();
        pp.add_line("a");
        pp.indent(2);
        pp.add_line("b");
        pp.indent(-2);
        pp.add_line("c");
        assert_eq!(pp.build(), "a\n  b\nc");
    }

    #[test]
    fn multiline_insert_reindents_continuations() {
        let mut pp = Buffer::new();
        pp.indent(2);
        pp.add_line("x\ny");
        assert_eq!(pp.build(), "  x\n  y");
    }

    #[test]
    fn block_indents_by_prefix_width() {
        let mut pp = Buffer::new();
        pp.block("pre: ", "first\nsecond");
        pp.add_line("third");
        assert_eq!(pp.build(), "pre: first\n     second\n     third");
    }

    #[test]
    fn comment_block_wraps_and_restores_indent() {
        let mut pp = Buffer::new();
        pp.add_comment("one\ntwo");
        pp.add_line("after");
        assert_eq!(pp.build(), "(* one\n   two *)\nafter");
    }

    #[test]
    fn empty_comment_emits_nothing() {
        let mut pp = Buffer::new();
        pp.add_comment("");
        pp.add_line("x");
        assert_eq!(pp.build(), "x");
    }

    #[test]
    fn build_trims_trailing_whitespace() {
        let mut pp = Buffer::new();
        pp.add_line("a   ");
        pp.add_line("");
        pp.add_line("b");
        assert_eq!(pp.build(), "a\n\nb");
    }

    #[test]
    fn parens_are_conservative() {
        assert_eq!(add_parens("x"), "x");
        assert_eq!(add_parens("(f x)"), "(f x)");
        assert_eq!(add_parens("{|f := x|}"), "{|f := x|}");
        assert_eq!(add_parens("f x"), "(f x)");
    }

    #[test]
    fn wildcard_quotes_as_diamond() {
        assert_eq!(quote("_"), "<>");
        assert_eq!(binder("_"), "<>");
        assert_eq!(quote("x"), "\"x\"");
    }
}
