//! Two-pass usage renderer for [`ArgTree`].
//!
//! Pass one walks the whole tree through a width-counting sink to find
//! the widest rendered option or subcommand line; pass two repeats the
//! identical walk against the real sink, padding every trailing
//! description to the measured column. The synopsis line reflects the
//! most recent parse: the chain of matched command names and the flags
//! of the matched path in declaration order.

use crate::args::{ArgTree, ContextKey, OptionEntry, ValueKind};
use crate::path;
use std::fmt;
use std::path::Path;

// Width-counting sink for the measurement pass. Tracks the widest line
// seen, in chars; the box-drawing prefixes are multi-byte, so byte
// lengths would misalign.
#[derive(Default)]
struct Measure {
    line: usize,
    max: usize,
}

impl Measure {
    fn max(&self) -> usize {
        self.max.max(self.line)
    }
}

impl fmt::Write for Measure {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if ch == '\n' {
                self.max = self.max.max(self.line);
                self.line = 0;
            } else {
                self.line += 1;
            }
        }
        Ok(())
    }
}

fn default_value_name(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Bool => "",
        ValueKind::Str => "string",
        ValueKind::Path => "path",
        ValueKind::Double => "double",
        ValueKind::Long => "int",
        ValueKind::Unsigned => "uint",
    }
}

// "[-i <file>]" / "-i <file>" / "[--verbose]" rendering of one entry.
fn entry_left_text(entry: &OptionEntry) -> String {
    let mut text = String::new();
    if !entry.required {
        text.push('[');
    }
    match (entry.short, &entry.long) {
        (Some(c), _) => {
            text.push('-');
            text.push(c);
        }
        (None, Some(l)) => {
            text.push_str("--");
            text.push_str(l);
        }
        (None, None) => {}
    }
    if entry.kind != ValueKind::Bool {
        let name = entry
            .value_name
            .as_deref()
            .unwrap_or(default_value_name(entry.kind));
        text.push_str(" <");
        text.push_str(name);
        text.push('>');
    }
    if !entry.required {
        text.push(']');
    }
    text
}

impl ArgTree {
    /// Render the full usage text: synopsis plus the box-drawing tree of
    /// every subcommand and flag with aligned descriptions.
    pub fn write_usage(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        out.write_str("SYNOPSIS\n")?;
        self.write_synopsis(out)?;
        out.write_str("\n")?;

        // Pass one: measurement, no output.
        let mut measure = Measure::default();
        self.write_tree(&mut measure, self.root, 1, &mut Vec::new(), 0)?;
        let align = (measure.max() + 2).max("ARGUMENT".len() + 2);

        writeln!(out, "{:<align$}DESCRIPTION", "ARGUMENT")?;
        let program = &self.contexts[self.root].name;
        writeln!(
            out,
            "{}",
            path::file_name(Path::new(program)).unwrap_or(program)
        )?;
        // Pass two: render with descriptions padded to the column.
        self.write_tree(out, self.root, 1, &mut Vec::new(), align)
    }

    /// Convenience form of [`ArgTree::write_usage`].
    pub fn usage_string(&self) -> String {
        let mut text = String::new();
        self.write_usage(&mut text)
            .expect("fmt::Write to String is infallible");
        text
    }

    fn write_synopsis(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let target = self.matched.unwrap_or(self.root);
        write!(out, "{} ", self.contexts[self.root].name)?;

        // Chain of matched command names, root-first.
        let mut chain = Vec::new();
        let mut cursor = target;
        while let Some(parent) = self.contexts[cursor].parent {
            chain.push(cursor);
            cursor = parent;
        }
        chain.reverse();
        for &ctx in &chain {
            write!(out, "{} ", self.contexts[ctx].name)?;
        }
        if !self.contexts[target].children.is_empty() {
            let placeholder = if target == self.root {
                "command"
            } else {
                "subcommand(s)"
            };
            write!(out, "<{placeholder}> ")?;
        }
        for &opt in &self.contexts[self.root].entries {
            write!(out, "{} ", entry_left_text(&self.options[opt]))?;
        }
        for &ctx in &chain {
            for &opt in &self.contexts[ctx].entries {
                write!(out, "{} ", entry_left_text(&self.options[opt]))?;
            }
        }
        out.write_str("\n")
    }

    // One walk serves both passes: with `align == 0` descriptions are
    // suppressed and only left-column widths reach the sink.
    fn write_tree(
        &self,
        out: &mut dyn fmt::Write,
        ctx: ContextKey,
        depth: usize,
        last: &mut Vec<bool>,
        align: usize,
    ) -> fmt::Result {
        if last.len() <= depth {
            last.resize(depth + 1, false);
        }
        let context = &self.contexts[ctx];
        let has_commands = !context.children.is_empty();

        for &opt in &context.entries {
            let mut width = 0;
            for j in 1..depth {
                out.write_str(if last[j] { "  " } else { "│ " })?;
                width += 2;
            }
            out.write_str(if has_commands { "│ " } else { "  " })?;
            width += 2;
            let entry = &self.options[opt];
            let left = entry_left_text(entry);
            out.write_str(&left)?;
            width += left.chars().count();
            if align > 0 {
                if let Some(desc) = &entry.description {
                    write!(out, "{:pad$}{desc}", "", pad = align.saturating_sub(width))?;
                    if entry.required {
                        out.write_str(" (required)")?;
                    }
                } else if entry.required {
                    write!(out, "{:pad$}(required)", "", pad = align.saturating_sub(width))?;
                }
            }
            out.write_str("\n")?;
        }

        for (i, &child) in context.children.iter().enumerate() {
            let mut width = 0;
            for j in 1..depth {
                out.write_str(if last[j] { "  " } else { "│ " })?;
                width += 2;
            }
            last[depth] = i + 1 == context.children.len();
            out.write_str(if last[depth] { "└─" } else { "├─" })?;
            width += 2;
            let child_context = &self.contexts[child];
            out.write_str(&child_context.name)?;
            width += child_context.name.chars().count();
            if align > 0 && !child_context.description.is_empty() {
                write!(
                    out,
                    "{:pad$}{}",
                    "",
                    child_context.description,
                    pad = align.saturating_sub(width)
                )?;
            }
            out.write_str("\n")?;
            self.write_tree(out, child, depth + 1, last, align)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::args::{ArgTree, FlagSpec, ValueKind};

    fn sample_tree() -> ArgTree {
        let mut tree = ArgTree::new("prog", "a sample program");
        let root = tree.root();
        tree.add_flag(
            root,
            ValueKind::Bool,
            FlagSpec {
                short: Some('v'),
                long: Some("verbose"),
                description: Some("enable verbose output"),
                ..FlagSpec::default()
            },
        );
        tree.add_flag(
            root,
            ValueKind::Str,
            FlagSpec {
                short: Some('i'),
                long: Some("input"),
                value_name: Some("file"),
                description: Some("the file to operate on"),
                required: true,
                ..FlagSpec::default()
            },
        );
        let create = tree.add_command(root, "create", "touch a new file");
        tree.add_flag(
            create,
            ValueKind::Str,
            FlagSpec {
                short: Some('c'),
                long: Some("content"),
                description: Some("data to write into the file"),
                ..FlagSpec::default()
            },
        );
        let delete = tree.add_command(root, "delete", "delete a file");
        tree.add_flag(
            delete,
            ValueKind::Bool,
            FlagSpec {
                short: Some('r'),
                description: Some("delete directories too"),
                ..FlagSpec::default()
            },
        );
        tree
    }

    /// Invariant: descriptions share one start column across the whole
    /// tree, whatever each line's prefix and flag widths are.
    #[test]
    fn descriptions_are_column_aligned() {
        let tree = sample_tree();
        let usage = tree.usage_string();
        let descriptions = [
            "show this help menu",
            "enable verbose output",
            "the file to operate on",
            "touch a new file",
            "data to write into the file",
            "delete a file",
            "delete directories too",
        ];
        let mut columns = Vec::new();
        for line in usage.lines() {
            for desc in descriptions {
                if let Some(at) = line.find(desc) {
                    columns.push(line[..at].chars().count());
                }
            }
        }
        assert_eq!(columns.len(), descriptions.len());
        assert!(
            columns.windows(2).all(|w| w[0] == w[1]),
            "description columns differ: {columns:?}\n{usage}"
        );
    }

    /// Invariant: the tree section draws branch and terminator glyphs
    /// and the required flag is rendered without brackets.
    #[test]
    fn tree_glyphs_and_required_rendering() {
        let tree = sample_tree();
        let usage = tree.usage_string();
        assert!(usage.contains("├─create"));
        assert!(usage.contains("└─delete"));
        assert!(usage.contains("-i <file>"));
        assert!(!usage.contains("[-i <file>]"));
        assert!(usage.contains("(required)"));
        assert!(usage.contains("[-c <string>]"));
        assert!(usage.starts_with("SYNOPSIS\n"));
    }

    /// Invariant: the synopsis follows the matched command chain and
    /// lists the matched path's flags in declaration order.
    #[test]
    fn synopsis_tracks_matched_command() {
        let mut tree = sample_tree();
        let argv = ["prog", "create", "-i", "x", "-c", "y"];
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        tree.parse(&argv).expect("parse ok");
        let usage = tree.usage_string();
        let synopsis = usage.lines().nth(1).expect("synopsis line");
        assert!(synopsis.starts_with("prog create "));
        let help = synopsis.find("[-h]").expect("help flag");
        let input = synopsis.find("-i <file>").expect("input flag");
        let content = synopsis.find("[-c <string>]").expect("content flag");
        assert!(help < input && input < content, "{synopsis}");
        // An unmatched tree synopsis advertises the command placeholder.
        let fresh = sample_tree();
        let usage = fresh.usage_string();
        assert!(usage.lines().nth(1).unwrap().contains("<command>"));
    }
}
