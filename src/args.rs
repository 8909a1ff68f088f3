//! ArgTree: a tree of parser contexts built on [`VarMap`].
//!
//! Internal Design:
//!
//! Summary
//! - Goal: hierarchical command/flag parsing with typed option values,
//!   required-flag validation and structured, renderable errors.
//! - A context is one tree node: the root plus one node per nested
//!   subcommand. Each context owns two `VarMap`s resolving short and
//!   long flag spellings to option entries, and records its entries in
//!   declaration order.
//! - All contexts live in one `SlotMap`; all option entries live in a
//!   second, tree-wide `SlotMap` owned by the root. Slot keys are
//!   stable across every insertion, which is what lets a flag lookup
//!   store a key inside a `VarMap` value (8 native-endian bytes) and
//!   dereference it later regardless of how the maps have grown.
//! - Parent references are keys, not owners; children are owned through
//!   the context arena. Teardown is a single drop.
//!
//! Error policy
//! - Configuration misuse (duplicate flag spelling anywhere in the
//!   tree, duplicate sibling command name, a flag with neither spelling,
//!   typed access with the wrong kind) is a programmer error: it logs
//!   through `tracing` and panics.
//! - User input problems are values: `parse` threads a single
//!   [`ParseError`] back up the recursive descent, so only the most
//!   recently detected failure is observable.
//!
//! Re-parsing
//! - `parse` may be called again on the same tree; options already
//!   marked set keep their values and will report duplicates unless
//!   [`ArgTree::reset`] is called in between.

use crate::path;
use crate::var_map::VarMap;
use slotmap::{new_key_type, Key as _, KeyData, SlotMap};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

new_key_type! {
    /// Stable handle to one parser context.
    pub struct ContextKey;
}
new_key_type! {
    /// Stable handle to one option entry.
    pub struct OptionKey;
}

// Flag maps are tiny; ten buckets is plenty and keeps bucket scans short.
pub(crate) const FLAG_BUCKETS: usize = 10;

// Fatal configuration-time assertion. Logs to the diagnostic sink, then
// panics. Never used for recoverable parse errors.
macro_rules! config_fatal {
    ($($arg:tt)*) => {{
        tracing::error!($($arg)*);
        panic!($($arg)*);
    }};
}

/// The kinds of values an option can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Str,
    Path,
    Double,
    Long,
    Unsigned,
}

/// Configuration for [`ArgTree::add_flag`]. All fields are optional
/// except that at least one of `short` and `long` must be set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagSpec<'a> {
    pub short: Option<char>,
    pub long: Option<&'a str>,
    /// Placeholder shown for the option's value in usage output.
    pub value_name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub required: bool,
}

fn spec_label(spec: &FlagSpec<'_>) -> String {
    match (spec.short, spec.long) {
        (Some(c), Some(l)) => format!("[-{c}, --{l}]"),
        (Some(c), None) => format!("[-{c}]"),
        (None, Some(l)) => format!("[--{l}]"),
        (None, None) => String::from("[]"),
    }
}

// Tagged value slot of one option entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Bool(bool),
    Str(Option<String>),
    Path(Option<PathBuf>),
    Double(f64),
    Long(i64),
    Unsigned(u64),
}

impl Value {
    fn default_for(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Str => Value::Str(None),
            ValueKind::Path => Value::Path(None),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::Long => Value::Long(0),
            ValueKind::Unsigned => Value::Unsigned(0),
        }
    }
}

#[derive(Debug)]
pub(crate) struct OptionEntry {
    pub(crate) short: Option<char>,
    pub(crate) long: Option<String>,
    pub(crate) value_name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) kind: ValueKind,
    pub(crate) required: bool,
    pub(crate) set: bool,
    pub(crate) value: Value,
}

impl OptionEntry {
    // "[-i, --input]" spelling used by error messages.
    pub(crate) fn label(&self) -> String {
        match (self.short, &self.long) {
            (Some(c), Some(l)) => format!("[-{c}, --{l}]"),
            (Some(c), None) => format!("[-{c}]"),
            (None, Some(l)) => format!("[--{l}]"),
            (None, None) => String::from("[]"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) parent: Option<ContextKey>,
    pub(crate) children: Vec<ContextKey>,
    pub(crate) short_flags: VarMap,
    pub(crate) long_flags: VarMap,
    // Option entries in declaration order.
    pub(crate) entries: Vec<OptionKey>,
}

impl Context {
    fn new(name: &str, description: &str, parent: Option<ContextKey>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parent,
            children: Vec::new(),
            short_flags: VarMap::new(FLAG_BUCKETS),
            long_flags: VarMap::new(FLAG_BUCKETS),
            entries: Vec::new(),
        }
    }
}

/// The closed set of user-input failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("missing required command")]
    CommandMissing,
    #[error("invalid command")]
    CommandInvalid,
    #[error("option missing a required value")]
    OptionMissingValue,
    #[error("option received an invalid value")]
    OptionInvalid,
    #[error("option passed more than once")]
    OptionDuplicate,
    #[error("required option not set")]
    OptionRequired,
    #[error("option belongs to a different command")]
    OptionMismatch,
}

/// One parse failure, carrying everything needed to render a complete
/// message without consulting the tree again.
#[derive(Debug, Clone)]
pub struct ParseError {
    kind: ErrorKind,
    option: Option<OptionKey>,
    flag: Option<String>,
    extra: Option<String>,
    origin: ContextKey,
    origin_name: String,
    origin_is_root: bool,
    origin_parent_is_root: bool,
    candidates: Vec<String>,
    matched_name: Option<String>,
    matched_parent_is_root: bool,
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The offending option entry, if the failure concerns one.
    pub fn option(&self) -> Option<OptionKey> {
        self.option
    }

    /// The raw offending token text, if any.
    pub fn offending_text(&self) -> Option<&str> {
        self.extra.as_deref()
    }

    /// The context at which the failure was detected.
    pub fn origin(&self) -> ContextKey {
        self.origin
    }

    fn write_candidates(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.candidates.is_empty() {
            return Ok(());
        }
        write!(f, " [must be one of: {}]", self.candidates.join(", "))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = self.flag.as_deref().unwrap_or("[]");
        match self.kind {
            ErrorKind::CommandMissing => {
                write!(f, "Missing required ")?;
                if self.origin_is_root {
                    write!(f, "command")?;
                } else {
                    write!(f, "subcommand for {}", self.origin_name)?;
                }
                self.write_candidates(f)
            }
            ErrorKind::CommandInvalid => {
                if self.flag.is_some() {
                    write!(f, "Provided argument before required ")?;
                } else {
                    write!(f, "Invalid ")?;
                }
                if self.origin_is_root {
                    write!(f, "command")?;
                } else {
                    write!(f, "subcommand for {}", self.origin_name)?;
                }
                self.write_candidates(f)?;
                write!(f, ": {}", self.extra.as_deref().unwrap_or(""))
            }
            ErrorKind::OptionMissingValue => {
                write!(f, "Option {flag} was missing a required value")
            }
            ErrorKind::OptionInvalid => {
                write!(
                    f,
                    "Option {flag} received an invalid value: {}",
                    self.extra.as_deref().unwrap_or("")
                )
            }
            ErrorKind::OptionDuplicate => {
                write!(f, "Option {flag} was passed more than once")
            }
            ErrorKind::OptionRequired => {
                write!(f, "Missing required flag")?;
                if !self.origin_is_root {
                    write!(
                        f,
                        " for '{}' {}",
                        self.origin_name,
                        if self.origin_parent_is_root {
                            "command"
                        } else {
                            "subcommand"
                        }
                    )?;
                }
                write!(f, ": {flag}")
            }
            ErrorKind::OptionMismatch => {
                write!(
                    f,
                    "Flag not supported by provided '{}' {}: {flag}",
                    self.matched_name.as_deref().unwrap_or(""),
                    if self.matched_parent_is_root {
                        "command"
                    } else {
                        "subcommand"
                    }
                )
            }
        }
    }
}

impl std::error::Error for ParseError {}

fn encode_key(key: OptionKey) -> [u8; 8] {
    key.data().as_ffi().to_ne_bytes()
}

fn decode_key(bytes: &[u8]) -> OptionKey {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    KeyData::from_ffi(u64::from_ne_bytes(raw)).into()
}

/// The argument parser tree. Holds every context and every option entry
/// for the whole tree; handles returned during configuration stay valid
/// for the tree's lifetime.
#[derive(Debug)]
pub struct ArgTree {
    pub(crate) contexts: SlotMap<ContextKey, Context>,
    pub(crate) options: SlotMap<OptionKey, OptionEntry>,
    pub(crate) root: ContextKey,
    pub(crate) help: Option<OptionKey>,
    pub(crate) matched: Option<ContextKey>,
    help_hit: bool,
}

impl ArgTree {
    /// A tree with a single root context named after the program.
    pub fn new(program: &str, description: &str) -> Self {
        let mut contexts = SlotMap::with_key();
        let root = contexts.insert(Context::new(program, description, None));
        Self {
            contexts,
            options: SlotMap::with_key(),
            root,
            help: None,
            matched: None,
            help_hit: false,
        }
    }

    pub fn root(&self) -> ContextKey {
        self.root
    }

    pub fn context_name(&self, ctx: ContextKey) -> &str {
        &self.contexts[ctx].name
    }

    /// The deepest context whose name was consumed by the last parse.
    pub fn matched_command(&self) -> Option<ContextKey> {
        self.matched
    }

    /// True when `ctx` is the deepest matched context of the last parse.
    pub fn matched(&self, ctx: ContextKey) -> bool {
        self.matched == Some(ctx)
    }

    /// True when the last parse saw `-h`/`--help` anywhere in argv. The
    /// caller is expected to render usage for
    /// [`ArgTree::matched_command`] (or the root) and exit.
    pub fn help_requested(&self) -> bool {
        self.help_hit
    }

    // ------------------------------------------------------------------
    // Configuration

    /// Register a flag on `ctx`. Returns a handle used to read the
    /// parsed value later. The first flag added to the root implicitly
    /// registers a built-in boolean `-h`/`--help`.
    ///
    /// # Panics
    ///
    /// Configuration misuse is fatal: neither spelling given, or either
    /// spelling already registered anywhere in the tree.
    pub fn add_flag(&mut self, ctx: ContextKey, kind: ValueKind, spec: FlagSpec<'_>) -> OptionKey {
        if !self.contexts.contains_key(ctx) {
            config_fatal!("invalid configuration: unknown context handle");
        }
        if spec.short.is_none() && spec.long.is_none() {
            config_fatal!(
                "invalid configuration: either a short or a long flag must be set"
            );
        }
        if ctx == self.root && self.help.is_none() {
            self.add_help();
        }
        if self.flag_exists(self.root, spec.short, spec.long) {
            config_fatal!(
                "invalid configuration: option already exists: {}",
                spec_label(&spec)
            );
        }

        let key = self.options.insert(OptionEntry {
            short: spec.short,
            long: spec.long.map(str::to_string),
            value_name: spec.value_name.map(str::to_string),
            description: spec.description.map(str::to_string),
            kind,
            required: spec.required,
            set: false,
            value: Value::default_for(kind),
        });
        let encoded = encode_key(key);
        let context = &mut self.contexts[ctx];
        if let Some(c) = spec.short {
            let mut buf = [0u8; 4];
            context
                .short_flags
                .insert(c.encode_utf8(&mut buf).as_bytes(), &encoded);
        }
        if let Some(l) = spec.long {
            context.long_flags.insert(l.as_bytes(), &encoded);
        }
        context.entries.push(key);
        key
    }

    /// Create a subcommand context under `ctx`.
    ///
    /// # Panics
    ///
    /// A duplicate sibling name or an empty name is fatal.
    pub fn add_command(&mut self, ctx: ContextKey, name: &str, description: &str) -> ContextKey {
        if !self.contexts.contains_key(ctx) {
            config_fatal!("invalid configuration: unknown context handle");
        }
        if name.is_empty() {
            config_fatal!("invalid configuration: command name must not be empty");
        }
        let duplicate = self.contexts[ctx]
            .children
            .iter()
            .any(|&child| self.contexts[child].name == name);
        if duplicate {
            config_fatal!("invalid configuration: command already exists: {name}");
        }
        let child = self
            .contexts
            .insert(Context::new(name, description, Some(ctx)));
        self.contexts[ctx].children.push(child);
        child
    }

    fn add_help(&mut self) {
        let key = self.options.insert(OptionEntry {
            short: Some('h'),
            long: Some("help".to_string()),
            value_name: None,
            description: Some("show this help menu".to_string()),
            kind: ValueKind::Bool,
            required: false,
            set: false,
            value: Value::Bool(false),
        });
        let encoded = encode_key(key);
        let root = &mut self.contexts[self.root];
        root.short_flags.insert(b"h", &encoded);
        root.long_flags.insert(b"help", &encoded);
        root.entries.push(key);
        self.help = Some(key);
    }

    // Whole-tree duplicate check, root-down.
    fn flag_exists(&self, ctx: ContextKey, short: Option<char>, long: Option<&str>) -> bool {
        let context = &self.contexts[ctx];
        if let Some(c) = short {
            let mut buf = [0u8; 4];
            if context
                .short_flags
                .get(c.encode_utf8(&mut buf).as_bytes())
                .is_some()
            {
                return true;
            }
        }
        if let Some(l) = long {
            if context.long_flags.get(l.as_bytes()).is_some() {
                return true;
            }
        }
        context
            .children
            .iter()
            .any(|&child| self.flag_exists(child, short, long))
    }

    // ------------------------------------------------------------------
    // Token resolution

    // Resolve `tok` against one context's flag maps. Returns the option
    // handle and an attached value (`--name=value`, `-xVALUE`), if any.
    fn resolve_local<'t>(
        &self,
        ctx: ContextKey,
        tok: &'t str,
    ) -> Option<(OptionKey, Option<&'t str>)> {
        let context = &self.contexts[ctx];
        if let Some(body) = tok.strip_prefix("--") {
            if body.is_empty() {
                return None;
            }
            let (name, attached) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            let value = context.long_flags.get_value(name.as_bytes())?;
            return Some((decode_key(value), attached));
        }
        if let Some(body) = tok.strip_prefix('-') {
            let c = body.chars().next()?;
            let mut buf = [0u8; 4];
            let value = context
                .short_flags
                .get_value(c.encode_utf8(&mut buf).as_bytes())?;
            let rest = &body[c.len_utf8()..];
            let attached = (!rest.is_empty()).then_some(rest);
            return Some((decode_key(value), attached));
        }
        None
    }

    // Whole-tree lookup, root-down, ignoring attached values.
    fn find_entry(&self, tok: &str) -> Option<OptionKey> {
        self.find_entry_from(self.root, tok)
    }

    fn find_entry_from(&self, ctx: ContextKey, tok: &str) -> Option<OptionKey> {
        if let Some((key, _)) = self.resolve_local(ctx, tok) {
            return Some(key);
        }
        self.contexts[ctx]
            .children
            .iter()
            .find_map(|&child| self.find_entry_from(child, tok))
    }

    // ------------------------------------------------------------------
    // Parsing

    /// Parse command-line tokens; `argv[0]` is the program name. On
    /// failure exactly one error is returned — the most recently
    /// detected one. Flags already set persist across calls; see
    /// [`ArgTree::reset`].
    pub fn parse<S: AsRef<str>>(&mut self, argv: &[S]) -> Result<(), ParseError> {
        let tokens: Vec<&str> = argv.iter().map(|s| s.as_ref()).collect();
        self.matched = None;
        self.help_hit = false;

        let result = self.parse_inner(self.root, &tokens);

        // Help short-circuit: seen anywhere in argv, the parse reports
        // success and all other findings are suppressed.
        if let Some(help) = self.help {
            if tokens.iter().any(|tok| self.find_entry(tok) == Some(help)) {
                self.help_hit = true;
                return Ok(());
            }
        }
        result?;

        // Cross-tree pass: a token that resolves to an entry nothing
        // consumed must belong to a context other than the matched one.
        for tok in tokens.iter().skip(1) {
            if let Some(key) = self.find_entry(tok) {
                if !self.options[key].set {
                    let at = self.matched.unwrap_or(self.root);
                    return Err(self.error(at, ErrorKind::OptionMismatch, Some(key), None));
                }
            }
        }
        Ok(())
    }

    // One recursion level: `tokens[0]` is this context's own name.
    fn parse_inner(&mut self, ctx: ContextKey, tokens: &[&str]) -> Result<(), ParseError> {
        let children = self.contexts[ctx].children.clone();
        if !children.is_empty() {
            let Some(&next) = tokens.get(1) else {
                return Err(self.error(ctx, ErrorKind::CommandMissing, None, None));
            };
            let child = children
                .iter()
                .copied()
                .find(|&child| self.contexts[child].name == next);
            match child {
                Some(child) => {
                    self.matched = Some(child);
                    self.parse_inner(child, &tokens[1..])?;
                }
                None => {
                    let entry = self.find_entry(next);
                    return Err(self.error(ctx, ErrorKind::CommandInvalid, entry, Some(next)));
                }
            }
        }

        // Scan the remaining tokens for this context's own flags. Tokens
        // belonging to other levels of the matched path are resolved by
        // their own level's scan.
        let mut i = 1;
        while i < tokens.len() {
            let tok = tokens[i];
            i += 1;
            let Some((key, attached)) = self.resolve_local(ctx, tok) else {
                continue;
            };
            let (kind, already_set) = {
                let entry = &self.options[key];
                (entry.kind, entry.set)
            };
            if already_set {
                return Err(self.error(ctx, ErrorKind::OptionDuplicate, Some(key), None));
            }
            if kind == ValueKind::Bool {
                let entry = &mut self.options[key];
                entry.value = Value::Bool(true);
                entry.set = true;
                continue;
            }
            let raw = match attached {
                Some(value) => value,
                None => {
                    let Some(&next) = tokens.get(i) else {
                        return Err(self.error(ctx, ErrorKind::OptionMissingValue, Some(key), None));
                    };
                    // A value that itself resolves to a recognized flag
                    // anywhere in the tree is a missing value, not data.
                    if self.find_entry(next).is_some() {
                        return Err(self.error(ctx, ErrorKind::OptionMissingValue, Some(key), None));
                    }
                    i += 1;
                    next
                }
            };
            let value = match kind {
                ValueKind::Bool => unreachable!("handled above"),
                ValueKind::Str => Value::Str(Some(raw.to_string())),
                ValueKind::Path => match path::normalize(raw) {
                    Some(p) => Value::Path(Some(p)),
                    None => {
                        return Err(self.error(ctx, ErrorKind::OptionInvalid, Some(key), Some(raw)))
                    }
                },
                ValueKind::Double => match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => Value::Double(v),
                    _ => {
                        return Err(self.error(ctx, ErrorKind::OptionInvalid, Some(key), Some(raw)))
                    }
                },
                ValueKind::Long => match raw.parse::<i64>() {
                    Ok(v) => Value::Long(v),
                    Err(_) => {
                        return Err(self.error(ctx, ErrorKind::OptionInvalid, Some(key), Some(raw)))
                    }
                },
                ValueKind::Unsigned => match raw.parse::<u64>() {
                    Ok(v) => Value::Unsigned(v),
                    Err(_) => {
                        return Err(self.error(ctx, ErrorKind::OptionInvalid, Some(key), Some(raw)))
                    }
                },
            };
            let entry = &mut self.options[key];
            entry.value = value;
            entry.set = true;
        }

        // Required validation over this context's own entries.
        for &key in &self.contexts[ctx].entries {
            let entry = &self.options[key];
            if entry.required && !entry.set {
                return Err(self.error(ctx, ErrorKind::OptionRequired, Some(key), None));
            }
        }
        Ok(())
    }

    fn error(
        &self,
        origin: ContextKey,
        kind: ErrorKind,
        option: Option<OptionKey>,
        extra: Option<&str>,
    ) -> ParseError {
        let context = &self.contexts[origin];
        let matched = self.matched.unwrap_or(self.root);
        ParseError {
            kind,
            option,
            flag: option.map(|key| self.options[key].label()),
            extra: extra.map(str::to_string),
            origin,
            origin_name: context.name.clone(),
            origin_is_root: context.parent.is_none(),
            origin_parent_is_root: context
                .parent
                .map(|p| self.contexts[p].parent.is_none())
                .unwrap_or(false),
            candidates: context
                .children
                .iter()
                .map(|&child| self.contexts[child].name.clone())
                .collect(),
            matched_name: Some(self.contexts[matched].name.clone()),
            matched_parent_is_root: self.contexts[matched]
                .parent
                .map(|p| self.contexts[p].parent.is_none())
                .unwrap_or(true),
        }
    }

    /// Clear every option's value and set marker and forget the matched
    /// command, making the tree parse as if freshly configured.
    pub fn reset(&mut self) {
        for (_, entry) in self.options.iter_mut() {
            entry.set = false;
            entry.value = Value::default_for(entry.kind);
        }
        self.matched = None;
        self.help_hit = false;
    }

    // ------------------------------------------------------------------
    // Typed accessors. Kind mismatches are programmer errors.

    /// True once the option has been consumed by a parse.
    pub fn is_set(&self, key: OptionKey) -> bool {
        self.options[key].set
    }

    pub fn get_bool(&self, key: OptionKey) -> bool {
        match self.options[key].value {
            Value::Bool(b) => b,
            _ => config_fatal!("option {} is not a bool flag", self.options[key].label()),
        }
    }

    pub fn get_str(&self, key: OptionKey) -> Option<&str> {
        match &self.options[key].value {
            Value::Str(s) => s.as_deref(),
            _ => config_fatal!("option {} is not a string flag", self.options[key].label()),
        }
    }

    pub fn get_path(&self, key: OptionKey) -> Option<&Path> {
        match &self.options[key].value {
            Value::Path(p) => p.as_deref(),
            _ => config_fatal!("option {} is not a path flag", self.options[key].label()),
        }
    }

    pub fn get_double(&self, key: OptionKey) -> f64 {
        match self.options[key].value {
            Value::Double(v) => v,
            _ => config_fatal!("option {} is not a double flag", self.options[key].label()),
        }
    }

    pub fn get_long(&self, key: OptionKey) -> i64 {
        match self.options[key].value {
            Value::Long(v) => v,
            _ => config_fatal!("option {} is not a long flag", self.options[key].label()),
        }
    }

    pub fn get_unsigned(&self, key: OptionKey) -> u64 {
        match self.options[key].value {
            Value::Unsigned(v) => v,
            _ => config_fatal!("option {} is not an unsigned flag", self.options[key].label()),
        }
    }
}
