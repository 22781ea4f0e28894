//! Plugin document parser.
//!
//! # Responsibility
//! - Turn one plugin-definition document into a `PluginDescriptor`.
//! - Hand every binding payload to the action adapter eagerly, dropping
//!   bindings whose payload fails to adapt.
//!
//! # Invariants
//! - One plugin per document; a second `def` line ends the document.
//! - A malformed bind block is dropped without affecting its siblings.
//! - `parse` never panics past this boundary.
//!
//! # Format
//! Line-oriented and whitespace-significant. The document begins at the
//! first non-indented `def <name>` line; anything before it is
//! discarded. Before the first `bind`, `title <text>` and a
//! `description` block set plugin metadata. `bind <trigger> mode
//! <normal|command>` opens a binding scope: leading `title` and
//! `description` lines set binding metadata, every other indented line
//! accumulates verbatim as the action payload until a blank line, the
//! end of the document, or the next `bind`/`def` line. Block lines are
//! stored with the block's leading indentation removed.

use crate::action::{ActionAdapter, ActionPayload};
use crate::model::{parse_mode, BindDescriptor, Mode, PluginDescriptor};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static BIND_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^bind\s+(\S+)\s+mode\s+(\S+)\s*$").expect("valid bind line regex"));

pub type ParseResult<T> = Result<T, ParseError>;

/// Document-level parse failures. The registry logs these and skips the
/// whole document; block-level problems never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No non-indented `def <name>` line in the document.
    MissingDeclaration,
    /// A `def` line with no name after the keyword.
    EmptyName,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDeclaration => write!(f, "document has no `def <name>` declaration"),
            Self::EmptyName => write!(f, "`def` line declares no plugin name"),
        }
    }
}

impl Error for ParseError {}

/// Indented block collection state for a `description` keyword.
struct DescBlock {
    /// Indent of the `description` keyword line; block lines must sit
    /// deeper than this.
    keyword_indent: usize,
    /// Indent of the first block line, stripped from every line.
    base_indent: Option<usize>,
    lines: Vec<String>,
}

impl DescBlock {
    fn open(keyword_indent: usize, inline: Option<&str>) -> Self {
        let mut block = Self {
            keyword_indent,
            base_indent: None,
            lines: Vec::new(),
        };
        if let Some(text) = inline {
            block.lines.push(text.to_string());
        }
        block
    }

    fn close(self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.join("\n"))
        }
    }
}

/// One open `bind` scope before flushing.
struct BindScope {
    trigger: String,
    mode: Mode,
    title: Option<String>,
    description: Option<String>,
    desc_block: Option<DescBlock>,
    /// Leading `title`/`description` lines are accepted only before the
    /// first payload line.
    meta_open: bool,
    payload_base_indent: Option<usize>,
    payload: Vec<String>,
}

impl BindScope {
    fn new(trigger: String, mode: Mode) -> Self {
        Self {
            trigger,
            mode,
            title: None,
            description: None,
            desc_block: None,
            meta_open: true,
            payload_base_indent: None,
            payload: Vec::new(),
        }
    }

    fn close_desc_block(&mut self) {
        if let Some(block) = self.desc_block.take() {
            self.description = block.close();
        }
    }
}

/// Position in the document outside any open bind scope.
enum Section {
    /// Before the `def` line; everything is discarded.
    Preamble,
    /// After `def`, before the first `bind`: plugin metadata zone.
    PluginMeta,
    /// An open binding scope.
    Bind(BindScope),
    /// A malformed bind block being consumed without effect.
    SkippedBind,
    /// After a terminated bind block; only keywords matter here.
    AfterBind,
}

/// Parses one plugin document.
///
/// Returns a descriptor even when every binding was dropped (the plugin
/// is then registered but inert). Adaptation failures and malformed
/// bind blocks are logged and skipped; only a missing or empty `def`
/// declaration fails the whole document.
pub fn parse(text: &str, adapter: &dyn ActionAdapter) -> ParseResult<PluginDescriptor> {
    let mut plugin: Option<PluginDescriptor> = None;
    let mut plugin_desc: Option<DescBlock> = None;
    let mut section = Section::Preamble;

    let lines: Vec<&str> = text.lines().collect();
    let mut index = 0;
    'lines: while index < lines.len() {
        let line = lines[index].trim_end();
        let stripped = line.trim_start();
        let indent = line.len() - stripped.len();
        let blank = stripped.is_empty();

        // Open description blocks swallow lines deeper than their
        // keyword; a dedent or recognized keyword closes the block and
        // the closing line is reprocessed below.
        if !blank {
            let keyword = is_keyword_line(stripped, indent);
            if let Some(block) = active_desc_block(&mut section, &mut plugin_desc) {
                if indent > block.keyword_indent && !keyword {
                    let base = *block.base_indent.get_or_insert(indent);
                    block.lines.push(strip_indent(line, base).to_string());
                    index += 1;
                    continue 'lines;
                }
                close_desc_blocks(&mut section, &mut plugin_desc, &mut plugin);
                // fall through: reprocess this line in normal flow
            }
        }

        if blank {
            if matches!(section, Section::Bind(_)) {
                // A blank line terminates the binding block.
                flush_bind(&mut section, &mut plugin, adapter);
            } else if matches!(section, Section::SkippedBind) {
                section = Section::AfterBind;
            } else {
                close_desc_blocks(&mut section, &mut plugin_desc, &mut plugin);
            }
            index += 1;
            continue 'lines;
        }

        // `def` is recognized only at the left margin.
        if indent == 0 && (stripped == "def" || stripped.starts_with("def ")) {
            if plugin.is_none() {
                let name = stripped.strip_prefix("def").unwrap_or_default().trim();
                if name.is_empty() {
                    return Err(ParseError::EmptyName);
                }
                plugin = Some(PluginDescriptor::new(name));
                section = Section::PluginMeta;
            } else {
                flush_bind(&mut section, &mut plugin, adapter);
                warn!(
                    "event=document_parse module=parser status=warn reason=second_declaration \
                     plugin={} detail=ignoring_remainder",
                    plugin.as_ref().map(|p| p.name.as_str()).unwrap_or("?")
                );
                break 'lines;
            }
            index += 1;
            continue 'lines;
        }

        // `bind` flushes the previous scope wherever it appears.
        if stripped.starts_with("bind ") {
            if plugin.is_none() {
                index += 1;
                continue 'lines;
            }
            flush_bind(&mut section, &mut plugin, adapter);
            section = match open_bind_scope(stripped, plugin.as_ref()) {
                Some(scope) => Section::Bind(scope),
                None => Section::SkippedBind,
            };
            index += 1;
            continue 'lines;
        }

        // Non-indented non-keyword text ends an open binding block.
        if indent == 0 && matches!(section, Section::Bind(_)) {
            flush_bind(&mut section, &mut plugin, adapter);
            index += 1;
            continue 'lines;
        }

        match &mut section {
            Section::PluginMeta => {
                if let Some(plugin) = plugin.as_mut() {
                    if let Some(text) = keyword_argument(stripped, "title") {
                        plugin.title = non_empty(text);
                    } else if let Some(inline) = description_keyword(stripped) {
                        plugin_desc = Some(DescBlock::open(indent, inline));
                    }
                    // Unrecognized metadata lines degrade to no-ops.
                }
            }
            Section::Bind(scope) => {
                let mut consumed_meta = false;
                if scope.meta_open {
                    if let Some(text) = keyword_argument(stripped, "title") {
                        scope.title = non_empty(text);
                        consumed_meta = true;
                    } else if let Some(inline) = description_keyword(stripped) {
                        scope.desc_block = Some(DescBlock::open(indent, inline));
                        consumed_meta = true;
                    }
                }
                if !consumed_meta {
                    scope.meta_open = false;
                    let base = *scope.payload_base_indent.get_or_insert(indent);
                    scope.payload.push(strip_indent(line, base).to_string());
                }
            }
            Section::Preamble | Section::SkippedBind | Section::AfterBind => {}
        }

        index += 1;
    }

    close_desc_blocks(&mut section, &mut plugin_desc, &mut plugin);
    flush_bind(&mut section, &mut plugin, adapter);
    plugin.ok_or(ParseError::MissingDeclaration)
}

/// True when the trimmed line would be handled by keyword dispatch.
fn is_keyword_line(stripped: &str, indent: usize) -> bool {
    stripped.starts_with("bind ")
        || (indent == 0 && stripped.starts_with("def "))
        || keyword_argument(stripped, "title").is_some()
        || description_keyword(stripped).is_some()
}

/// Returns the argument of a `<keyword> <text>` line. A bare keyword
/// with no argument yields `None`.
fn keyword_argument<'a>(stripped: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = stripped.strip_prefix(keyword)?;
    let rest = rest.strip_prefix(char::is_whitespace)?;
    Some(rest.trim())
}

/// Matches the `description` keyword; `Some(Some(text))` for an inline
/// first line, `Some(None)` for the bare keyword.
fn description_keyword(stripped: &str) -> Option<Option<&str>> {
    if stripped == "description" {
        return Some(None);
    }
    keyword_argument(stripped, "description").map(non_empty_ref)
}

fn non_empty(text: &str) -> Option<String> {
    non_empty_ref(text).map(str::to_string)
}

fn non_empty_ref(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn active_desc_block<'a>(
    section: &'a mut Section,
    plugin_desc: &'a mut Option<DescBlock>,
) -> Option<&'a mut DescBlock> {
    match section {
        Section::Bind(scope) => scope.desc_block.as_mut(),
        Section::PluginMeta => plugin_desc.as_mut(),
        _ => None,
    }
}

fn close_desc_blocks(
    section: &mut Section,
    plugin_desc: &mut Option<DescBlock>,
    plugin: &mut Option<PluginDescriptor>,
) {
    if let Some(block) = plugin_desc.take() {
        if let Some(plugin) = plugin.as_mut() {
            plugin.description = block.close();
        }
    }
    if let Section::Bind(scope) = section {
        scope.close_desc_block();
    }
}

/// Parses a `bind <trigger> mode <normal|command>` line into a fresh
/// scope, or logs and returns `None` for a malformed one.
fn open_bind_scope(stripped: &str, plugin: Option<&PluginDescriptor>) -> Option<BindScope> {
    let plugin_name = plugin.map(|p| p.name.as_str()).unwrap_or("?");
    let Some(captures) = BIND_LINE_RE.captures(stripped) else {
        warn!(
            "event=bind_parse module=parser status=error plugin={plugin_name} \
             reason=malformed_bind_line line={stripped:?}"
        );
        return None;
    };

    let trigger = captures[1].to_string();
    let Some(mode) = parse_mode(&captures[2]) else {
        warn!(
            "event=bind_parse module=parser status=error plugin={plugin_name} \
             trigger={trigger} reason=unknown_mode mode={}",
            &captures[2]
        );
        return None;
    };

    Some(BindScope::new(trigger, mode))
}

/// Adapts the accumulated payload and appends the binding, or drops it
/// with a log entry when adaptation fails. Leaves `section` in
/// `AfterBind` when a scope was open.
fn flush_bind(
    section: &mut Section,
    plugin: &mut Option<PluginDescriptor>,
    adapter: &dyn ActionAdapter,
) {
    let previous = std::mem::replace(section, Section::AfterBind);
    let mut scope = match previous {
        Section::Bind(scope) => scope,
        other => {
            *section = other;
            return;
        }
    };
    scope.close_desc_block();

    let Some(plugin) = plugin.as_mut() else {
        return;
    };

    let payload = ActionPayload::new(scope.payload);
    match adapter.adapt(&payload) {
        Ok(action) => {
            let mut bind = BindDescriptor::new(scope.trigger, scope.mode, action);
            bind.title = scope.title;
            bind.description = scope.description;
            plugin.binds.push(bind);
        }
        Err(err) => {
            warn!(
                "event=bind_adapt module=parser status=error plugin={} trigger={} reason={err}",
                plugin.name, scope.trigger
            );
        }
    }
}

/// Removes at most `base` bytes of leading whitespace, never splitting
/// a character.
fn strip_indent(line: &str, base: usize) -> &str {
    let mut removed = 0;
    let mut rest = line;
    while removed < base {
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_whitespace() => {
                removed += c.len_utf8();
                rest = chars.as_str();
            }
            _ => break,
        }
    }
    rest
}
