//! Line-based reader for plugconf scripts.
//!
//! A plugconf may only contain function definitions (plus blank and comment
//! lines) at top level. Three names are special:
//!
//! - `s:loaded_on()` must `return` `"start"`, `"filetype=<list>"` or
//!   `"excmd=<list>"`. Absent means start.
//! - `s:config()` runs right before the plugin is activated.
//! - `s:depends()` must `return` a list of repository path literals.
use std::path::Path;

use crate::error::PlugconfError;
use crate::paths::ReposPath;

const LOADED_ON: &str = "s:loaded_on";
const CONFIG: &str = "s:config";
const DEPENDS: &str = "s:depends";

/// When a plugin is activated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadOn {
    /// At startup.
    #[default]
    Start,
    /// On the first `FileType` event matching one of the patterns.
    FileType(Vec<String>),
    /// When one of the named Ex commands is first used.
    ExCommand(Vec<String>),
}

/// One function definition, header to `endfunction` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFunction {
    /// Name as written, with `<SID>` spelled `s:`.
    pub name: String,
    pub source: String,
}

impl ScriptFunction {
    /// Name without the `s:` prefix for script-local functions.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.name.strip_prefix("s:")
    }
}

/// Everything the bundler needs from one plugconf.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plugconf {
    pub load_on: LoadOn,
    pub config: Option<ScriptFunction>,
    /// Helper functions other than the three special ones, in file order.
    pub functions: Vec<ScriptFunction>,
    pub depends: Vec<ReposPath>,
}

#[derive(Debug)]
struct RawFunction {
    name: String,
    line: usize,
    lines: Vec<String>,
}

type LineError = (usize, String);

/// Parse the plugconf at `path` whose content is `source`.
///
/// # Errors
///
/// Returns [`PlugconfError::Parse`] with the offending line number.
pub fn parse(source: &str, path: &Path) -> Result<Plugconf, PlugconfError> {
    parse_inner(source).map_err(|(line, message)| PlugconfError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    })
}

fn parse_inner(source: &str) -> Result<Plugconf, LineError> {
    let mut plugconf = Plugconf::default();
    for func in split_functions(source)? {
        match func.name.as_str() {
            LOADED_ON => {
                let (line, expr) = return_expr(&func)?;
                let value = string_literal_expr(&expr).ok_or_else(|| {
                    (line, format!("{LOADED_ON}() must return a string literal"))
                })?;
                plugconf.load_on = parse_load_on(&value).map_err(|m| (line, m))?;
            }
            DEPENDS => {
                let (line, expr) = return_expr(&func)?;
                let list = list_literal_expr(&expr).ok_or_else(|| {
                    (line, format!("{DEPENDS}() must return a list of string literals"))
                })?;
                plugconf.depends = list.into_iter().map(ReposPath::new).collect();
            }
            name => {
                let function = ScriptFunction {
                    name: name.to_string(),
                    source: func.lines.join("\n"),
                };
                if name == CONFIG {
                    plugconf.config = Some(function);
                } else {
                    plugconf.functions.push(function);
                }
            }
        }
    }
    Ok(plugconf)
}

fn split_functions(source: &str) -> Result<Vec<RawFunction>, LineError> {
    let mut functions: Vec<RawFunction> = Vec::new();
    let mut current: Option<RawFunction> = None;
    let mut depth = 0usize;

    for (idx, line) in source.lines().enumerate() {
        let lineno = idx + 1;
        let trimmed = line.trim();
        let mut closed = false;

        match current.as_mut() {
            None => {
                if trimmed.is_empty() || trimmed.starts_with('"') {
                    continue;
                }
                let Some(name) = function_header(trimmed) else {
                    return Err((
                        lineno,
                        format!("only function definitions are allowed at top level: {trimmed}"),
                    ));
                };
                if functions.iter().any(|f| f.name == name) {
                    return Err((lineno, format!("function {name} is defined twice")));
                }
                current = Some(RawFunction {
                    name,
                    line: lineno,
                    lines: vec![line.to_string()],
                });
                depth = 1;
            }
            Some(func) => {
                func.lines.push(line.to_string());
                if function_header(trimmed).is_some() {
                    depth += 1;
                } else if is_function_end(trimmed) {
                    depth -= 1;
                    closed = depth == 0;
                }
            }
        }

        if closed {
            functions.extend(current.take());
        }
    }

    if let Some(func) = current {
        return Err((
            func.line,
            format!("function {} has no matching endfunction", func.name),
        ));
    }
    Ok(functions)
}

fn leading_word(s: &str) -> &str {
    let end = s.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(s.len());
    &s[..end]
}

/// `fu[nction][!] name(args)` yields `name`, with `<SID>` spelled `s:`.
fn function_header(trimmed: &str) -> Option<String> {
    let word = leading_word(trimmed);
    if word.len() < 2 || !"function".starts_with(word) {
        return None;
    }
    let rest = &trimmed[word.len()..];
    let rest = rest.strip_prefix('!').unwrap_or(rest).trim_start();
    let paren = rest.find('(')?;
    let name = rest[..paren].trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '#' | '<' | '>' | '.'));
    if !valid {
        return None;
    }
    Some(match name.get(..5) {
        Some(sid) if sid.eq_ignore_ascii_case("<SID>") => format!("s:{}", &name[5..]),
        _ => name.to_string(),
    })
}

/// `endf[unction]`.
fn is_function_end(trimmed: &str) -> bool {
    let word = leading_word(trimmed);
    word.len() >= 4 && "endfunction".starts_with(word)
}

/// The expression of the single `return` statement in a function body.
fn return_expr(func: &RawFunction) -> Result<(usize, String), LineError> {
    let body_end = func.lines.len().saturating_sub(1);
    let body = func.lines.get(1..body_end).unwrap_or_default();

    // Join `\` continuation lines onto the statement they continue.
    let mut statements: Vec<(usize, String)> = Vec::new();
    for (offset, line) in body.iter().enumerate() {
        let trimmed = line.trim();
        if let Some(cont) = trimmed.strip_prefix('\\')
            && let Some((_, last)) = statements.last_mut()
        {
            last.push(' ');
            last.push_str(cont.trim());
        } else {
            statements.push((func.line + offset + 1, trimmed.to_string()));
        }
    }

    let mut returns = statements.into_iter().filter(|(_, s)| {
        let word = leading_word(s);
        word.len() >= 4 && "return".starts_with(word)
    });

    let Some((line, stmt)) = returns.next() else {
        return Err((func.line, format!("{}() has no return statement", func.name)));
    };
    if let Some((extra, _)) = returns.next() {
        return Err((
            extra,
            format!("{}() must contain exactly one return statement", func.name),
        ));
    }
    let expr = stmt[leading_word(&stmt).len()..].trim().to_string();
    Ok((line, expr))
}

/// Nothing but an optional trailing comment may follow a literal.
fn only_comment(rest: &str) -> bool {
    let rest = rest.trim();
    rest.is_empty() || rest.starts_with('"')
}

fn string_literal_expr(expr: &str) -> Option<String> {
    let (value, rest) = string_literal(expr)?;
    only_comment(rest).then_some(value)
}

fn list_literal_expr(expr: &str) -> Option<Vec<String>> {
    let (values, rest) = list_literal(expr)?;
    only_comment(rest).then_some(values)
}

/// Parse a leading `'...'` or `"..."` literal, returning its value and the rest.
fn string_literal(s: &str) -> Option<(String, &str)> {
    let mut chars = s.char_indices();
    let (_, quote) = chars.next()?;
    let mut value = String::new();
    match quote {
        '\'' => {
            while let Some((i, c)) = chars.next() {
                if c == '\'' {
                    if s[i + 1..].starts_with('\'') {
                        value.push('\'');
                        chars.next();
                    } else {
                        return Some((value, &s[i + 1..]));
                    }
                } else {
                    value.push(c);
                }
            }
            None
        }
        '"' => {
            while let Some((i, c)) = chars.next() {
                match c {
                    '"' => return Some((value, &s[i + 1..])),
                    '\\' => {
                        let (_, escaped) = chars.next()?;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                    _ => value.push(c),
                }
            }
            None
        }
        _ => None,
    }
}

/// Parse a leading `[lit, lit, ...]`, returning the values and the rest.
fn list_literal(s: &str) -> Option<(Vec<String>, &str)> {
    let mut rest = s.strip_prefix('[')?;
    let mut values = Vec::new();
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix(']') {
            return Some((values, after));
        }
        let (value, after) = string_literal(rest)?;
        values.push(value);
        rest = after.trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after;
        } else if !rest.starts_with(']') {
            return None;
        }
    }
}

fn parse_load_on(value: &str) -> Result<LoadOn, String> {
    let value = value.trim();
    if value == "start" {
        return Ok(LoadOn::Start);
    }
    let patterns = |list: &str| -> Result<Vec<String>, String> {
        let items: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if items.is_empty() {
            Err(format!("'{value}' names no patterns"))
        } else {
            Ok(items)
        }
    };
    match value.split_once('=') {
        Some(("filetype", list)) => Ok(LoadOn::FileType(patterns(list)?)),
        Some(("excmd", list)) => Ok(LoadOn::ExCommand(patterns(list)?)),
        _ => Err(format!(
            "invalid {LOADED_ON}() value '{value}': expected \"start\", \"filetype=...\" or \"excmd=...\""
        )),
    }
}
