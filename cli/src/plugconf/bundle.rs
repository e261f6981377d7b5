//! Generation of `bundled_plugconf.vim`.
use std::fmt::Write as _;

use super::parser::{LoadOn, Plugconf};
use crate::paths::ReposPath;

/// Guard variable that keeps the bundle from loading twice.
pub const GUARD_VARIABLE: &str = "g:loaded_volt_bundled_plugconf";

/// One installed plugin and its parsed plugconf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlugconfInfo {
    /// 1-based position in the profile. Suffixed to script-local function
    /// names so plugins cannot collide.
    pub sequence_id: usize,
    pub repos_path: ReposPath,
    /// `None` when the plugin has no plugconf.
    pub plugconf: Option<Plugconf>,
}

const HEADER: &str = "\" This file is generated by volt. Do not edit; run 'volt build' instead.";

const PRELUDE: &str = r"let s:activated = {}

function! s:activate(name, group, config) abort
  if has_key(s:activated, a:name)
    return
  endif
  let s:activated[a:name] = 1
  if a:group !=# ''
    execute 'autocmd!' a:group
  endif
  if type(a:config) == v:t_func
    call a:config()
  endif
  execute 'packadd' a:name
endfunction";

/// Render the bundle for `infos`, which must already be in load order.
#[must_use]
pub fn generate(infos: &[&PlugconfInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{HEADER}");
    let _ = writeln!(out, "if exists('{GUARD_VARIABLE}')\n  finish\nendif");
    let _ = writeln!(out, "let {GUARD_VARIABLE} = 1\n");
    let _ = writeln!(out, "{PRELUDE}");

    for info in infos {
        out.push('\n');
        out.push_str(&segment(info));
    }
    out
}

fn segment(info: &PlugconfInfo) -> String {
    let id = info.sequence_id;
    let name = info.repos_path.encode();
    let mut out = String::new();
    let _ = writeln!(out, "\" {}", info.repos_path);

    let default = Plugconf::default();
    let plugconf = info.plugconf.as_ref().unwrap_or(&default);

    let locals: Vec<&str> = plugconf
        .config
        .iter()
        .chain(&plugconf.functions)
        .filter_map(|f| f.local_name())
        .collect();

    for func in plugconf.config.iter().chain(&plugconf.functions) {
        let _ = writeln!(out, "{}\n", rename_locals(&func.source, &locals, id));
    }

    let config_ref = plugconf
        .config
        .as_ref()
        .and_then(|f| f.local_name())
        .map_or_else(|| "0".to_string(), |n| format!("function('s:{n}_{id}')"));

    match &plugconf.load_on {
        LoadOn::Start => {
            let _ = writeln!(out, "call s:activate('{name}', '', {config_ref})");
        }
        LoadOn::FileType(patterns) => {
            autocmd_group(&mut out, id, "FileType", patterns, &name, &config_ref);
        }
        LoadOn::ExCommand(commands) => {
            autocmd_group(&mut out, id, "CmdUndefined", commands, &name, &config_ref);
        }
    }
    out
}

fn autocmd_group(
    out: &mut String,
    id: usize,
    event: &str,
    patterns: &[String],
    name: &str,
    config_ref: &str,
) {
    let group = format!("volt-plugconf-{id}");
    let _ = writeln!(out, "augroup {group}\n  autocmd!");
    for pattern in patterns {
        let _ = writeln!(
            out,
            "  autocmd {event} {pattern} call s:activate('{name}', '{group}', {config_ref})"
        );
    }
    let _ = writeln!(out, "augroup END");
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '#')
}

/// Rewrite `s:name` and `<SID>name` to `s:name_<id>` for every name in `locals`.
///
/// A match must not be preceded by a name character and the identifier must
/// match in full, so `s:foo` leaves `s:foobar` and `xs:foo` alone.
fn rename_locals(text: &str, locals: &[&str], id: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut prev: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        let boundary = prev.is_none_or(|p| !is_name_char(p));
        let prefix_len = if boundary && rest.starts_with("s:") {
            Some(2)
        } else if rest.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("<SID>")) {
            Some(5)
        } else {
            None
        };

        if let Some(n) = prefix_len {
            let after = &rest[n..];
            let len = after
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(after.len());
            let ident = &after[..len];
            if !ident.is_empty() && locals.contains(&ident) {
                let _ = write!(out, "s:{ident}_{id}");
                rest = &after[len..];
                prev = ident.chars().last();
                continue;
            }
        }

        out.push(c);
        rest = &rest[c.len_utf8()..];
        prev = Some(c);
    }
    out
}
