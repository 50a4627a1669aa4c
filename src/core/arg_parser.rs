// src/core/arg_parser.rs

use serde_json::{Map, Value};

/// Long-option alias rules declared by a plugin: `(canonical, &[aliases])`.
/// A flag given under any alias is stored under its canonical name.
pub type AliasRules = &'static [(&'static str, &'static [&'static str])];

/// Command-line parameters classified into positionals and named flags.
///
/// Positionals keep every bare token in order, including the plugin and command
/// names, so plugins address their own arguments by index (the stage of
/// `omg deploy backend prod` is positional 2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedParams {
    positional: Vec<String>,
    named: Map<String, Value>,
}

impl ParsedParams {
    /// Parses raw CLI tokens (binary name already stripped).
    ///
    /// # Logic:
    /// - `--key=value` and `-k=value` set `key` to `value`.
    /// - `--key` followed by a token that is *not* a flag takes it as its value,
    ///   otherwise it is a boolean flag (`true`).
    /// - `-abc` sets `a` and `b` to `true`; `c` may take the following value.
    /// - Everything after a lone `--` is positional.
    pub fn parse(args: &[String], aliases: AliasRules) -> Self {
        let mut positional = Vec::new();
        let mut named = Map::new();
        let mut iter = args.iter().map(String::as_str).peekable();

        while let Some(token) = iter.next() {
            if token == "--" {
                positional.extend(iter.by_ref().map(str::to_string));
                break;
            }

            let (names, inline_value): (Vec<&str>, Option<&str>) =
                if let Some(body) = token.strip_prefix("--") {
                    match body.split_once('=') {
                        Some((name, value)) => (vec![name], Some(value)),
                        None => (vec![body], None),
                    }
                } else if let Some(body) = token.strip_prefix('-').filter(|b| !b.is_empty()) {
                    match body.split_once('=') {
                        Some((name, value)) => (vec![name], Some(value)),
                        None => (
                            body.char_indices()
                                .filter_map(|(i, c)| body.get(i..i + c.len_utf8()))
                                .collect(),
                            None,
                        ),
                    }
                } else {
                    positional.push(token.to_string());
                    continue;
                };

            let Some((last, leading)) = names.split_last() else {
                continue;
            };
            for name in leading {
                named.insert(canonical_name(name, aliases), Value::Bool(true));
            }

            let value = match inline_value {
                Some(v) => Value::String(v.to_string()),
                None => match iter.peek() {
                    Some(next) if !next.starts_with('-') => {
                        Value::String(iter.next().unwrap_or_default().to_string())
                    }
                    _ => Value::Bool(true),
                },
            };
            named.insert(canonical_name(last, aliases), value);
        }

        Self { positional, named }
    }

    /// Retrieves a positional argument by its index.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    pub fn positionals(&self) -> &[String] {
        &self.positional
    }

    /// Returns the string value of a named flag. Bare boolean flags yield `None`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.named
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Whether a named flag was given, with or without a value.
    pub fn has_flag(&self, name: &str) -> bool {
        self.named
            .get(name)
            .is_some_and(|v| !matches!(v, Value::Bool(false)))
    }

    pub fn named(&self) -> &Map<String, Value> {
        &self.named
    }

    /// Replaces the positional list, e.g. to run a synthetic plugin.
    pub fn set_positionals(&mut self, positional: Vec<String>) {
        self.positional = positional;
    }
}

fn canonical_name(name: &str, aliases: AliasRules) -> String {
    aliases
        .iter()
        .find(|(canonical, names)| *canonical == name || names.contains(&name))
        .map(|(canonical, _)| (*canonical).to_string())
        .unwrap_or_else(|| name.to_string())
}
