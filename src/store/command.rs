//! Groonga command script parser.
//!
//! Turns the text of a `.grn` file into a list of [`Command`]s that can be
//! sent over HTTP. Supported forms:
//!
//! ```text
//! # comment
//! table_create Users TABLE_HASH_KEY ShortText
//! column_create --table Users --name age --flags COLUMN_SCALAR --type UInt8
//! /d/delete?table=Users&key=alice
//! load --table Users
//! [
//! {"_key": "bob", "age": 30}
//! ]
//! ```
//!
//! Positional arguments are mapped to parameter names for the commands a
//! delta script is expected to contain. Anything else must use `--name value`.

use reqwest::Url;

/// One command ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command name, e.g. `table_create`.
    pub name: String,
    /// Named parameters in script order.
    pub arguments: Vec<(String, String)>,
    /// Body of a `load`, sent as the request payload.
    pub values: Option<String>,
}

impl Command {
    /// Build a command with named arguments and no body.
    #[must_use]
    pub fn new(name: &str, arguments: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            arguments: arguments
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            values: None,
        }
    }

    /// Value of the named argument, if present.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A script line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Parameter names for positional arguments, per command.
fn positional_names(command: &str) -> &'static [&'static str] {
    match command {
        "table_create" => &[
            "name",
            "flags",
            "key_type",
            "value_type",
            "default_tokenizer",
            "normalizer",
            "token_filters",
        ],
        "column_create" => &["table", "name", "flags", "type", "source"],
        "load" => &["values", "table", "columns", "ifexists", "input_type"],
        "delete" => &["table", "key", "id", "filter"],
        "table_remove" => &["name", "dependent"],
        "column_remove" => &["table", "name"],
        "table_rename" => &["name", "new_name"],
        "column_rename" => &["table", "name", "new_name"],
        "truncate" => &["target_name"],
        "plugin_register" | "plugin_unregister" => &["name"],
        "object_remove" => &["name", "force"],
        "config_set" => &["key", "value"],
        "config_delete" => &["key"],
        "select" => &[
            "table",
            "match_columns",
            "query",
            "filter",
            "scorer",
            "sortby",
            "output_columns",
            "offset",
            "limit",
        ],
        _ => &[],
    }
}

/// Parse a whole script.
///
/// # Errors
///
/// Returns the first line that cannot be parsed.
pub fn parse_script(source: &str) -> Result<Vec<Command>, ParseError> {
    let mut commands = Vec::new();
    let mut lines = source.lines().enumerate().map(|(i, line)| (i + 1, line));

    while let Some((number, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut command = if line.starts_with('/') {
            parse_uri(line).map_err(|message| ParseError::new(number, message))?
        } else {
            parse_command_line(line).map_err(|message| ParseError::new(number, message))?
        };

        if command.name == "load" && command.argument("values").is_none() {
            command.values = Some(collect_values(number, &mut lines)?);
        }
        commands.push(command);
    }

    Ok(commands)
}

/// Parse `/d/<name>[.json]?k=v&...`.
fn parse_uri(line: &str) -> Result<Command, String> {
    let url = Url::parse(&format!("http://localhost{line}")).map_err(|e| e.to_string())?;
    let name = url
        .path()
        .strip_prefix("/d/")
        .ok_or_else(|| format!("unsupported command path '{}'", url.path()))?;
    let name = name.split_once('.').map_or(name, |(name, _)| name);
    if name.is_empty() {
        return Err("missing command name".to_string());
    }

    Ok(Command {
        name: name.to_string(),
        arguments: url.query_pairs().into_owned().collect(),
        values: None,
    })
}

/// Parse `name arg1 --key value ...`.
fn parse_command_line(line: &str) -> Result<Command, String> {
    let mut tokens = tokenize(line)?.into_iter();
    let name = tokens.next().ok_or("empty command")?;
    let names = positional_names(&name);

    let mut arguments: Vec<(String, String)> = Vec::new();
    let mut positional = 0;
    while let Some(token) = tokens.next() {
        if let Some(key) = token.strip_prefix("--") {
            let value = tokens
                .next()
                .ok_or_else(|| format!("missing value for --{key}"))?;
            arguments.push((key.to_string(), value));
            continue;
        }

        // Skip parameter names already given by name.
        while positional < names.len() && arguments.iter().any(|(k, _)| k == names[positional]) {
            positional += 1;
        }
        let key = names
            .get(positional)
            .ok_or_else(|| format!("unexpected positional argument '{token}' for {name}"))?;
        arguments.push(((*key).to_string(), token));
        positional += 1;
    }

    Ok(Command {
        name,
        arguments,
        values: None,
    })
}

/// Split a command line into tokens, honoring quotes and backslash escapes.
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' || first == '\'' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some('n') => token.push('\n'),
                        Some('t') => token.push('\t'),
                        Some(escaped) => token.push(escaped),
                        None => return Err("dangling escape".to_string()),
                    },
                    c if c == first => {
                        closed = true;
                        break;
                    }
                    c => token.push(c),
                }
            }
            if !closed {
                return Err("unterminated quoted value".to_string());
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        token.push(escaped);
                    }
                } else {
                    token.push(c);
                }
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// Collect the JSON values following a `load` until its brackets balance.
fn collect_values<'a>(
    load_line: usize,
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
) -> Result<String, ParseError> {
    let mut values = String::new();
    let mut depth = 0usize;
    let mut started = false;
    let mut in_string = false;
    let mut escaped = false;

    for (number, line) in lines.by_ref() {
        if !started && line.trim().is_empty() {
            continue;
        }
        if !started && !line.trim_start().starts_with('[') {
            return Err(ParseError::new(number, "expected '[' to start load values"));
        }

        for c in line.chars() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '[' | '{' => {
                    depth += 1;
                    started = true;
                }
                ']' | '}' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| ParseError::new(number, "unbalanced brackets"))?;
                }
                _ => {}
            }
        }
        values.push_str(line);
        values.push('\n');

        if started && depth == 0 {
            return Ok(values);
        }
    }

    Err(ParseError::new(load_line, "load values are not terminated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let commands = parse_script("table_create Users TABLE_HASH_KEY ShortText\n").unwrap();
        assert_eq!(
            commands,
            vec![Command::new(
                "table_create",
                &[
                    ("name", "Users"),
                    ("flags", "TABLE_HASH_KEY"),
                    ("key_type", "ShortText"),
                ],
            )]
        );
    }

    #[test]
    fn test_named_arguments_and_mixing() {
        let commands =
            parse_script("column_create --table Users age COLUMN_SCALAR --type UInt8").unwrap();
        let command = &commands[0];
        assert_eq!(command.argument("table"), Some("Users"));
        assert_eq!(command.argument("name"), Some("age"));
        assert_eq!(command.argument("flags"), Some("COLUMN_SCALAR"));
        assert_eq!(command.argument("type"), Some("UInt8"));
    }

    #[test]
    fn test_quoted_values() {
        let commands =
            parse_script(r#"delete --table Users --filter '_key == "al ice"'"#).unwrap();
        assert_eq!(commands[0].argument("filter"), Some(r#"_key == "al ice""#));

        let commands = parse_script(r#"delete Users "bob \"the\" builder""#).unwrap();
        assert_eq!(commands[0].argument("key"), Some(r#"bob "the" builder"#));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let script = "# schema v2\n\n  table_remove Old\n# done\n";
        let commands = parse_script(script).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "table_remove");
    }

    #[test]
    fn test_uri_form() {
        let commands = parse_script("/d/delete.json?table=Users&key=al%20ice").unwrap();
        assert_eq!(commands[0].name, "delete");
        assert_eq!(commands[0].argument("key"), Some("al ice"));
    }

    #[test]
    fn test_multiline_load() {
        let script = "load --table Users\n[\n{\"_key\": \"a]\"},\n{\"_key\": \"b\"}\n]\nselect Users\n";
        let commands = parse_script(script).unwrap();
        assert_eq!(commands.len(), 2);
        let values = commands[0].values.as_deref().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(values).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(commands[1].argument("table"), Some("Users"));
    }

    #[test]
    fn test_load_with_inline_values_takes_no_body() {
        let commands = parse_script("load --table Users --values '[{\"_key\":\"a\"}]'").unwrap();
        assert!(commands[0].values.is_none());
    }

    #[test]
    fn test_unterminated_load_is_an_error() {
        let err = parse_script("load --table Users\n[\n{\"_key\": \"a\"}\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unknown_positional_is_an_error() {
        let err = parse_script("status\nlogical_count Logs timestamp\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("logical_count"));
    }

    #[test]
    fn test_missing_named_value_is_an_error() {
        assert!(parse_script("table_create --name").is_err());
    }
}
