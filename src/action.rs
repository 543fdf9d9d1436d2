//! Item actions embedded in diagram JSON.
//!
//! The converter attaches commands such as `showdiagram("Subsystem1")` to
//! items (in their `dblclick` data). They are parsed once, when the diagram
//! is loaded, into a [`UiAction`].

use std::fmt;

/// Argument of a textual command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Str(String),
    Int(u64),
}

/// How a diagram of a collection is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramRef {
    Name(String),
    Index(usize),
}

impl fmt::Display for DiagramRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagramRef::Name(name) => write!(f, "{name:?}"),
            DiagramRef::Index(idx) => write!(f, "#{idx}"),
        }
    }
}

/// Action triggered by interacting with a diagram item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    /// Make another diagram of the same collection current.
    ShowDiagram(DiagramRef),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid command: {0} (missing opening parenthesis)")]
    MissingOpenParen(String),
    #[error("Invalid command: {0} (missing closing parenthesis)")]
    MissingCloseParen(String),
    #[error("Invalid command: {0} (unterminated string)")]
    UnterminatedString(String),
    #[error("Invalid command: {command} (bad argument `{arg}`)")]
    InvalidArgument { command: String, arg: String },
    #[error("Invalid command: {0} (unexpected text after closing parenthesis)")]
    TrailingInput(String),
    #[error("Invalid command: unknown action `{0}`")]
    UnknownCommand(String),
    #[error("Invalid command: {command} (expected {expected} argument(s), got {found})")]
    Arity {
        command: String,
        expected: usize,
        found: usize,
    },
}

impl std::str::FromStr for UiAction {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_action(s)
    }
}

/// Parse a command of the form `name(arg1,arg2,...)` into a typed action.
pub fn parse_action(text: &str) -> Result<UiAction, ActionError> {
    let (name, args) = parse_command(text)?;
    match name.as_str() {
        "showdiagram" => {
            let [arg] = <[Arg; 1]>::try_from(args).map_err(|args| ActionError::Arity {
                command: text.to_string(),
                expected: 1,
                found: args.len(),
            })?;
            let target = match arg {
                Arg::Str(name) => DiagramRef::Name(name),
                Arg::Int(idx) => {
                    let idx = usize::try_from(idx).map_err(|_| ActionError::InvalidArgument {
                        command: text.to_string(),
                        arg: idx.to_string(),
                    })?;
                    DiagramRef::Index(idx)
                }
            };
            Ok(UiAction::ShowDiagram(target))
        }
        _ => Err(ActionError::UnknownCommand(name)),
    }
}

/// Split a command into its name and typed arguments.
///
/// String arguments are quoted with `"` or `'` and may contain separators or
/// parentheses; a backslash escapes the next character. Numeric arguments
/// are bare decimal digits.
pub fn parse_command(text: &str) -> Result<(String, Vec<Arg>), ActionError> {
    let raw = text.trim();
    let (name, rest) = raw
        .split_once('(')
        .ok_or_else(|| ActionError::MissingOpenParen(raw.to_string()))?;
    let name = name.trim().to_string();

    let mut args = Vec::new();
    let mut chars = rest.chars().peekable();
    let mut closed = false;

    // An argument is expected right after `(` or `,`.
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&ch) = chars.peek() else { break };

        if ch == ')' && args.is_empty() {
            chars.next();
            closed = true;
            break;
        }

        if ch == '"' || ch == '\'' {
            chars.next();
            let mut value = String::new();
            let mut terminated = false;
            let mut escaped = false;
            for c in chars.by_ref() {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == ch {
                    terminated = true;
                    break;
                } else {
                    value.push(c);
                }
            }
            if !terminated {
                return Err(ActionError::UnterminatedString(raw.to_string()));
            }
            args.push(Arg::Str(value));
        } else {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' || c == ')' || c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
            let value = match token.parse::<u64>() {
                Ok(v) if token.bytes().all(|b| b.is_ascii_digit()) => v,
                _ => {
                    return Err(ActionError::InvalidArgument {
                        command: raw.to_string(),
                        arg: token,
                    });
                }
            };
            args.push(Arg::Int(value));
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') => continue,
            Some(')') => {
                closed = true;
                break;
            }
            Some(other) => {
                let mut arg = String::from(other);
                arg.extend(chars.by_ref().take_while(|c| *c != ',' && *c != ')'));
                return Err(ActionError::InvalidArgument {
                    command: raw.to_string(),
                    arg,
                });
            }
            None => break,
        }
    }

    if !closed {
        return Err(ActionError::MissingCloseParen(raw.to_string()));
    }
    if chars.any(|c| !c.is_whitespace()) {
        return Err(ActionError::TrailingInput(raw.to_string()));
    }
    Ok((name, args))
}
