//! Quote-aware splitting of command text.
//!
//! Whitespace separates tokens except inside double quotes. The quotes
//! themselves are dropped from the token text. An unterminated quote runs to
//! the end of the input.

/// A token together with the byte range it covered in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

pub fn tokenize_spans(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start: Option<usize> = None;
    let mut in_quotes = false;

    for (idx, ch) in input.char_indices() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                start.get_or_insert(idx);
            }
            c if c.is_whitespace() && !in_quotes => {
                if let Some(begin) = start.take() {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        start: begin,
                        end: idx,
                    });
                }
            }
            c => {
                current.push(c);
                start.get_or_insert(idx);
            }
        }
    }

    if let Some(begin) = start {
        tokens.push(Token {
            text: current,
            start: begin,
            end: input.len(),
        });
    }

    tokens
}

/// Splits `input` into quote-aware tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    tokenize_spans(input).into_iter().map(|t| t.text).collect()
}

/// A command line after the prefix has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    /// Raw text after the command name, trimmed.
    pub remainder: String,
    /// `remainder` split into quote-aware tokens.
    pub args: Vec<String>,
}

/// Parses the text following a prefix into a command name and its arguments.
///
/// Returns `None` when there is no command name at all.
pub fn parse_command(body: &str) -> Option<ParsedCommand> {
    let body = body.trim();
    let first = tokenize_spans(body).into_iter().next()?;
    let remainder = body[first.end..].trim().to_string();
    let args = tokenize(&remainder);
    Some(ParsedCommand {
        name: first.text,
        remainder,
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(tokenize("play  some   song"), vec!["play", "some", "song"]);
    }

    #[test]
    fn test_tokenize_quoted() {
        assert_eq!(
            tokenize(r#"note "foo bar" 42"#),
            vec!["note", "foo bar", "42"]
        );
    }

    #[test]
    fn test_tokenize_quote_inside_word() {
        assert_eq!(tokenize(r#"a"b c"d e"#), vec!["ab cd", "e"]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        assert_eq!(tokenize(r#"say "hello there"#), vec!["say", "hello there"]);
    }

    #[test]
    fn test_tokenize_empty_quotes() {
        assert_eq!(tokenize(r#"set "" x"#), vec!["set", "", "x"]);
    }

    #[test]
    fn test_parse_command_with_quoted_argument() {
        let parsed = parse_command(r#"note "foo bar" 42"#).unwrap();
        assert_eq!(parsed.name, "note");
        assert_eq!(parsed.remainder, r#""foo bar" 42"#);
        assert_eq!(parsed.args, vec!["foo bar", "42"]);
    }

    #[test]
    fn test_parse_command_without_arguments() {
        let parsed = parse_command("  help  ").unwrap();
        assert_eq!(parsed.name, "help");
        assert_eq!(parsed.remainder, "");
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_parse_command_empty() {
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_parse_command_unicode() {
        let parsed = parse_command("répète «ça» \"é è\"").unwrap();
        assert_eq!(parsed.name, "répète");
        assert_eq!(parsed.args, vec!["«ça»", "é è"]);
    }
}
