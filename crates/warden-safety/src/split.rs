//! Quote-aware splitting of argument strings.

use crate::error::{SafetyError, SafetyResult};

/// Split a command-line style string into arguments.
///
/// Whitespace separates arguments. Single quotes preserve their contents
/// literally; double quotes allow `\"` and `\\` escapes; a backslash outside
/// quotes escapes the next character.
///
/// # Errors
///
/// Returns an error for an unterminated quote or a trailing backslash.
pub fn split_args(input: &str) -> SafetyResult<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            },
            '\'' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(SafetyError::UnterminatedQuote { quote: '\'' }),
                    }
                }
            },
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(esc @ ('"' | '\\')) => current.push(esc),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            },
                            None => return Err(SafetyError::UnterminatedQuote { quote: '"' }),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(SafetyError::UnterminatedQuote { quote: '"' }),
                    }
                }
            },
            '\\' => {
                in_arg = true;
                current.push(chars.next().ok_or(SafetyError::TrailingEscape)?);
            },
            other => {
                in_arg = true;
                current.push(other);
            },
        }
    }

    if in_arg {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words() {
        assert_eq!(
            split_args("  --flush-session   --random-agent ").unwrap(),
            vec!["--flush-session", "--random-agent"]
        );
    }

    #[test]
    fn test_quotes_and_escapes() {
        assert_eq!(
            split_args(r#"--data "a=1&b=\"two\"" --cookie 'id=5; x' a\ b"#).unwrap(),
            vec!["--data", r#"a=1&b="two""#, "--cookie", "id=5; x", "a b"]
        );
    }

    #[test]
    fn test_empty_quotes_produce_empty_arg() {
        assert_eq!(split_args("-p ''").unwrap(), vec!["-p", ""]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            split_args("--data 'oops"),
            Err(SafetyError::UnterminatedQuote { quote: '\'' })
        );
        assert_eq!(split_args("x\\"), Err(SafetyError::TrailingEscape));
    }
}
