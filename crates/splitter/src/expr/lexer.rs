//! Tokenizer for filter expressions.

use engine_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    True,
    False,
    Nil,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    In,
    Contains,
    Matches,
    StartsWith,
    EndsWith,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let two = |expected: char| next == Some(expected);
        let (token, width) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            ',' => (Token::Comma, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '=' if two('=') => (Token::Eq, 2),
            '!' if two('=') => (Token::Ne, 2),
            '!' => (Token::Not, 1),
            '<' if two('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if two('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '&' if two('&') => (Token::And, 2),
            '|' if two('|') => (Token::Or, 2),
            '"' | '\'' => {
                let (value, end) = read_string(&chars, i)?;
                tokens.push(Token::Str(value));
                i = end;
                continue;
            }
            c if c.is_ascii_digit() => {
                let (token, end) = read_number(&chars, i)?;
                tokens.push(token);
                i = end;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(keyword(word));
                continue;
            }
            other => {
                return Err(Error::expression(format!(
                    "unexpected character '{}' at position {}",
                    other, i
                )))
            }
        };
        tokens.push(token);
        i += width;
    }
    Ok(tokens)
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        "nil" => Token::Nil,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "contains" => Token::Contains,
        "matches" => Token::Matches,
        "startsWith" => Token::StartsWith,
        "endsWith" => Token::EndsWith,
        _ => Token::Ident(word),
    }
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((value, i + 1)),
            '\\' => {
                let escaped = chars.get(i + 1).ok_or_else(|| {
                    Error::expression("unterminated escape sequence in string literal")
                })?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c => {
                value.push(c);
                i += 1;
            }
        }
    }
    Err(Error::expression(format!(
        "unterminated string literal starting at position {}",
        start
    )))
}

fn read_number(chars: &[char], start: usize) -> Result<(Token, usize)> {
    let mut i = start;
    let mut is_float = false;
    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_digit() || c == '_' => i += 1,
            '.' if !is_float && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                is_float = true;
                i += 1;
            }
            _ => break,
        }
    }
    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let token = if is_float {
        text.parse()
            .map(Token::Float)
            .map_err(|e| Error::expression(format!("invalid number {}: {}", text, e)))?
    } else {
        text.parse()
            .map(Token::Int)
            .map_err(|e| Error::expression(format!("invalid number {}: {}", text, e)))?
    };
    Ok((token, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        let tokens = tokenize(r#"ip_address == "1.2.3.4" && not (n >= 10.5)"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("ip_address".into()),
                Token::Eq,
                Token::Str("1.2.3.4".into()),
                Token::And,
                Token::Not,
                Token::LParen,
                Token::Ident("n".into()),
                Token::Ge,
                Token::Float(10.5),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#"'it\'s' "a\"b""#).unwrap();
        assert_eq!(tokens, vec![Token::Str("it's".into()), Token::Str("a\"b".into())]);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize(r#""open"#).is_err());
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("a # b").is_err());
    }
}
