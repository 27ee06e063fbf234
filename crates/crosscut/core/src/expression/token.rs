// Crosscut
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Tokenizer for the pointcut expression language.
//!
//! Pattern text inside a primitive's parentheses is not tokenized here; a
//! balanced-paren group directly following an identifier is captured raw
//! as [`Token::Group`] and handed to the pattern compilers by the parser.

use crate::expression::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    /// Raw body of a `primitive( ... )` group, outer parens stripped.
    Group(String),
    AndAnd,
    OrOr,
    Not,
    LeftParen,
    RightParen,
    Eof,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(ExpressionError::UnexpectedCharacter('&'));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    return Err(ExpressionError::UnexpectedCharacter('|'));
                }
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LeftParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RightParen);
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut identifier = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        identifier.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match identifier.as_str() {
                    "AND" => tokens.push(Token::AndAnd),
                    "OR" => tokens.push(Token::OrOr),
                    "NOT" => tokens.push(Token::Not),
                    _ => {
                        tokens.push(Token::Identifier(identifier));
                        while chars.peek() == Some(&' ') {
                            chars.next();
                        }
                        if chars.peek() == Some(&'(') {
                            chars.next();
                            tokens.push(Token::Group(capture_group(&mut chars)?));
                        }
                    }
                }
            }
            c => return Err(ExpressionError::UnexpectedCharacter(c)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

/// Consume a balanced-paren body; the opening paren is already consumed.
fn capture_group(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, ExpressionError> {
    let mut body = String::new();
    let mut depth = 1usize;
    for ch in chars.by_ref() {
        match ch {
            '(' => {
                depth += 1;
                body.push(ch);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(body);
                }
                body.push(ch);
            }
            _ => body.push(ch),
        }
    }
    Err(ExpressionError::UnbalancedParens)
}
