//! Ending predicates. A small, pure expression language over meters and unlocks.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::meter::MeterVector;
use super::unlock::UnlockSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("unexpected end of condition '{0}'")]
    UnexpectedEnd(String),
    #[error("unexpected token '{token}' in condition '{input}'")]
    UnexpectedToken { token: String, input: String },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// Comparison operator used by meter conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    AtLeast,
    AtMost,
    Above,
    Below,
    Equal,
    NotEqual,
}

impl Comparison {
    pub fn holds(&self, left: i64, right: i64) -> bool {
        match self {
            Self::AtLeast => left >= right,
            Self::AtMost => left <= right,
            Self::Above => left > right,
            Self::Below => left < right,
            Self::Equal => left == right,
            Self::NotEqual => left != right,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::AtLeast => ">=",
            Self::AtMost => "<=",
            Self::Above => ">",
            Self::Below => "<",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

/// A predicate over the final `(MeterVector, UnlockSet)` of a session.
///
/// Conditions carry no executable code, so evaluation is always pure and
/// a definition containing them stays serialisable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Always,
    Never,
    Meter {
        channel: String,
        cmp: Comparison,
        value: i64,
    },
    Unlocked(String),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn evaluate(&self, meters: &MeterVector, unlocks: &UnlockSet) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Meter {
                channel,
                cmp,
                value,
            } => meters
                .get(channel)
                .is_some_and(|current| cmp.holds(current, *value)),
            Self::Unlocked(tag) => unlocks.has(tag),
            Self::All(parts) => parts.iter().all(|c| c.evaluate(meters, unlocks)),
            Self::Any(parts) => parts.iter().any(|c| c.evaluate(meters, unlocks)),
            Self::Not(inner) => !inner.evaluate(meters, unlocks),
        }
    }

    /// True only for the literal catch-all. `energy >= 0` is not treated as
    /// unconditional even though it always holds.
    pub fn is_unconditional(&self) -> bool {
        matches!(self, Self::Always)
    }

    /// Every meter channel this condition reads.
    pub fn channels(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |c| {
            if let Condition::Meter { channel, .. } = c {
                out.push(channel.as_str());
            }
        });
        out
    }

    /// Every unlock tag this condition tests.
    pub fn tags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |c| {
            if let Condition::Unlocked(tag) = c {
                out.push(tag.as_str());
            }
        });
        out
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        visit(self);
        match self {
            Self::All(parts) | Self::Any(parts) => {
                for part in parts {
                    part.walk(visit);
                }
            }
            Self::Not(inner) => inner.walk(visit),
            _ => {}
        }
    }

    /// Parse a condition from its text form.
    ///
    /// Syntax:
    /// - `always` / `true`, `never` / `false`
    /// - `energy >= 80` (also `<=`, `>`, `<`, `==`, `!=`)
    /// - `has(mentor)`; everything between the parentheses is the tag, so
    ///   `has(2fa)` and `has(and)` name tags too
    /// - `a and b`, `a or b`, `not a` (or `&&`, `||`, `!`), parentheses
    ///
    /// `and` binds tighter than `or`.
    pub fn parse(input: &str) -> Result<Condition, ConditionError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            input,
        };
        let condition = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(ConditionError::UnexpectedToken {
                token: token.to_string(),
                input: input.to_string(),
            });
        }
        Ok(condition)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
            Self::Meter {
                channel,
                cmp,
                value,
            } => write!(f, "{channel} {} {value}", cmp.symbol()),
            Self::Unlocked(tag) => write!(f, "has({tag})"),
            Self::All(parts) => write_joined(f, parts, " and "),
            Self::Any(parts) => write_joined(f, parts, " or "),
            Self::Not(inner) => write!(f, "not ({inner})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Condition], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{part}")?;
    }
    write!(f, ")")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Tag(String),
    Number(i64),
    Cmp(Comparison),
    And,
    Or,
    Not,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{w}"),
            Token::Tag(t) => write!(f, "{t}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Cmp(c) => write!(f, "{}", c.symbol()),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let two = |a: char, b: char| c == a && next == Some(b);

        if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else if two('>', '=') {
            tokens.push(Token::Cmp(Comparison::AtLeast));
            i += 2;
        } else if two('<', '=') {
            tokens.push(Token::Cmp(Comparison::AtMost));
            i += 2;
        } else if two('=', '=') {
            tokens.push(Token::Cmp(Comparison::Equal));
            i += 2;
        } else if two('!', '=') {
            tokens.push(Token::Cmp(Comparison::NotEqual));
            i += 2;
        } else if two('&', '&') {
            tokens.push(Token::And);
            i += 2;
        } else if two('|', '|') {
            tokens.push(Token::Or);
            i += 2;
        } else if c == '>' {
            tokens.push(Token::Cmp(Comparison::Above));
            i += 1;
        } else if c == '<' {
            tokens.push(Token::Cmp(Comparison::Below));
            i += 1;
        } else if c == '!' {
            tokens.push(Token::Not);
            i += 1;
        } else if c == '-' || c.is_ascii_digit() {
            let start = i;
            i += 1;
            while i < len && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<i64>()
                .map_err(|_| ConditionError::InvalidNumber(text.clone()))?;
            tokens.push(Token::Number(n));
        } else if is_word_char(c) {
            let start = i;
            while i < len && is_word_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let mut j = i;
            while j < len && chars[j].is_whitespace() {
                j += 1;
            }
            if word == "has" && chars.get(j) == Some(&'(') {
                let Some(close) = chars[j + 1..].iter().position(|&ch| ch == ')') else {
                    return Err(ConditionError::UnexpectedEnd(input.to_string()));
                };
                let tag: String = chars[j + 1..j + 1 + close].iter().collect();
                let tag = tag.trim();
                if tag.is_empty() {
                    return Err(ConditionError::UnexpectedToken {
                        token: ")".to_string(),
                        input: input.to_string(),
                    });
                }
                tokens.extend([
                    Token::Word(word),
                    Token::Open,
                    Token::Tag(tag.to_string()),
                    Token::Close,
                ]);
                i = j + close + 2;
                continue;
            }
            tokens.push(match word.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ => Token::Word(word),
            });
        } else {
            return Err(ConditionError::UnexpectedToken {
                token: c.to_string(),
                input: input.to_string(),
            });
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&'a Token, ConditionError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| ConditionError::UnexpectedEnd(self.input.to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, token: &Token) -> ConditionError {
        ConditionError::UnexpectedToken {
            token: token.to_string(),
            input: self.input.to_string(),
        }
    }

    fn expect(&mut self, wanted: &Token) -> Result<(), ConditionError> {
        let token = self.next()?;
        if token == wanted {
            Ok(())
        } else {
            Err(self.unexpected(token))
        }
    }

    fn parse_or(&mut self) -> Result<Condition, ConditionError> {
        let mut parts = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Condition::Any(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Condition, ConditionError> {
        let mut parts = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            parts.push(self.parse_unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Condition::All(parts)
        })
    }

    fn parse_unary(&mut self) -> Result<Condition, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Condition::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Condition, ConditionError> {
        let token = self.next()?;
        match token {
            Token::Open => {
                let inner = self.parse_or()?;
                self.expect(&Token::Close)?;
                Ok(inner)
            }
            Token::Word(word) => match word.as_str() {
                "always" | "true" => Ok(Condition::Always),
                "never" | "false" => Ok(Condition::Never),
                "has" if self.peek() == Some(&Token::Open) => {
                    self.pos += 1;
                    let tag = match self.next()? {
                        Token::Tag(tag) => tag.clone(),
                        other => return Err(self.unexpected(other)),
                    };
                    self.expect(&Token::Close)?;
                    Ok(Condition::Unlocked(tag))
                }
                _ => {
                    let cmp = match self.next()? {
                        Token::Cmp(cmp) => *cmp,
                        other => return Err(self.unexpected(other)),
                    };
                    let value = match self.next()? {
                        Token::Number(n) => *n,
                        other => return Err(self.unexpected(other)),
                    };
                    Ok(Condition::Meter {
                        channel: word.clone(),
                        cmp,
                        value,
                    })
                }
            },
            other => Err(self.unexpected(other)),
        }
    }
}
