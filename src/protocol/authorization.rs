//! The `Authorization: Dialback ...` header.
//!
//! Grammar (RFC 7235 auth-param list):
//!
//! ```text
//! credentials = "Dialback" 1*SP param *( OWS "," OWS param )
//! param       = token BWS "=" BWS ( token / quoted-string )
//! ```
//!
//! Quoted values may contain commas, spaces and backslash escapes.

use thiserror::Error;

use crate::models::Identity;

pub const SCHEME_PREFIX: &str = "Dialback ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Dialback authorization required")]
    WrongScheme,

    #[error("malformed authorization header: {0}")]
    Malformed(String),
}

/// Parsed `key="value"` pairs of a Dialback credential, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialbackCredentials {
    params: Vec<(String, String)>,
}

impl DialbackCredentials {
    /// Credentials for an outbound request made as `identity`.
    pub fn new(identity: &Identity, token: &str) -> Self {
        Self {
            params: vec![
                (identity.field().to_string(), identity.as_str().to_string()),
                ("token".to_string(), token.to_string()),
            ],
        }
    }

    /// First value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn token(&self) -> Option<&str> {
        self.get("token")
    }

    /// `host` wins over `webfinger` when both are claimed.
    pub fn identity(&self) -> Option<Identity> {
        self.get("host")
            .map(|h| Identity::Host(h.to_string()))
            .or_else(|| self.get("webfinger").map(|w| Identity::Webfinger(w.to_string())))
    }

    pub fn to_header_value(&self) -> String {
        let pairs: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape(v)))
            .collect();
        format!("{}{}", SCHEME_PREFIX, pairs.join(", "))
    }

    pub fn parse(header: &str) -> Result<Self, AuthorizationError> {
        let rest = header
            .strip_prefix(SCHEME_PREFIX)
            .ok_or(AuthorizationError::WrongScheme)?;
        let mut parser = Parser {
            chars: rest.chars().peekable(),
        };
        let mut params = Vec::new();

        parser.skip_ws();
        while parser.peek().is_some() {
            let key = parser.token();
            if key.is_empty() {
                return Err(AuthorizationError::Malformed("expected parameter name".into()));
            }
            parser.skip_ws();
            if !parser.eat('=') {
                return Err(AuthorizationError::Malformed(format!("expected '=' after {}", key)));
            }
            parser.skip_ws();
            let value = if parser.peek() == Some('"') {
                parser.quoted()?
            } else {
                parser.token()
            };
            params.push((key, value));

            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => {
                    parser.eat(',');
                    parser.skip_ws();
                }
                Some(c) => {
                    return Err(AuthorizationError::Malformed(format!(
                        "unexpected character '{}'",
                        c
                    )))
                }
            }
        }

        Ok(Self { params })
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~@:/".contains(c)
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl Parser<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.chars.next();
        }
    }

    fn token(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !is_tchar(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn quoted(&mut self) -> Result<String, AuthorizationError> {
        self.chars.next(); // opening quote
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('"') => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(AuthorizationError::Malformed("unterminated quoted string".into()))
    }
}
