use crate::filter::{Condition, Filter};

/// Parse error for filter strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("filter parse error at offset {offset}: {message}")]
pub struct FilterParseError {
    pub offset: usize,
    pub message: String,
}

/// Parse a filter string into a [`Filter`] tree.
///
/// Grammar:
/// - `(attr=value)` is an equality clause
/// - `(&(clause)(clause)...)` is a conjunction; conjunctions may nest
/// - values are literal tokens, never quoted; `\XX` (two hex digits) encodes
///   a single byte, which is how `(`, `)` and `\` appear inside a value
///
/// Disjunction, negation and ordering comparisons are rejected.
pub fn parse_filter(input: &str) -> Result<Filter, FilterParseError> {
    let mut parser = Parser {
        input: input.as_bytes(),
        pos: 0,
    };
    let filter = parser.parse_node()?;
    if parser.pos != parser.input.len() {
        return Err(parser.error("trailing characters after filter"));
    }
    Ok(filter)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn parse_node(&mut self) -> Result<Filter, FilterParseError> {
        self.expect(b'(')?;
        let node = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                self.parse_and()?
            }
            Some(b'|') | Some(b'!') => {
                return Err(self.error("only equality and conjunction are supported"));
            }
            Some(_) => self.parse_condition()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(b')')?;
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Filter, FilterParseError> {
        let mut children = Vec::new();
        while self.peek() == Some(b'(') {
            children.push(self.parse_node()?);
        }
        if children.is_empty() {
            return Err(self.error("conjunction must contain at least one clause"));
        }
        Ok(Filter::And(children))
    }

    fn parse_condition(&mut self) -> Result<Filter, FilterParseError> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b'=') => break,
                Some(b'(') | Some(b')') | Some(b'&') => {
                    return Err(self.error("expected '=' in clause"));
                }
                Some(b'<') | Some(b'>') | Some(b'~') => {
                    return Err(self.error("only equality comparisons are supported"));
                }
                Some(_) => self.pos += 1,
                None => return Err(self.error("unterminated clause")),
            }
        }

        if self.pos == start {
            return Err(self.error("empty attribute name"));
        }
        let field = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("attribute name is not valid UTF-8"))?
            .to_string();

        self.expect(b'=')?;
        let literal = self.parse_value()?;
        Ok(Filter::Condition(Condition { field, literal }))
    }

    fn parse_value(&mut self) -> Result<String, FilterParseError> {
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => break,
                Some(b'(') => return Err(self.error("unescaped '(' in value")),
                Some(b'\\') => {
                    self.pos += 1;
                    let hi = self.hex_digit()?;
                    let lo = self.hex_digit()?;
                    bytes.push((hi << 4) | lo);
                }
                Some(b) => {
                    bytes.push(b);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated clause")),
            }
        }
        String::from_utf8(bytes).map_err(|_| self.error("value is not valid UTF-8"))
    }

    fn hex_digit(&mut self) -> Result<u8, FilterParseError> {
        let digit = match self.peek() {
            Some(b @ b'0'..=b'9') => b - b'0',
            Some(b @ b'a'..=b'f') => b - b'a' + 10,
            Some(b @ b'A'..=b'F') => b - b'A' + 10,
            _ => return Err(self.error("escape must be two hex digits")),
        };
        self.pos += 1;
        Ok(digit)
    }

    fn expect(&mut self, byte: u8) -> Result<(), FilterParseError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, message: &str) -> FilterParseError {
        FilterParseError {
            offset: self.pos,
            message: message.to_string(),
        }
    }
}
