use std::fmt;

use serde::{Deserialize, Serialize};

/// One `(field=literal)` clause.
///
/// The literal is kept exactly as written. Whether it is compared as a string,
/// a number or a boolean is decided later, against the bucket schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Condition(Condition),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, literal: impl Into<String>) -> Self {
        Filter::Condition(Condition {
            field: field.into(),
            literal: literal.into(),
        })
    }

    pub fn and(children: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(children.into_iter().collect())
    }

    /// Leaf conditions in left-to-right order, with nested conjunctions flattened.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        collect_conditions(self, &mut out);
        out
    }
}

fn collect_conditions<'a>(node: &'a Filter, out: &mut Vec<&'a Condition>) {
    match node {
        Filter::Condition(c) => out.push(c),
        Filter::And(children) => {
            for child in children {
                collect_conditions(child, out);
            }
        }
    }
}

/// Renders the filter back into the string grammar, escaping bytes that would
/// otherwise end the value early.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Condition(c) => {
                write!(f, "({}=", c.field)?;
                for ch in c.literal.chars() {
                    match ch {
                        '(' | ')' | '\\' | '\0' => write!(f, "\\{:02x}", ch as u32)?,
                        _ => write!(f, "{ch}")?,
                    }
                }
                write!(f, ")")
            }
            Filter::And(children) => {
                write!(f, "(&")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_flatten_nested_and() {
        let filter = Filter::and([
            Filter::eq("a", "1"),
            Filter::and([Filter::eq("b", "2"), Filter::eq("c", "3")]),
        ]);
        let fields: Vec<_> = filter.conditions().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn display_escapes_parens() {
        let filter = Filter::and([Filter::eq("name", "a(b)"), Filter::eq("flag", "true")]);
        assert_eq!(filter.to_string(), "(&(name=a\\28b\\29)(flag=true))");
    }
}
