mod filter;
mod parse_filter;
mod value;

pub use filter::{Condition, Filter};
pub use parse_filter::{FilterParseError, parse_filter};
pub use value::{CoercionError, FieldType, Number, TypedValue};
