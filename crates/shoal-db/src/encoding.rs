//! Index key encoding.
//!
//! Layout: `{field}\x00{type_tag}{value_bytes}\x00{object_key}` → object key
//!
//! - Sorted by field, then typed value, then object key
//! - Scanning `{field}\x00{type_tag}{value_bytes}\x00` yields every object with that value
//! - Field names never contain `\x00`; numbers and booleans are fixed width
//! - String bytes escape `\x00` as `\x00\xFF` and end with `\x00\x01`, so no
//!   encoded string is a prefix of another and keys stay injective

use shoal_query::{Number, TypedValue};

const SEP: u8 = 0x00;

const TAG_BOOLEAN: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_STRING: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;

const ESCAPED_NUL: [u8; 2] = [0x00, 0xFF];
const STRING_END: [u8; 2] = [0x00, 0x01];

/// Encode a typed value into bytes that sort like the value itself within
/// its tag. Untyped literals never reach an index and encode to nothing.
pub fn encode_value(value: &TypedValue) -> Vec<u8> {
    match value {
        TypedValue::Boolean(b) => vec![TAG_BOOLEAN, *b as u8],
        TypedValue::Number(Number::Int(i)) => {
            let mut out = Vec::with_capacity(9);
            out.push(TAG_INT);
            out.extend_from_slice(&((*i as u64) ^ (1u64 << 63)).to_be_bytes());
            out
        }
        TypedValue::Number(Number::Float(n)) => {
            let bits = n.to_bits();
            // IEEE 754: flip all bits if negative, else flip sign bit only
            let sortable = if bits & (1u64 << 63) != 0 {
                !bits
            } else {
                bits ^ (1u64 << 63)
            };
            let mut out = Vec::with_capacity(9);
            out.push(TAG_FLOAT);
            out.extend_from_slice(&sortable.to_be_bytes());
            out
        }
        TypedValue::String(s) => {
            let mut out = Vec::with_capacity(1 + s.len() + STRING_END.len());
            out.push(TAG_STRING);
            for &byte in s.as_bytes() {
                if byte == SEP {
                    out.extend_from_slice(&ESCAPED_NUL);
                } else {
                    out.push(byte);
                }
            }
            out.extend_from_slice(&STRING_END);
            out
        }
        TypedValue::Untyped(_) => Vec::new(),
    }
}

/// Prefix covering every entry of `field` with exactly `value`.
pub fn index_scan_prefix(field: &str, value: &TypedValue) -> Vec<u8> {
    let value_bytes = encode_value(value);
    let mut key = Vec::with_capacity(field.len() + 1 + value_bytes.len() + 1);
    key.extend_from_slice(field.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&value_bytes);
    key.push(SEP);
    key
}

/// Full index key for one object.
pub fn index_key(field: &str, value: &TypedValue, object_key: &str) -> Vec<u8> {
    let mut key = index_scan_prefix(field, value);
    key.extend_from_slice(object_key.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> TypedValue {
        TypedValue::Number(Number::Int(i))
    }

    fn string(s: &str) -> TypedValue {
        TypedValue::String(s.into())
    }

    #[test]
    fn key_starts_with_its_scan_prefix() {
        let value = string("bar");
        let key = index_key("name", &value, "k1");
        assert!(key.starts_with(&index_scan_prefix("name", &value)));
    }

    #[test]
    fn integers_sort_numerically() {
        let a = encode_value(&int(i64::MIN));
        let b = encode_value(&int(-5));
        let c = encode_value(&int(0));
        let d = encode_value(&int(42));
        let e = encode_value(&int(i64::MAX));
        assert!(a < b && b < c && c < d && d < e);
    }

    #[test]
    fn floats_sort_numerically() {
        let a = encode_value(&TypedValue::Number(Number::Float(-2.5)));
        let b = encode_value(&TypedValue::Number(Number::Float(-0.5)));
        let c = encode_value(&TypedValue::Number(Number::Float(0.5)));
        let d = encode_value(&TypedValue::Number(Number::Float(1e19)));
        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn large_integers_encode_distinctly() {
        assert_ne!(
            encode_value(&int(9_007_199_254_740_992)),
            encode_value(&int(9_007_199_254_740_993))
        );
    }

    #[test]
    fn different_values_have_disjoint_prefixes() {
        let t = index_scan_prefix("flag", &TypedValue::Boolean(true));
        let f = index_key("flag", &TypedValue::Boolean(false), "k1");
        assert!(!f.starts_with(&t));
    }

    #[test]
    fn nul_in_value_or_key_does_not_collide() {
        assert_ne!(
            index_key("name", &string("a"), "b\0k"),
            index_key("name", &string("a\0b"), "k")
        );
        assert_ne!(
            index_key("name", &string("a"), "\0k"),
            index_key("name", &string("a\0"), "k")
        );
    }

    #[test]
    fn string_prefix_scan_is_exact() {
        let prefix = index_scan_prefix("name", &string("a"));
        assert!(!index_key("name", &string("a\0b"), "k").starts_with(&prefix));
        assert!(!index_key("name", &string("ab"), "k").starts_with(&prefix));
        assert!(index_key("name", &string("a"), "\0k").starts_with(&prefix));
    }

    #[test]
    fn strings_sort_lexicographically() {
        let a = encode_value(&string("a"));
        let b = encode_value(&string("a\0"));
        let c = encode_value(&string("ab"));
        assert!(a < b && b < c);
    }
}
