/// Quote user text the way diagnostics print it: `"name"`, with JSON escapes.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{:?}", text))
}

/// Quote `value` as a data-language string literal. Only the escapes the
/// parser understands are used; every other character is written as is.
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::{quote, string_literal};

    #[test]
    fn quotes_and_escapes() {
        assert_eq!(quote("foo"), "\"foo\"");
        assert_eq!(quote("a\"b\n"), "\"a\\\"b\\n\"");
    }

    #[test]
    fn string_literals() {
        assert_eq!(string_literal(""), "\"\"");
        assert_eq!(string_literal("a\"b\\c\nd\te"), "\"a\\\"b\\\\c\\nd\\te\"");
        // JSON would escape these; the data language has no escape for them.
        assert_eq!(string_literal("\r\u{1}é"), "\"\r\u{1}é\"");
    }
}
