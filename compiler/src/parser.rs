use tracing::debug;

use crate::{
    ast::{Expr, KeywordArg, TypeRef},
    cursor::{optional, repeat, ParserState},
    source::{SourceInfo, SourceString, Status},
};

fn punc(state: &mut ParserState, c: char) -> bool {
    if state.is(c) {
        state.advance();
        true
    } else {
        false
    }
}

fn skip_space(state: &mut ParserState) {
    while state.is_space() {
        state.advance();
    }
}

fn identifier(state: &mut ParserState) -> Option<SourceString> {
    if !(state.is_letter() || state.is('_')) {
        return None;
    }
    let begin = state.position();
    state.advance();
    while state.is_letter() || state.is_digit() || state.is('_') {
        state.advance();
    }
    Some(state.slice(begin))
}

/// `item (',' item)* ','?`, possibly empty.
fn comma_separated<T, F>(state: &mut ParserState, mut item: F) -> Vec<T>
where
    F: FnMut(&mut ParserState) -> Option<T>,
{
    let mut items = Vec::new();
    optional(state, |state| {
        match item(state) {
            Some(first) => items.push(first),
            None => return false,
        }
        repeat(state, |state| {
            skip_space(state);
            if !punc(state, ',') {
                return false;
            }
            skip_space(state);
            match item(state) {
                Some(next) => {
                    items.push(next);
                    true
                }
                None => false,
            }
        });
        // Trailing comma
        optional(state, |state| {
            skip_space(state);
            punc(state, ',')
        });
        true
    });
    items
}

fn keyword_arg(state: &mut ParserState) -> Option<KeywordArg> {
    let name = identifier(state)?;
    skip_space(state);
    if !punc(state, ':') {
        return None;
    }
    skip_space(state);
    let value = expr(state)?;
    Some(KeywordArg { name, value })
}

fn boolean(state: &mut ParserState) -> Option<Expr> {
    let word = identifier(state)?;
    let value = match word.text.as_str() {
        "true" => true,
        "false" => false,
        _ => return None,
    };
    Some(Expr::Boolean { loc: word.loc, value })
}

fn string(state: &mut ParserState) -> Option<Expr> {
    let begin = state.position();
    if !punc(state, '"') {
        return None;
    }
    let mut value = String::new();
    while !state.is_end() && !state.is('"') {
        let mut c = state.peek()?;
        state.advance();
        if c == '\\' {
            let escaped = state.peek();
            state.advance();
            c = match escaped {
                Some('"') => '"',
                Some('\\') => '\\',
                Some('n') => '\n',
                Some('t') => '\t',
                _ => return None,
            };
        }
        value.push(c);
    }
    if !punc(state, '"') {
        return None;
    }
    Some(Expr::String { raw: state.slice(begin), value })
}

fn structure(state: &mut ParserState) -> Option<Expr> {
    let ty = identifier(state).map(|raw| TypeRef { raw });
    if ty.is_some() {
        skip_space(state);
    }
    let begin = state.position();
    if !punc(state, '{') {
        return None;
    }
    let loc = state.location(begin, state.position());
    skip_space(state);
    let args = comma_separated(state, keyword_arg);
    skip_space(state);
    if !punc(state, '}') {
        return None;
    }
    Some(Expr::Struct { ty, loc, args })
}

fn list(state: &mut ParserState) -> Option<Expr> {
    let begin = state.position();
    if !punc(state, '[') {
        return None;
    }
    let loc = state.location(begin, state.position());
    skip_space(state);
    let args = comma_separated(state, expr);
    skip_space(state);
    if !punc(state, ']') {
        return None;
    }
    Some(Expr::List { loc, args })
}

/// Run `p` one nesting level deeper.
fn nested<F>(state: &mut ParserState, p: F) -> Option<Expr>
where
    F: FnOnce(&mut ParserState) -> Option<Expr>,
{
    if !state.enter() {
        return None;
    }
    let result = p(state);
    state.leave();
    result
}

fn expr(state: &mut ParserState) -> Option<Expr> {
    let begin = state.position();
    if state.is_digit() {
        while state.is_digit() {
            state.advance();
        }
        Some(Expr::Integer { raw: state.slice(begin) })
    } else if state.is_letter() || state.is('_') {
        if let Some(keyword) = boolean(state) {
            return Some(keyword);
        }
        state.recover(begin);
        nested(state, structure)
    } else if state.is('{') {
        nested(state, structure)
    } else if state.is('"') {
        string(state)
    } else if state.is('[') {
        nested(state, list)
    } else {
        None
    }
}

/// Parse one data file into an expression tree.
///
/// On failure a single "unexpected character" error is reported at the
/// deepest position any alternative reached, and `None` is returned. Input
/// left over after the expression is a failure too. Lists and structs nested
/// more than [MAX_DEPTH](../cursor/constant.MAX_DEPTH.html) levels deep fail
/// with "nesting too deep" where the limit was hit.
pub fn parse_data(info: &SourceInfo, status: &mut Status) -> Option<Expr> {
    let input = info.data();
    let mut state = ParserState::new(info, input);
    skip_space(&mut state);
    let result = expr(&mut state);
    if result.is_some() {
        skip_space(&mut state);
    }
    match result {
        Some(e) if state.is_end() && state.position() == input.len() => {
            debug!(file = info.name(), bytes = input.len(), "parsed data file");
            Some(e)
        }
        _ => {
            match state.too_deep() {
                Some(loc) => status.error(loc, "nesting too deep"),
                None => {
                    let loc = state.deepest();
                    status.error(loc, "unexpected character");
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MAX_DEPTH;
    use crate::source::{Location, SourceSet};
    use pretty_assertions::assert_eq;

    fn parse(data: &str) -> (SourceSet, Option<Expr>, Vec<String>) {
        let mut sources = SourceSet::new();
        let id = sources.add("t", data);
        let (expr, errors) = {
            let mut status = Status::new(&sources);
            let expr = parse_data(sources.get(id), &mut status);
            let errors = status.diagnostics().iter().map(|d| d.rendered.clone()).collect();
            (expr, errors)
        };
        (sources, expr, errors)
    }

    fn loc(begin: usize, end: usize) -> Location {
        Location { file: crate::source::FileId(0), begin, end }
    }

    fn ss(begin: usize, end: usize, text: &str) -> SourceString {
        SourceString { loc: loc(begin, end), text: text.to_string() }
    }

    #[test]
    fn parse_integer() {
        let (_, expr, errors) = parse("123");
        assert!(errors.is_empty());
        assert_eq!(expr, Some(Expr::Integer { raw: ss(0, 3, "123") }));
    }

    const CONSTRUCTOR: &str = "A{\n  foo: [1, 2],\n  bar: B{baz: \"wot\\n\\\"m8t?\\\"\"}\n}";

    #[test]
    fn parse_constructor() {
        let (_, expr, errors) = parse(CONSTRUCTOR);
        assert!(errors.is_empty());
        let expected = Expr::Struct {
            ty:   Some(TypeRef { raw: ss(0, 1, "A") }),
            loc:  loc(1, 2),
            args: vec![
                KeywordArg {
                    name:  ss(5, 8, "foo"),
                    value: Expr::List {
                        loc:  loc(10, 11),
                        args: vec![
                            Expr::Integer { raw: ss(11, 12, "1") },
                            Expr::Integer { raw: ss(14, 15, "2") },
                        ],
                    },
                },
                KeywordArg {
                    name:  ss(20, 23, "bar"),
                    value: Expr::Struct {
                        ty:   Some(TypeRef { raw: ss(25, 26, "B") }),
                        loc:  loc(26, 27),
                        args: vec![KeywordArg {
                            name:  ss(27, 30, "baz"),
                            value: Expr::String {
                                raw:   ss(32, 47, "\"wot\\n\\\"m8t?\\\"\""),
                                value: "wot\n\"m8t?\"".to_string(),
                            },
                        }],
                    },
                },
            ],
        };
        assert_eq!(expr, Some(expected));
    }

    #[test]
    fn spans_reproduce_tokens() {
        let (sources, expr, _) = parse(CONSTRUCTOR);
        let data = sources.get(crate::source::FileId(0)).data();
        let joined: String = expr
            .unwrap()
            .spans()
            .iter()
            .map(|l| std::str::from_utf8(&data[l.begin..l.end]).unwrap())
            .collect();
        let tokens: String = CONSTRUCTOR
            .chars()
            .filter(|c| !c.is_whitespace() && !":,]}".contains(*c))
            .collect();
        assert_eq!(joined, tokens);
    }

    #[test]
    fn booleans_and_type_names() {
        let (_, expr, _) = parse(" true ");
        assert_eq!(expr, Some(Expr::Boolean { loc: loc(1, 5), value: true }));

        let (_, expr, _) = parse("false");
        assert_eq!(expr, Some(Expr::Boolean { loc: loc(0, 5), value: false }));

        // Type names may start with a keyword.
        let (_, expr, _) = parse("trueish {}");
        assert_eq!(
            expr,
            Some(Expr::Struct {
                ty:   Some(TypeRef { raw: ss(0, 7, "trueish") }),
                loc:  loc(8, 9),
                args: vec![],
            })
        );

        let (_, expr, _) = parse("foo{}");
        assert!(matches!(expr, Some(Expr::Struct { ty: Some(_), .. })));
    }

    #[test]
    fn trailing_commas() {
        let (_, expr, errors) = parse("{a: [1, 2,], b: _x{},}");
        assert!(errors.is_empty());
        let Some(Expr::Struct { ty: None, args, .. }) = expr else {
            panic!("expected an untyped struct");
        };
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].value.spans().len(), 3);
        assert_eq!(args[1].name.text, "b");

        let (_, expr, _) = parse("[ ]");
        assert_eq!(expr, Some(Expr::List { loc: loc(0, 1), args: vec![] }));
    }

    #[test]
    fn unexpected_character_at_deepest_position() {
        let (_, expr, errors) = parse("[1, 2 x]");
        assert_eq!(expr, None);
        assert_eq!(errors, vec!["t:1:7 - ERROR unexpected character\n[1, 2 x]\n      ^".to_string()]);
    }

    #[test]
    fn identifiers_are_ascii() {
        let (_, expr, errors) = parse("Poïnt{}");
        assert_eq!(expr, None);
        assert!(errors[0].starts_with("t:1:3 - ERROR unexpected character"), "{}", errors[0]);

        let (_, expr, errors) = parse("{s: \"ïn strings\"}");
        assert!(errors.is_empty());
        assert!(expr.is_some());
    }

    #[test]
    fn trailing_input_is_an_error() {
        let (_, expr, errors) = parse("1 2");
        assert_eq!(expr, None);
        assert_eq!(errors, vec!["t:1:3 - ERROR unexpected character\n1 2\n  ^".to_string()]);
    }

    #[test]
    fn unknown_escape_is_an_error() {
        let (_, expr, errors) = parse("\"a\\q\"");
        assert_eq!(expr, None);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("t:1:5 - ERROR"));
    }

    #[test]
    fn empty_input_is_an_error() {
        let (_, expr, errors) = parse("  ");
        assert_eq!(expr, None);
        assert!(errors[0].starts_with("t:1:3 - ERROR unexpected character"));
    }

    fn nested_lists(depth: usize) -> String {
        "[".repeat(depth) + &"]".repeat(depth)
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        let (_, expr, errors) = parse(&nested_lists(MAX_DEPTH));
        assert!(errors.is_empty());
        let mut depth = 0;
        let mut node = expr.as_ref();
        while let Some(Expr::List { args, .. }) = node {
            depth += 1;
            node = args.first();
        }
        assert_eq!(depth, MAX_DEPTH);

        let (_, expr, errors) = parse(&format!("{}{{a: 1}}{}", "[".repeat(MAX_DEPTH - 1), "]".repeat(MAX_DEPTH - 1)));
        assert!(expr.is_some(), "{:?}", errors);
    }

    #[test]
    fn nesting_past_the_limit_is_an_error() {
        let (_, expr, errors) = parse(&nested_lists(MAX_DEPTH + 1));
        assert_eq!(expr, None);
        assert_eq!(errors.len(), 1);
        let at = format!("t:1:{} - ERROR nesting too deep\n", MAX_DEPTH + 1);
        assert!(errors[0].starts_with(&at), "{}", errors[0]);

        let (_, expr, errors) = parse(&format!("{}{{a: {{}}}}{}", "[".repeat(MAX_DEPTH - 1), "]".repeat(MAX_DEPTH - 1)));
        assert_eq!(expr, None);
        assert!(errors[0].contains("nesting too deep"));

        // Far past the limit still fails cleanly.
        let (_, expr, errors) = parse(&nested_lists(200_000));
        assert_eq!(expr, None);
        assert!(errors[0].contains("nesting too deep"));
    }

    #[test]
    fn serializes_to_json() {
        let (_, expr, _) = parse("P{x: 1}");
        let json = serde_json::to_value(expr.unwrap()).unwrap();
        assert_eq!(json["kind"], "Struct");
        assert_eq!(json["type"]["raw"]["text"], "P");
        assert_eq!(json["args"][0]["value"]["raw"]["text"], "1");
    }
}
