use serde::Serialize;

use crate::source::{Location, SourceString};

/// The untyped expression tree of a data file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Expr {
    Integer {
        raw: SourceString,
    },
    String {
        raw:   SourceString,
        /// The literal with escapes resolved.
        value: String,
    },
    Boolean {
        loc:   Location,
        value: bool,
    },
    Struct {
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        ty:   Option<TypeRef>,
        /// Location of the opening brace.
        loc:  Location,
        args: Vec<KeywordArg>,
    },
    List {
        /// Location of the opening bracket.
        loc:  Location,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordArg {
    pub name:  SourceString,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeRef {
    pub raw: SourceString,
}

impl Expr {
    /// Every token location in the tree, in source order.
    pub fn spans(&self) -> Vec<Location> {
        let mut spans = Vec::new();
        self.collect_spans(&mut spans);
        spans
    }

    fn collect_spans(&self, spans: &mut Vec<Location>) {
        match self {
            Expr::Integer { raw } | Expr::String { raw, .. } => spans.push(raw.loc),
            Expr::Boolean { loc, .. } => spans.push(*loc),
            Expr::Struct { ty, loc, args } => {
                if let Some(ty) = ty {
                    spans.push(ty.raw.loc);
                }
                spans.push(*loc);
                for arg in args {
                    spans.push(arg.name.loc);
                    arg.value.collect_spans(spans);
                }
            }
            Expr::List { loc, args } => {
                spans.push(*loc);
                for arg in args {
                    arg.collect_spans(spans);
                }
            }
        }
    }
}
