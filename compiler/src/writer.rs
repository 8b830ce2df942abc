use crate::{ast::Expr, utils::string_literal};

const INDENT: &str = "  ";

/// Render an expression tree back into data-language text.
///
/// Small values stay on one line: scalars, structs with fewer than six
/// arguments that are all one-liners, and lists of at most one one-liner.
/// Anything bigger is written one argument per line, with trailing commas.
/// Parsing the output gives back the same tree, locations aside.
pub fn write_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write(expr, 0, &mut out);
    out
}

fn fits_on_one_line(expr: &Expr) -> bool {
    match expr {
        Expr::Integer { .. } | Expr::String { .. } | Expr::Boolean { .. } => true,
        Expr::Struct { args, .. } => args.len() < 6 && args.iter().all(|arg| fits_on_one_line(&arg.value)),
        Expr::List { args, .. } => args.len() <= 1 && args.iter().all(fits_on_one_line),
    }
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

fn write(expr: &Expr, level: usize, out: &mut String) {
    match expr {
        Expr::Integer { raw } => out.push_str(&raw.text),
        Expr::String { value, .. } => out.push_str(&string_literal(value)),
        Expr::Boolean { value, .. } => out.push_str(if *value { "true" } else { "false" }),
        Expr::List { args, .. } => {
            out.push('[');
            if fits_on_one_line(expr) {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write(arg, level, out);
                }
            } else {
                out.push('\n');
                for arg in args {
                    indent(level + 1, out);
                    write(arg, level + 1, out);
                    out.push_str(",\n");
                }
                indent(level, out);
            }
            out.push(']');
        }
        Expr::Struct { ty, args, .. } => {
            if let Some(ty) = ty {
                out.push_str(&ty.raw.text);
            }
            out.push('{');
            if fits_on_one_line(expr) {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&arg.name.text);
                    out.push_str(": ");
                    write(&arg.value, level, out);
                }
            } else {
                out.push('\n');
                for arg in args {
                    indent(level + 1, out);
                    out.push_str(&arg.name.text);
                    out.push_str(": ");
                    write(&arg.value, level + 1, out);
                    out.push_str(",\n");
                }
                indent(level, out);
            }
            out.push('}');
        }
    }
}
