//! Surface syntax parser
//!
//! nom combinators over `&str`. Whitespace and `//`/`--` line comments are
//! skipped before every token. Precedence, tightest first: `~ ^ *` (prefix),
//! `.`, `->`, `&`, `+`/`-` for expressions; `not`, `and`, `or`, `implies`
//! (right associative), `iff` for formulas. Quantifier bodies extend as far
//! right as possible.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{digit1, multispace1, satisfy},
    combinator::{map as nommap, map_res, opt, recognize, value, verify},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::error::{Result, SigrunError};
use crate::model::{
    FactDecl, FieldDecl, FieldMult, Model, PredDecl, RunDecl, SigDecl, SurfaceBinaryOp,
    SurfaceConnective, SurfaceExpr, SurfaceFormula, SurfaceQuant, SurfaceUnaryOp,
};

type In<'a> = &'a str;
type IResult<'a, O> = nom::IResult<In<'a>, O>;

const RESERVED: &[&str] = &[
    "sig", "abstract", "extends", "fact", "pred", "run", "for", "set", "one", "lone", "some",
    "no", "all", "in", "not", "and", "or", "implies", "iff", "univ", "iden", "none",
];

fn comment(s: In) -> IResult<()> {
    value(
        (),
        pair(alt((tag("//"), tag("--"))), take_while(|c| c != '\n')),
    )(s)
}

fn skip(s: In) -> IResult<()> {
    value((), many0(alt((value((), multispace1), comment))))(s)
}

/// Skips whitespace and comments, then runs `inner`
fn wsl<'a, F, O>(inner: F) -> impl FnMut(In<'a>) -> IResult<'a, O>
where
    F: FnMut(In<'a>) -> IResult<'a, O> + 'a,
{
    preceded(skip, inner)
}

fn ident_raw(s: In) -> IResult<In> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))(s)
}

fn ident(s: In) -> IResult<String> {
    nommap(
        wsl(verify(ident_raw, |w: &str| !RESERVED.contains(&w))),
        String::from,
    )(s)
}

/// Matches `kw` as a whole word, not as a prefix of a longer identifier
fn keyword<'a>(kw: &'static str) -> impl FnMut(In<'a>) -> IResult<'a, In<'a>> {
    wsl(verify(ident_raw, move |w: &str| w == kw))
}

fn number(s: In) -> IResult<usize> {
    map_res(wsl(digit1), |d: &str| d.parse())(s)
}

fn sym<'a>(t: &'static str) -> impl FnMut(In<'a>) -> IResult<'a, In<'a>> {
    wsl(tag(t))
}

// ---------------------------------------------------------------- expressions

fn expr_primary(s: In) -> IResult<SurfaceExpr> {
    alt((
        delimited(sym("("), expr, sym(")")),
        value(SurfaceExpr::Univ, keyword("univ")),
        value(SurfaceExpr::Iden, keyword("iden")),
        value(SurfaceExpr::None, keyword("none")),
        nommap(ident, SurfaceExpr::Name),
    ))(s)
}

fn expr_unary(s: In) -> IResult<SurfaceExpr> {
    let op = alt((
        value(SurfaceUnaryOp::Transpose, sym("~")),
        value(SurfaceUnaryOp::Closure, sym("^")),
        value(SurfaceUnaryOp::ReflexiveClosure, sym("*")),
    ));
    alt((
        nommap(pair(op, expr_unary), |(op, expr)| SurfaceExpr::Unary {
            op,
            expr: Box::new(expr),
        }),
        expr_primary,
    ))(s)
}

fn binary_chain(
    first: SurfaceExpr,
    rest: Vec<(SurfaceBinaryOp, SurfaceExpr)>,
) -> SurfaceExpr {
    rest.into_iter().fold(first, |left, (op, right)| {
        SurfaceExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    })
}

fn expr_join(s: In) -> IResult<SurfaceExpr> {
    let op = value(SurfaceBinaryOp::Join, sym("."));
    nommap(
        pair(expr_unary, many0(pair(op, expr_unary))),
        |(first, rest)| binary_chain(first, rest),
    )(s)
}

fn expr_product(s: In) -> IResult<SurfaceExpr> {
    let op = value(SurfaceBinaryOp::Product, sym("->"));
    nommap(
        pair(expr_join, many0(pair(op, expr_join))),
        |(first, rest)| binary_chain(first, rest),
    )(s)
}

fn expr_intersect(s: In) -> IResult<SurfaceExpr> {
    let op = value(SurfaceBinaryOp::Intersection, sym("&"));
    nommap(
        pair(expr_product, many0(pair(op, expr_product))),
        |(first, rest)| binary_chain(first, rest),
    )(s)
}

fn expr(s: In) -> IResult<SurfaceExpr> {
    // `->` must be tried before `-` would be
    let op = alt((
        value(SurfaceBinaryOp::Union, sym("+")),
        value(SurfaceBinaryOp::Difference, terminated(sym("-"), not_arrow)),
    ));
    nommap(
        pair(expr_intersect, many0(pair(op, expr_intersect))),
        |(first, rest)| binary_chain(first, rest),
    )(s)
}

fn not_arrow(s: In) -> IResult<()> {
    if s.starts_with('>') {
        Err(nom::Err::Error(nom::error::Error::new(
            s,
            nom::error::ErrorKind::Tag,
        )))
    } else {
        Ok((s, ()))
    }
}

// ------------------------------------------------------------------ formulas

fn quant_keyword(s: In) -> IResult<SurfaceQuant> {
    alt((
        value(SurfaceQuant::All, keyword("all")),
        value(SurfaceQuant::Some, keyword("some")),
        value(SurfaceQuant::No, keyword("no")),
        value(SurfaceQuant::One, keyword("one")),
        value(SurfaceQuant::Lone, keyword("lone")),
    ))(s)
}

fn formula_quantified(s: In) -> IResult<SurfaceFormula> {
    nommap(
        tuple((
            quant_keyword,
            separated_list1(sym(","), ident),
            sym(":"),
            expr,
            sym("|"),
            formula,
        )),
        |(quant, vars, _, domain, _, body)| SurfaceFormula::Quantified {
            quant,
            vars,
            domain,
            body: Box::new(body),
        },
    )(s)
}

fn formula_pred_call(s: In) -> IResult<SurfaceFormula> {
    nommap(
        pair(
            ident,
            delimited(sym("["), separated_list0(sym(","), expr), sym("]")),
        ),
        |(name, args)| SurfaceFormula::PredCall { name, args },
    )(s)
}

fn formula_compare(s: In) -> IResult<SurfaceFormula> {
    // a lone `=` only; `=>` belongs to implication
    let op = alt((
        value(true, keyword("in")),
        value(false, terminated(sym("="), not_arrow)),
    ));
    nommap(tuple((expr, op, expr)), |(left, subset, right)| {
        SurfaceFormula::Compare {
            left,
            subset,
            right,
        }
    })(s)
}

fn formula_mult(s: In) -> IResult<SurfaceFormula> {
    let mult = alt((
        value(SurfaceQuant::Some, keyword("some")),
        value(SurfaceQuant::No, keyword("no")),
        value(SurfaceQuant::One, keyword("one")),
        value(SurfaceQuant::Lone, keyword("lone")),
    ));
    nommap(pair(mult, expr), |(mult, expr)| SurfaceFormula::Mult {
        mult,
        expr,
    })(s)
}

fn formula_atomic(s: In) -> IResult<SurfaceFormula> {
    alt((
        formula_quantified,
        formula_pred_call,
        delimited(sym("("), formula, sym(")")),
        formula_compare,
        formula_mult,
    ))(s)
}

fn formula_unary(s: In) -> IResult<SurfaceFormula> {
    alt((
        nommap(
            preceded(alt((keyword("not"), sym("!"))), formula_unary),
            |f| SurfaceFormula::Not(Box::new(f)),
        ),
        formula_atomic,
    ))(s)
}

fn connective_chain(
    first: SurfaceFormula,
    rest: Vec<(SurfaceConnective, SurfaceFormula)>,
) -> SurfaceFormula {
    rest.into_iter().fold(first, |left, (op, right)| {
        SurfaceFormula::Connective {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    })
}

fn formula_and(s: In) -> IResult<SurfaceFormula> {
    let op = value(SurfaceConnective::And, alt((keyword("and"), sym("&&"))));
    nommap(
        pair(formula_unary, many0(pair(op, formula_unary))),
        |(first, rest)| connective_chain(first, rest),
    )(s)
}

fn formula_or(s: In) -> IResult<SurfaceFormula> {
    let op = value(SurfaceConnective::Or, alt((keyword("or"), sym("||"))));
    nommap(
        pair(formula_and, many0(pair(op, formula_and))),
        |(first, rest)| connective_chain(first, rest),
    )(s)
}

fn formula_implies(s: In) -> IResult<SurfaceFormula> {
    // right associative
    nommap(
        pair(
            formula_or,
            opt(preceded(
                alt((keyword("implies"), sym("=>"))),
                formula_implies,
            )),
        ),
        |(left, right)| match right {
            Some(right) => SurfaceFormula::Connective {
                op: SurfaceConnective::Implies,
                left: Box::new(left),
                right: Box::new(right),
            },
            None => left,
        },
    )(s)
}

fn formula(s: In) -> IResult<SurfaceFormula> {
    let op = value(SurfaceConnective::Iff, alt((keyword("iff"), sym("<=>"))));
    nommap(
        pair(formula_implies, many0(pair(op, formula_implies))),
        |(first, rest)| connective_chain(first, rest),
    )(s)
}

// -------------------------------------------------------------- declarations

fn field_mult(s: In) -> IResult<FieldMult> {
    alt((
        value(FieldMult::Set, keyword("set")),
        value(FieldMult::Lone, keyword("lone")),
        value(FieldMult::One, keyword("one")),
    ))(s)
}

fn field_decl(s: In) -> IResult<FieldDecl> {
    nommap(
        tuple((ident, sym(":"), opt(field_mult), ident)),
        |(name, _, mult, range)| FieldDecl {
            name,
            mult: mult.unwrap_or(FieldMult::Set),
            range,
        },
    )(s)
}

fn sig_decl(s: In) -> IResult<SigDecl> {
    let modifier = alt((
        value((true, false), keyword("abstract")),
        value((false, true), keyword("one")),
    ));
    nommap(
        tuple((
            many0(modifier),
            keyword("sig"),
            ident,
            opt(preceded(keyword("extends"), ident)),
            delimited(
                sym("{"),
                separated_list0(sym(","), field_decl),
                preceded(opt(sym(",")), sym("}")),
            ),
        )),
        |(modifiers, _, name, parent, fields)| {
            let is_abstract = modifiers.iter().any(|&(a, _)| a);
            let is_one = modifiers.iter().any(|&(_, o)| o);
            SigDecl {
                name,
                parent,
                is_abstract,
                is_one,
                fields,
            }
        },
    )(s)
}

fn fact_decl(s: In) -> IResult<FactDecl> {
    nommap(
        tuple((
            keyword("fact"),
            opt(ident),
            delimited(sym("{"), many0(formula), sym("}")),
        )),
        |(_, name, body)| FactDecl { name, body },
    )(s)
}

fn pred_param(s: In) -> IResult<(String, String)> {
    nommap(tuple((ident, sym(":"), ident)), |(n, _, t)| (n, t))(s)
}

fn pred_params(s: In) -> IResult<Vec<(String, String)>> {
    let parens = delimited(sym("("), separated_list0(sym(","), pred_param), sym(")"));
    let bracks = delimited(sym("["), separated_list0(sym(","), pred_param), sym("]"));
    nommap(opt(alt((parens, bracks))), Option::unwrap_or_default)(s)
}

fn pred_decl(s: In) -> IResult<PredDecl> {
    nommap(
        tuple((
            keyword("pred"),
            ident,
            pred_params,
            delimited(sym("{"), many0(formula), sym("}")),
        )),
        |(_, name, params, body)| PredDecl { name, params, body },
    )(s)
}

fn run_decl(s: In) -> IResult<RunDecl> {
    nommap(
        tuple((
            keyword("run"),
            ident,
            keyword("for"),
            number,
            opt(ident),
            many0(preceded(sym(","), pair(number, ident))),
        )),
        |(_, pred, _, n, first_sig, rest)| {
            let mut default_scope = None;
            let mut sig_scopes = Vec::new();
            match first_sig {
                Some(sig) => sig_scopes.push((sig, n)),
                None => default_scope = Some(n),
            }
            for (n, sig) in rest {
                sig_scopes.push((sig, n));
            }
            RunDecl {
                pred,
                default_scope,
                sig_scopes,
            }
        },
    )(s)
}

fn model(s: In) -> IResult<Model> {
    enum Decl {
        Sig(SigDecl),
        Fact(FactDecl),
        Pred(PredDecl),
        Run(RunDecl),
    }
    let decl = alt((
        nommap(sig_decl, Decl::Sig),
        nommap(fact_decl, Decl::Fact),
        nommap(pred_decl, Decl::Pred),
        nommap(run_decl, Decl::Run),
    ));
    nommap(many0(decl), |decls| {
        let mut model = Model::default();
        for decl in decls {
            match decl {
                Decl::Sig(s) => model.sigs.push(s),
                Decl::Fact(f) => model.facts.push(f),
                Decl::Pred(p) => model.preds.push(p),
                Decl::Run(r) => model.runs.push(r),
            }
        }
        model
    })(s)
}

/// Position of `rest`'s start within `input`, as a 1-based (line, column)
fn location(input: &str, rest: &str) -> (usize, usize) {
    let consumed = input.len() - rest.len();
    let prefix = &input[..consumed];
    let line = prefix.matches('\n').count() + 1;
    let col = consumed - prefix.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    (line, col)
}

/// Parses a complete source file into a surface model
///
/// # Errors
/// Returns [`SigrunError::Parse`] with the line and column of the first
/// input the parser could not consume.
pub fn parse_source(input: &str) -> Result<Model> {
    match model(input) {
        Ok((rest, parsed)) => {
            let (rest, ()) = skip(rest).map_err(|_| SigrunError::Parse {
                line: 1,
                col: 1,
                message: "unreadable input".to_string(),
            })?;
            if rest.is_empty() {
                Ok(parsed)
            } else {
                let (line, col) = location(input, rest);
                Err(SigrunError::Parse {
                    line,
                    col,
                    message: "expected a sig, fact, pred, or run declaration".to_string(),
                })
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let (line, col) = location(input, e.input);
            Err(SigrunError::Parse {
                line,
                col,
                message: format!("unexpected input ({:?})", e.code),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(SigrunError::Parse {
            line: 1,
            col: 1,
            message: "incomplete input".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sig_with_fields() {
        let model = parse_source(
            "sig Person { spouse: lone Person, parents: set Person }",
        )
        .unwrap();
        assert_eq!(model.sigs.len(), 1);
        let sig = &model.sigs[0];
        assert_eq!(sig.name, "Person");
        assert!(!sig.is_abstract && !sig.is_one);
        assert_eq!(sig.fields.len(), 2);
        assert_eq!(sig.fields[0].mult, FieldMult::Lone);
        assert_eq!(sig.fields[1].mult, FieldMult::Set);
        assert_eq!(sig.fields[1].range, "Person");
    }

    #[test]
    fn parses_modifiers_and_extends() {
        let model = parse_source(
            "abstract sig Person {}\n one sig Adam extends Man {}\n sig Man extends Person {}",
        )
        .unwrap();
        assert!(model.sigs[0].is_abstract);
        assert!(model.sigs[1].is_one);
        assert_eq!(model.sigs[1].parent.as_deref(), Some("Man"));
        assert_eq!(model.sigs[2].parent.as_deref(), Some("Person"));
    }

    #[test]
    fn parses_fact_with_quantifier() {
        let model = parse_source(
            "fact NoSelfLove { all p: Person | not p in p.spouse }",
        )
        .unwrap();
        let fact = &model.facts[0];
        assert_eq!(fact.name.as_deref(), Some("NoSelfLove"));
        match &fact.body[0] {
            SurfaceFormula::Quantified {
                quant, vars, body, ..
            } => {
                assert_eq!(*quant, SurfaceQuant::All);
                assert_eq!(vars, &["p"]);
                assert!(matches!(**body, SurfaceFormula::Not(_)));
            }
            other => panic!("unexpected formula: {:?}", other),
        }
    }

    #[test]
    fn parses_multi_variable_quantifier() {
        let model =
            parse_source("fact { all p, q: Person | p in q.spouse implies q in p.spouse }")
                .unwrap();
        match &model.facts[0].body[0] {
            SurfaceFormula::Quantified { vars, body, .. } => {
                assert_eq!(vars, &["p", "q"]);
                assert!(matches!(
                    **body,
                    SurfaceFormula::Connective {
                        op: SurfaceConnective::Implies,
                        ..
                    }
                ));
            }
            other => panic!("unexpected formula: {:?}", other),
        }
    }

    #[test]
    fn parses_operators_with_precedence() {
        let model = parse_source("fact { a.b + c.d in e }").unwrap();
        match &model.facts[0].body[0] {
            SurfaceFormula::Compare { left, subset, .. } => {
                assert!(subset);
                match left {
                    SurfaceExpr::Binary {
                        op: SurfaceBinaryOp::Union,
                        left,
                        right,
                    } => {
                        assert!(matches!(
                            **left,
                            SurfaceExpr::Binary {
                                op: SurfaceBinaryOp::Join,
                                ..
                            }
                        ));
                        assert!(matches!(
                            **right,
                            SurfaceExpr::Binary {
                                op: SurfaceBinaryOp::Join,
                                ..
                            }
                        ));
                    }
                    other => panic!("unexpected expr: {:?}", other),
                }
            }
            other => panic!("unexpected formula: {:?}", other),
        }
    }

    #[test]
    fn arrow_is_not_difference() {
        let model = parse_source("fact { a -> b in c }").unwrap();
        match &model.facts[0].body[0] {
            SurfaceFormula::Compare { left, .. } => assert!(matches!(
                left,
                SurfaceExpr::Binary {
                    op: SurfaceBinaryOp::Product,
                    ..
                }
            )),
            other => panic!("unexpected formula: {:?}", other),
        }
    }

    #[test]
    fn parses_closure_and_transpose() {
        let model = parse_source("fact { all p: Person | not p in p.^parents }").unwrap();
        assert_eq!(model.facts.len(), 1);
        let model2 = parse_source("fact { ~spouse = spouse }").unwrap();
        match &model2.facts[0].body[0] {
            SurfaceFormula::Compare { left, subset, .. } => {
                assert!(!subset);
                assert!(matches!(
                    left,
                    SurfaceExpr::Unary {
                        op: SurfaceUnaryOp::Transpose,
                        ..
                    }
                ));
            }
            other => panic!("unexpected formula: {:?}", other),
        }
    }

    #[test]
    fn parses_pred_and_run() {
        let model = parse_source(
            "pred show() { some Person }\nrun show for 3 Person\nrun show for 4",
        )
        .unwrap();
        assert_eq!(model.preds[0].name, "show");
        assert!(model.preds[0].params.is_empty());
        assert_eq!(model.runs[0].pred, "show");
        assert_eq!(model.runs[0].sig_scopes, vec![("Person".to_string(), 3)]);
        assert_eq!(model.runs[0].default_scope, None);
        assert_eq!(model.runs[1].default_scope, Some(4));
    }

    #[test]
    fn parses_pred_with_params() {
        let model = parse_source("pred married(p: Person, q: Person) { q in p.spouse }").unwrap();
        assert_eq!(
            model.preds[0].params,
            vec![
                ("p".to_string(), "Person".to_string()),
                ("q".to_string(), "Person".to_string())
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let model = parse_source(
            "// a line comment\nsig A {} -- trailing words\n-- another\nsig B {}",
        )
        .unwrap();
        assert_eq!(model.sigs.len(), 2);
    }

    #[test]
    fn reports_error_location() {
        let err = parse_source("sig A {}\n???").unwrap_err();
        match err {
            SigrunError::Parse { line, col, .. } => {
                assert_eq!(line, 2);
                assert_eq!(col, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn overflowing_scope_literal_is_rejected() {
        let err = parse_source("sig A {}\npred p() {}\nrun p for 99999999999999999999 A")
            .unwrap_err();
        assert!(matches!(err, SigrunError::Parse { .. }));
    }

    #[test]
    fn multiplicity_formula_vs_quantifier() {
        let model = parse_source("fact { some Person }").unwrap();
        assert!(matches!(
            model.facts[0].body[0],
            SurfaceFormula::Mult {
                mult: SurfaceQuant::Some,
                ..
            }
        ));

        let model2 = parse_source("fact { some p: Person | p in Person }").unwrap();
        assert!(matches!(
            model2.facts[0].body[0],
            SurfaceFormula::Quantified {
                quant: SurfaceQuant::Some,
                ..
            }
        ));
    }

    #[test]
    fn parses_pred_call() {
        let model =
            parse_source("fact { married[Adam, Eve] }").unwrap();
        match &model.facts[0].body[0] {
            SurfaceFormula::PredCall { name, args } => {
                assert_eq!(name, "married");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected formula: {:?}", other),
        }
    }
}
