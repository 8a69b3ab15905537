//! Arithmetic expressions read from configuration text.
//!
//! A formula is parsed once, checked against a fixed list of variable names
//! and known functions, and then evaluated many times with fresh variable
//! values. All failures surface from [`Formula::parse`]; evaluation of a
//! parsed formula only fails if the caller passes fewer values than there
//! are variables.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := ('-' | '+') unary | power
//! power  := atom ('^' unary)?
//! atom   := call | variable | number | '(' expr ')'
//! ```
//!
//! Recursion through `expr` and `unary` is capped at [`MAX_NESTING`] levels.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1, char, multispace0, one_of};
use nom::combinator::{all_consuming, map, opt, recognize};
use nom::error::ErrorKind;
use nom::multi::{many0, many0_count, separated_list0};
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded};
use nom::{IResult, Parser};

/// Deepest nesting of groups, calls, signs and exponents a formula may use.
pub const MAX_NESTING: usize = 64;

/// Errors raised while building or evaluating a formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    /// The text is not a well-formed expression.
    #[error("parse error at offset {offset}: {message}")]
    Parse {
        /// Byte offset where parsing stopped.
        offset: usize,
        /// What the parser expected there.
        message: String,
    },

    /// The expression names a variable that is not provided.
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// The expression calls a function that does not exist.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// A function was called with the wrong number of arguments.
    #[error("function `{name}` expects {expected} argument(s), got {got}")]
    Arity {
        /// Function name.
        name: String,
        /// Required argument count.
        expected: usize,
        /// Argument count found.
        got: usize,
    },

    /// Evaluation produced infinity or NaN.
    #[error("formula produced a non-finite value ({0})")]
    NonFinite(f64),

    /// Fewer values were supplied than the formula has variables.
    #[error("no value supplied for variable slot {0}")]
    MissingValue(usize),
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Abs,
    Sqrt,
    Floor,
    Ceil,
    Round,
    Exp,
    Ln,
    Log10,
    Sin,
    Cos,
    Tan,
    Min,
    Max,
    Pow,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        let func = match name {
            "abs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "exp" => Self::Exp,
            "ln" => Self::Ln,
            "log10" => Self::Log10,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "min" => Self::Min,
            "max" => Self::Max,
            "pow" => Self::Pow,
            _ => return None,
        };
        Some(func)
    }

    const fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max | Self::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Abs => a.abs(),
            Self::Sqrt => a.sqrt(),
            Self::Floor => a.floor(),
            Self::Ceil => a.ceil(),
            Self::Round => a.round(),
            Self::Exp => a.exp(),
            Self::Ln => a.ln(),
            Self::Log10 => a.log10(),
            Self::Sin => a.sin(),
            Self::Cos => a.cos(),
            Self::Tan => a.tan(),
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Pow => a.powf(b),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinOp {
    const fn from_char(c: char) -> Self {
        match c {
            '+' => Self::Add,
            '-' => Self::Sub,
            '*' => Self::Mul,
            '/' => Self::Div,
            '%' => Self::Rem,
            _ => Self::Pow,
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Rem => a % b,
            Self::Pow => a.powf(b),
        }
    }
}

/// Syntax tree as parsed, with names still unresolved.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    fn binary(op: char, lhs: Self, rhs: Self) -> Self {
        Self::Binary(BinOp::from_char(op), Box::new(lhs), Box::new(rhs))
    }
}

/// Resolved tree: variables are slot indices, functions are known.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(usize),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

impl Node {
    fn eval(&self, values: &[f64]) -> Result<f64, FormulaError> {
        let value = match self {
            Self::Num(n) => *n,
            Self::Var(slot) => values
                .get(*slot)
                .copied()
                .ok_or(FormulaError::MissingValue(*slot))?,
            Self::Neg(inner) => -inner.eval(values)?,
            Self::Binary(op, lhs, rhs) => op.apply(lhs.eval(values)?, rhs.eval(values)?),
            Self::Call(func, args) => {
                let mut evaluated = [0.0_f64; 2];
                for (out, arg) in evaluated.iter_mut().zip(args) {
                    *out = arg.eval(values)?;
                }
                let [a, b] = evaluated;
                func.apply(a, b)
            }
        };
        Ok(value)
    }
}

/// A parsed, name-checked arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    root: Node,
}

impl Formula {
    /// Parse `source`, allowing only the listed variable names.
    ///
    /// Variable values are later passed to [`Formula::evaluate`] in the
    /// same order as `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Parse`] for malformed text or nesting deeper
    /// than [`MAX_NESTING`], and
    /// [`FormulaError::UnknownVariable`], [`FormulaError::UnknownFunction`]
    /// or [`FormulaError::Arity`] for names that do not resolve.
    pub fn parse(source: &str, variables: &[&str]) -> Result<Self, FormulaError> {
        let expr = match all_consuming(ws(|i| expr(i, 0))).parse(source) {
            Ok((_, expr)) => expr,
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                let message = if e.code == ErrorKind::TooLarge {
                    "expression nested too deeply".to_owned()
                } else {
                    format!("unexpected input ({:?})", e.code)
                };
                return Err(FormulaError::Parse {
                    offset: source.len().saturating_sub(e.input.len()),
                    message,
                });
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(FormulaError::Parse {
                    offset: source.len(),
                    message: "unexpected end of input".to_owned(),
                });
            }
        };
        let root = resolve(expr, variables)?;
        Ok(Self {
            source: source.to_owned(),
            root,
        })
    }

    /// Evaluate with one value per declared variable.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::MissingValue`] if `values` is shorter than the
    /// variable list the formula was parsed with.
    pub fn evaluate(&self, values: &[f64]) -> Result<f64, FormulaError> {
        self.root.eval(values)
    }

    /// The text this formula was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn resolve(expr: Expr, variables: &[&str]) -> Result<Node, FormulaError> {
    let node = match expr {
        Expr::Num(n) => Node::Num(n),
        Expr::Var(name) => {
            let slot = variables
                .iter()
                .position(|candidate| *candidate == name)
                .ok_or(FormulaError::UnknownVariable(name))?;
            Node::Var(slot)
        }
        Expr::Neg(inner) => Node::Neg(Box::new(resolve(*inner, variables)?)),
        Expr::Binary(op, lhs, rhs) => Node::Binary(
            op,
            Box::new(resolve(*lhs, variables)?),
            Box::new(resolve(*rhs, variables)?),
        ),
        Expr::Call(name, args) => {
            let func = Func::lookup(&name).ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
            if args.len() != func.arity() {
                return Err(FormulaError::Arity {
                    name,
                    expected: func.arity(),
                    got: args.len(),
                });
            }
            let args = args
                .into_iter()
                .map(|arg| resolve(arg, variables))
                .collect::<Result<Vec<_>, _>>()?;
            Node::Call(func, args)
        }
    };
    Ok(node)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

type ParseResult<'a, T> = IResult<&'a str, T>;

fn ws<'a, P>(inner: P) -> impl Parser<&'a str, Output = P::Output, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

/// Step one level deeper, failing once [`MAX_NESTING`] is reached.
fn deeper(input: &str, depth: usize) -> Result<usize, nom::Err<nom::error::Error<&str>>> {
    if depth >= MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge)));
    }
    Ok(depth.saturating_add(1))
}

fn expr(input: &str, depth: usize) -> ParseResult<'_, Expr> {
    let depth = deeper(input, depth)?;
    let (input, first) = term(input, depth)?;
    let (input, rest) = many0(pair(ws(one_of("+-")), |i| term(i, depth))).parse(input)?;
    let folded = rest
        .into_iter()
        .fold(first, |acc, (op, rhs)| Expr::binary(op, acc, rhs));
    Ok((input, folded))
}

fn term(input: &str, depth: usize) -> ParseResult<'_, Expr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(pair(ws(one_of("*/%")), |i| unary(i, depth))).parse(input)?;
    let folded = rest
        .into_iter()
        .fold(first, |acc, (op, rhs)| Expr::binary(op, acc, rhs));
    Ok((input, folded))
}

fn unary(input: &str, depth: usize) -> ParseResult<'_, Expr> {
    let depth = deeper(input, depth)?;
    alt((
        map(preceded(ws(char('-')), |i| unary(i, depth)), |inner| {
            Expr::Neg(Box::new(inner))
        }),
        preceded(ws(char('+')), |i| unary(i, depth)),
        |i| power(i, depth),
    ))
    .parse(input)
}

fn power(input: &str, depth: usize) -> ParseResult<'_, Expr> {
    let (input, base) = atom(input, depth)?;
    let (input, exponent) = opt(preceded(ws(char('^')), |i| unary(i, depth))).parse(input)?;
    let expr = match exponent {
        Some(exponent) => Expr::binary('^', base, exponent),
        None => base,
    };
    Ok((input, expr))
}

fn atom(input: &str, depth: usize) -> ParseResult<'_, Expr> {
    ws(alt((
        |i| call(i, depth),
        map(identifier, |name: &str| Expr::Var(name.to_owned())),
        map(double, Expr::Num),
        delimited(char('('), |i| expr(i, depth), char(')')),
    )))
    .parse(input)
}

fn call(input: &str, depth: usize) -> ParseResult<'_, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), |i| expr(i, depth)),
        char(')'),
    )
    .parse(input)?;
    Ok((input, Expr::Call(name.to_owned(), args)))
}

fn identifier(input: &str) -> ParseResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const VARS: [&str; 2] = ["depth", "inventory"];

    fn eval(source: &str, depth: f64, inventory: f64) -> f64 {
        Formula::parse(source, &VARS)
            .unwrap()
            .evaluate(&[depth, inventory])
            .unwrap()
    }

    #[test]
    fn product_of_variables() {
        assert_eq!(eval("depth*inventory", 0.5, 0.5), 0.25);
        assert_eq!(eval(" depth * inventory ", 1.0, 0.0), 0.0);
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(eval("1 + 2 * 3", 0.0, 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0, 0.0), 9.0);
        assert_eq!(eval("10 - 4 - 3", 0.0, 0.0), 3.0);
        assert_eq!(eval("8 / 4 / 2", 0.0, 0.0), 1.0);
        assert_eq!(eval("7 % 4", 0.0, 0.0), 3.0);
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_negation() {
        assert_eq!(eval("2 ^ 3 ^ 2", 0.0, 0.0), 512.0);
        assert_eq!(eval("-2 ^ 2", 0.0, 0.0), -4.0);
        assert_eq!(eval("2 ^ -1", 0.0, 0.0), 0.5);
        assert_eq!(eval("depth^2", 0.5, 0.0), 0.25);
    }

    #[test]
    fn functions() {
        assert_eq!(eval("sqrt(depth)", 0.25, 0.0), 0.5);
        assert_eq!(eval("max(depth, inventory)", 0.2, 0.7), 0.7);
        assert_eq!(eval("min(depth, inventory)", 0.2, 0.7), 0.2);
        assert_eq!(eval("pow(2, 10)", 0.0, 0.0), 1024.0);
        assert_eq!(eval("abs(-3.5)", 0.0, 0.0), 3.5);
        assert_eq!(eval("floor(2.7) + ceil(0.2)", 0.0, 0.0), 3.0);
    }

    #[test]
    fn numbers_in_scientific_notation() {
        assert_eq!(eval("1e2 * depth", 0.5, 0.0), 50.0);
        assert_eq!(eval(".5 + .25", 0.0, 0.0), 0.75);
    }

    #[test]
    fn unknown_variable_is_rejected() {
        let err = Formula::parse("depth * height", &VARS).unwrap_err();
        assert_eq!(err, FormulaError::UnknownVariable("height".to_owned()));
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = Formula::parse("cbrt(depth)", &VARS).unwrap_err();
        assert_eq!(err, FormulaError::UnknownFunction("cbrt".to_owned()));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = Formula::parse("max(depth)", &VARS).unwrap_err();
        assert!(matches!(err, FormulaError::Arity { expected: 2, got: 1, .. }));
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        for source in ["depth *", "(depth", "depth inventory", "", "depth ** 2", "2 +* 3"] {
            let err = Formula::parse(source, &VARS).unwrap_err();
            assert!(
                matches!(err, FormulaError::Parse { .. }),
                "expected parse error for {source:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing() {
        let parens = format!("{}depth{}", "(".repeat(3000), ")".repeat(3000));
        let signs = format!("{}depth", "-".repeat(200_000));
        let powers = format!("2{}", "^2".repeat(5000));
        let calls = format!("{}depth{}", "abs(".repeat(3000), ")".repeat(3000));
        for source in [&parens, &signs, &powers, &calls] {
            let err = Formula::parse(source, &VARS).unwrap_err();
            assert!(
                matches!(&err, FormulaError::Parse { message, .. } if message == "expression nested too deeply"),
                "unexpected error {err:?}"
            );
        }
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let source = format!("{}depth{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(eval(&source, 0.5, 0.0), 0.5);
        assert_eq!(eval("- - -depth", 0.5, 0.0), -0.5);
    }

    #[test]
    fn missing_value_is_reported() {
        let formula = Formula::parse("inventory", &VARS).unwrap();
        assert_eq!(formula.evaluate(&[1.0]), Err(FormulaError::MissingValue(1)));
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        assert!(eval("1 / depth", 0.0, 0.0).is_infinite());
    }

    #[test]
    fn source_is_kept() {
        let formula = Formula::parse("depth + 1", &VARS).unwrap();
        assert_eq!(formula.source(), "depth + 1");
    }
}
