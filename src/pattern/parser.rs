//! Parsing of reachability patterns.
//!
//! ```text
//! pattern   ::= term (';' term)*
//! term      ::= atom ('+' atom)*
//! atom      ::= ['!'] name ['(' condition ')']
//! ```
//!
//! Conditions are expressions over program variables with the usual operator
//! precedence, from loosest to tightest binding: `?:`, `||`, `&&`, `|`, `^`,
//! `&`, equality, comparison, shifts, `+`/`-`, `*` and the unary operators
//! `!`, `~` and `-`.

use std::ops::Range;

use logos::Logos;

use crate::{
    error::{
        located::Locatable,
        pattern::{Error, LocatedError, Result},
    },
    ir::expr::{BinaryOp, Expr, UnaryOp},
    pattern::lexer::Token,
};

/// A parsed pattern: a sequence of terms.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternAst {
    pub terms: Vec<Term>,
}

/// A choice between atoms.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub atoms: Vec<Atom>,
}

/// A possibly negated, possibly guarded reference to named constructs.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    pub negated:   bool,
    pub name:      String,
    pub condition: Option<Expr>,

    /// The byte offset of the atom in the pattern text.
    pub offset: u32,
}

/// Parses the pattern `source`.
///
/// # Errors
///
/// Returns [`Err`] if `source` is not a well-formed pattern.
pub fn parse(source: &str) -> Result<PatternAst> {
    Parser::new(source)?.pattern()
}

/// Parses a standalone condition expression.
///
/// # Errors
///
/// Returns [`Err`] if `source` is not a well-formed expression.
pub fn parse_condition(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expr()?;
    parser.finish()?;
    Ok(expr)
}

#[allow(clippy::cast_possible_truncation)] // Patterns are far shorter than u32::MAX
fn offset(position: usize) -> u32 {
    position as u32
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos:    usize,
    end:    usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(token) = lexer.next() {
            let span = lexer.span();
            match token {
                Ok(token) => tokens.push((token, span)),
                Err(()) => {
                    return Err(Error::InvalidToken {
                        text: lexer.slice().to_string(),
                    }
                    .locate(offset(span.start)))
                }
            }
        }
        Ok(Self {
            tokens,
            pos: 0,
            end: source.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn location(&self) -> u32 {
        offset(self.tokens.get(self.pos).map_or(self.end, |(_, s)| s.start))
    }

    fn advance(&mut self) -> Option<(Token, Range<usize>)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<()> {
        if self.eat(token) {
            return Ok(());
        }
        Err(self.unexpected(expected))
    }

    fn unexpected(&self, expected: &'static str) -> LocatedError {
        match self.peek() {
            Some(found) => Error::UnexpectedToken {
                expected,
                found: found.to_string(),
            }
            .locate(self.location()),
            None => Error::UnexpectedEnd { expected }.locate(self.location()),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("the end of the pattern")),
        }
    }

    fn pattern(&mut self) -> Result<PatternAst> {
        if self.peek().is_none() {
            return Err(Error::EmptyPattern.locate(0));
        }

        let mut terms = vec![self.term()?];
        while self.eat(&Token::Semicolon) {
            terms.push(self.term()?);
        }
        self.finish()?;

        Ok(PatternAst { terms })
    }

    fn term(&mut self) -> Result<Term> {
        let mut atoms = vec![self.atom()?];
        while self.eat(&Token::Plus) {
            atoms.push(self.atom()?);
        }
        Ok(Term { atoms })
    }

    fn atom(&mut self) -> Result<Atom> {
        let location = self.location();
        let negated = self.eat(&Token::Bang);
        let Some(Token::Name(name)) = self.peek().cloned() else {
            return Err(self.unexpected("a construct name"));
        };
        self.pos += 1;

        let condition = if self.eat(&Token::LParen) {
            let condition = self.expr()?;
            self.expect(&Token::RParen, "`)`")?;
            Some(condition)
        } else {
            None
        };

        Ok(Atom {
            negated,
            name,
            condition,
            offset: location,
        })
    }

    fn expr(&mut self) -> Result<Expr> {
        let cond = self.binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.expr()?;
        self.expect(&Token::Colon, "`:`")?;
        let otherwise = self.expr()?;
        Ok(Expr::mux(cond, then, otherwise))
    }

    /// Parses binary operators binding at least as tightly as `level`.
    fn binary(&mut self, level: usize) -> Result<Expr> {
        if level == PRECEDENCE_LEVELS {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.peek().and_then(|t| binary_operator(level, t)) {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Tilde) => UnaryOp::Complement,
            Some(Token::Minus) => UnaryOp::Negate,
            _ => return self.primary(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::unary(op, operand))
    }

    fn primary(&mut self) -> Result<Expr> {
        let location = self.location();
        let Some((token, _)) = self.advance() else {
            return Err(Error::UnexpectedEnd {
                expected: "an expression",
            }
            .locate(location));
        };

        match token {
            Token::Bool(value) => Ok(Expr::bool(value)),
            Token::Name(path) => Ok(Expr::path(path)),
            Token::Sized(text) => sized_literal(&text).ok_or_else(|| {
                Error::InvalidLiteral { text }.locate(location)
            }),
            Token::Unsized(text) => Err(Error::InvalidLiteral { text }.locate(location)),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            found => Err(Error::UnexpectedToken {
                expected: "an expression",
                found:    found.to_string(),
            }
            .locate(location)),
        }
    }
}

/// The number of precedence levels of binary operators.
const PRECEDENCE_LEVELS: usize = 10;

/// Gets the binary operator that `token` denotes at precedence `level`, where
/// level zero binds the loosest.
fn binary_operator(level: usize, token: &Token) -> Option<BinaryOp> {
    let op = match (level, token) {
        (0, Token::OrOr) => BinaryOp::Or,
        (1, Token::AndAnd) => BinaryOp::And,
        (2, Token::Pipe) => BinaryOp::BitOr,
        (3, Token::Caret) => BinaryOp::BitXor,
        (4, Token::Amp) => BinaryOp::BitAnd,
        (5, Token::EqEq) => BinaryOp::Eq,
        (5, Token::NotEq) => BinaryOp::Ne,
        (6, Token::Lt) => BinaryOp::Lt,
        (6, Token::Le) => BinaryOp::Le,
        (6, Token::Gt) => BinaryOp::Gt,
        (6, Token::Ge) => BinaryOp::Ge,
        (7, Token::Shl) => BinaryOp::Shl,
        (7, Token::Shr) => BinaryOp::Shr,
        (8, Token::Plus) => BinaryOp::Add,
        (8, Token::Minus) => BinaryOp::Sub,
        (9, Token::Star) => BinaryOp::Mul,
        _ => return None,
    };
    Some(op)
}

/// Parses a literal of the form `<width>w<value>`.
fn sized_literal(text: &str) -> Option<Expr> {
    let (width, value) = text.split_once('w')?;
    let width = width.parse::<u16>().ok()?;
    let value = match value.strip_prefix("0x") {
        Some(digits) => u128::from_str_radix(digits, 16).ok()?,
        None => value.parse::<u128>().ok()?,
    };
    if width == 0 || width > crate::constant::MAXIMUM_BIT_WIDTH {
        return None;
    }
    if width < 128 && value >> width != 0 {
        return None;
    }
    Some(Expr::constant(value, width))
}

#[cfg(test)]
mod test {
    use crate::{
        error::pattern::Error,
        ir::expr::{BinaryOp, Expr},
        pattern::parser::{parse, parse_condition},
    };

    #[test]
    fn parses_sequences_of_choices() -> anyhow::Result<()> {
        let ast = parse("a; b + !c; d(meta.x == 8w1)")?;
        assert_eq!(ast.terms.len(), 3);
        assert_eq!(ast.terms[1].atoms.len(), 2);
        assert!(ast.terms[1].atoms[1].negated);
        assert_eq!(ast.terms[1].atoms[1].offset, 7);
        assert_eq!(
            ast.terms[2].atoms[0].condition,
            Some(Expr::eq(Expr::path("meta.x"), Expr::constant(1, 8)))
        );

        Ok(())
    }

    #[test]
    fn conditions_respect_precedence() -> anyhow::Result<()> {
        let parsed = parse_condition("8w42 + hdr.h.f * 8w2 == 8w0 || flag")?;
        let product = Expr::binary(BinaryOp::Mul, Expr::path("hdr.h.f"), Expr::constant(2, 8));
        let sum = Expr::binary(BinaryOp::Add, Expr::constant(42, 8), product);
        let expected = Expr::binary(
            BinaryOp::Or,
            Expr::binary(BinaryOp::Eq, sum, Expr::constant(0, 8)),
            Expr::path("flag"),
        );
        assert_eq!(parsed, expected);

        Ok(())
    }

    #[test]
    fn constant_conditions_fold() -> anyhow::Result<()> {
        assert_eq!(parse_condition("4w3 + 4w14 == 4w1")?, Expr::bool(true));
        assert_eq!(parse_condition("!(true && false)")?, Expr::bool(true));

        Ok(())
    }

    #[test]
    fn reports_malformed_patterns() {
        let error = |source: &str| parse(source).map_err(|e| e.payload).err();

        assert_eq!(error(""), Some(Error::EmptyPattern));
        assert_eq!(
            error("a;"),
            Some(Error::UnexpectedEnd {
                expected: "a construct name",
            })
        );
        assert_eq!(
            error("a(x == 42)"),
            Some(Error::InvalidLiteral { text: "42".into() })
        );
        assert_eq!(
            error("a(x == 2w7)"),
            Some(Error::InvalidLiteral { text: "2w7".into() })
        );
        assert!(matches!(error("a # b"), Some(Error::InvalidToken { .. })));
        assert!(matches!(error("a b"), Some(Error::UnexpectedToken { .. })));
    }
}
