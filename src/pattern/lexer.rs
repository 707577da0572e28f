//! Tokens of the reachability pattern language, including the expressions
//! used as inline conditions.

use std::fmt;

use logos::Logos;

#[derive(Logos, Clone, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // --- Pattern structure ---
    #[token(";")]
    Semicolon,
    #[token("+")]
    Plus,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // --- Condition operators ---
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,

    // --- Literals ---
    #[token("true", |_| true, priority = 2)]
    #[token("false", |_| false, priority = 2)]
    Bool(bool),

    /// An integer with an explicit width, such as `8w42` or `16w0x0800`.
    #[regex(r"[0-9]+w(0x[0-9a-fA-F]+|[0-9]+)", |lex| lex.slice().to_string())]
    Sized(String),

    /// An integer without a width.
    #[regex(r"0x[0-9a-fA-F]+|[0-9]+", |lex| lex.slice().to_string())]
    Unsized(String),

    /// A dotted hierarchical name, used both for constructs and for program
    /// variables.
    #[regex(
        r"[A-Za-z_$@][A-Za-z0-9_$@]*(\.[A-Za-z_$@][A-Za-z0-9_$@]*)*",
        |lex| lex.slice().to_string(),
        priority = 1
    )]
    Name(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Semicolon => ";",
            Self::Plus => "+",
            Self::Bang => "!",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Question => "?",
            Self::Colon => ":",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Bool(value) => return write!(f, "{value}"),
            Self::Sized(text) | Self::Unsized(text) | Self::Name(text) => return write!(f, "{text}"),
        };
        write!(f, "{symbol}")
    }
}

#[cfg(test)]
mod test {
    use logos::Logos;

    use crate::pattern::lexer::Token;

    fn lex(source: &str) -> Vec<Result<Token, ()>> {
        Token::lexer(source).collect()
    }

    #[test]
    fn lexes_pattern_structure() {
        assert_eq!(
            lex("ingress.t; !ingress.drop + egress"),
            vec![
                Ok(Token::Name("ingress.t".into())),
                Ok(Token::Semicolon),
                Ok(Token::Bang),
                Ok(Token::Name("ingress.drop".into())),
                Ok(Token::Plus),
                Ok(Token::Name("egress".into())),
            ]
        );
    }

    #[test]
    fn lexes_conditions() {
        assert_eq!(
            lex("(hdr.h.$valid && hdr.h.f >= 8w0x2a)"),
            vec![
                Ok(Token::LParen),
                Ok(Token::Name("hdr.h.$valid".into())),
                Ok(Token::AndAnd),
                Ok(Token::Name("hdr.h.f".into())),
                Ok(Token::Ge),
                Ok(Token::Sized("8w0x2a".into())),
                Ok(Token::RParen),
            ]
        );
        assert_eq!(lex("true"), vec![Ok(Token::Bool(true))]);
        assert_eq!(lex("trueish"), vec![Ok(Token::Name("trueish".into()))]);
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(lex("a # b").iter().any(Result::is_err));
    }
}
