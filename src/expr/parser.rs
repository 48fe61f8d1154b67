use thiserror::Error;

use super::ast::{BinOp, Expr, Path, PathRoot, PathSegment};
use super::lexer::{tokenize, LexError, Token};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unexpected token: {0:?}")]
    UnexpectedToken(Token),
    #[error("expected a path segment after '.'")]
    ExpectedPathSegment,
}

pub fn parse(input: &str) -> Result<Expr, ExprParseError> {
    let tokens = tokenize(input)?;
    let mut p = Parser {
        tokens,
        pos: 0,
    };
    let expr = p.parse_or()?;
    if p.pos != p.tokens.len() {
        return Err(ExprParseError::UnexpectedToken(p.tokens[p.pos].clone()));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Token) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprParseError> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprParseError> {
        if self.eat(&Token::Bang) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprParseError> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;
        Ok(Expr::Binary(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprParseError> {
        match self.bump().ok_or(ExprParseError::UnexpectedEof)? {
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(ExprParseError::UnexpectedToken(
                        self.peek().cloned().unwrap_or(Token::RParen),
                    ));
                }
                Ok(inner)
            }
            Token::Bang => Ok(Expr::Not(Box::new(self.parse_unary()?))),
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => {
                if name == "true" {
                    return Ok(Expr::Bool(true));
                }
                if name == "false" {
                    return Ok(Expr::Bool(false));
                }
                if name == "null" {
                    return Ok(Expr::Null);
                }
                self.parse_path(name)
            }
            other => Err(ExprParseError::UnexpectedToken(other)),
        }
    }

    fn parse_path(&mut self, first: String) -> Result<Expr, ExprParseError> {
        let (root, mut raw) = match first.as_str() {
            "$data" => (PathRoot::Data, "$data".to_string()),
            "$root" => (PathRoot::Root, "$root".to_string()),
            "$index" => (PathRoot::Index, "$index".to_string()),
            other => (PathRoot::Data, other.to_string()),
        };
        let mut segments = Vec::new();
        if !matches!(first.as_str(), "$data" | "$root" | "$index") {
            segments.push(PathSegment::Field(first));
        }
        while self.eat(&Token::Dot) {
            raw.push('.');
            match self.bump().ok_or(ExprParseError::ExpectedPathSegment)? {
                Token::Ident(name) => {
                    raw.push_str(&name);
                    segments.push(PathSegment::Field(name));
                }
                Token::Number(n) => {
                    let idx = n as usize;
                    raw.push_str(&idx.to_string());
                    segments.push(PathSegment::Index(idx));
                }
                other => return Err(ExprParseError::UnexpectedToken(other)),
            }
        }
        Ok(Expr::Path(Path { raw, root, segments }))
    }
}
