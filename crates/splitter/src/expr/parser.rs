//! Recursive-descent parser producing the expression tree.

use engine_core::{Error, Result};

use super::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
    Matches,
    StartsWith,
    EndsWith,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Field(String),
    List(Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

pub fn parse(tokens: Vec<Token>) -> Result<Expr> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(Error::expression(format!("unexpected token {:?}", token))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(Error::expression(format!(
                "expected {:?}, found {:?}",
                expected, token
            ))),
            None => Err(Error::expression(format!(
                "expected {:?}, found end of expression",
                expected
            ))),
        }
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.comparison()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison_op(&self) -> Option<(BinaryOp, usize)> {
        let op = match self.peek()? {
            Token::Eq => BinaryOp::Eq,
            Token::Ne => BinaryOp::Ne,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
            Token::In => BinaryOp::In,
            Token::Contains => BinaryOp::Contains,
            Token::Matches => BinaryOp::Matches,
            Token::StartsWith => BinaryOp::StartsWith,
            Token::EndsWith => BinaryOp::EndsWith,
            Token::Not if self.peek_at(1) == Some(&Token::In) => return Some((BinaryOp::NotIn, 2)),
            _ => return None,
        };
        Some((op, 1))
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut left = self.additive()?;
        while let Some((op, width)) = self.comparison_op() {
            self.pos += width;
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.unary()?)))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self
            .advance()
            .ok_or_else(|| Error::expression("unexpected end of expression"))?;
        match token {
            Token::Nil => Ok(Expr::Literal(Literal::Nil)),
            Token::True => Ok(Expr::Literal(Literal::Bool(true))),
            Token::False => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Int(v) => Ok(Expr::Literal(Literal::Int(v))),
            Token::Float(v) => Ok(Expr::Literal(Literal::Float(v))),
            Token::Str(v) => Ok(Expr::Literal(Literal::Str(v))),
            Token::LParen => {
                let inner = self.or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.items(Token::RBracket)?)),
            Token::Ident(name) if self.peek() == Some(&Token::LParen) => {
                self.advance();
                Ok(Expr::Call(name, self.items(Token::RParen)?))
            }
            Token::Ident(name) => Ok(Expr::Field(name)),
            // Infix keywords double as function names: `contains(a, b)`.
            Token::Contains | Token::Matches | Token::StartsWith | Token::EndsWith
                if self.peek() == Some(&Token::LParen) =>
            {
                let name = match token {
                    Token::Contains => "contains",
                    Token::Matches => "matches",
                    Token::StartsWith => "starts_with",
                    _ => "ends_with",
                };
                self.advance();
                Ok(Expr::Call(name.to_string(), self.items(Token::RParen)?))
            }
            other => Err(Error::expression(format!("unexpected token {:?}", other))),
        }
    }

    /// Comma-separated expressions up to `close`; the opener is consumed.
    fn items(&mut self, close: Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.peek() == Some(&close) {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.or()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(token) if token == close => return Ok(items),
                Some(token) => {
                    return Err(Error::expression(format!("unexpected token {:?}", token)))
                }
                None => return Err(Error::expression("unexpected end of expression")),
            }
        }
    }
}
