//! Recursive-descent parser.
//!
//! Precedence, loosest first: assignment, `?:`, `||`/`or`, `&&`/`and`,
//! equality, relational, additive, multiplicative, unary, postfix
//! (`.name`, `.name(args)`, `[index]`).

use model_tree::Value;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ElError;
use crate::lexer::{tokenize, Token};

/// Parses a single statement.
pub fn parse(src: &str) -> Result<Expr, ElError> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
    };
    let expr = parser.parse_assign()?;
    parser.expect(&Token::Eof, "end of statement")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Token::Ident(s) if s == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> ElError {
        ElError::UnexpectedToken {
            expected,
            found: self.peek().describe(),
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ElError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn parse_assign(&mut self) -> Result<Expr, ElError> {
        let target = self.parse_ternary()?;
        if !self.eat(&Token::Assign) {
            return Ok(target);
        }
        match target {
            Expr::Name(_) | Expr::Member(..) | Expr::Index(..) => {
                let value = self.parse_assign()?;
                Ok(Expr::Assign(Box::new(target), Box::new(value)))
            }
            other => Err(ElError::NotAssignable(format!("{other:?}"))),
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, ElError> {
        let test = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let then = self.parse_assign()?;
        self.expect(&Token::Colon, "':'")?;
        let otherwise = self.parse_assign()?;
        Ok(Expr::Ternary(Box::new(test), Box::new(then), Box::new(otherwise)))
    }

    fn parse_or(&mut self) -> Result<Expr, ElError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) || self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ElError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) || self.eat_keyword("and") {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ElError>,
    ) -> Result<Expr, ElError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_equality(&mut self) -> Result<Expr, ElError> {
        self.binary_level(
            &[(Token::Eq, BinaryOp::Eq), (Token::Ne, BinaryOp::Ne)],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, ElError> {
        self.binary_level(
            &[
                (Token::Le, BinaryOp::Le),
                (Token::Ge, BinaryOp::Ge),
                (Token::Lt, BinaryOp::Lt),
                (Token::Gt, BinaryOp::Gt),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ElError> {
        self.binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ElError> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ElError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        if self.eat(&Token::Bang) || self.eat_keyword("not") {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_args(&mut self, close: &Token) -> Result<Vec<Expr>, ElError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assign()?);
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(&Token::Comma, "',' or closing bracket")?;
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ElError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = match self.advance() {
                    Token::Ident(name) => name,
                    Token::Int(n) => n.to_string(),
                    other => {
                        return Err(ElError::UnexpectedToken {
                            expected: "member name",
                            found: other.describe(),
                        })
                    }
                };
                if self.eat(&Token::LParen) {
                    let args = self.parse_args(&Token::RParen)?;
                    expr = Expr::Call {
                        receiver: Some(Box::new(expr)),
                        name,
                        args,
                    };
                } else {
                    expr = Expr::Member(Box::new(expr), name);
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_assign()?;
                self.expect(&Token::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ElError> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Value::from(n))),
            Token::Float(n) => Ok(Expr::Literal(Value::from_f64(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Text(s))),
            Token::LParen => {
                let inner = self.parse_assign()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::List(self.parse_args(&Token::RBracket)?)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ if self.eat(&Token::LParen) => Ok(Expr::Call {
                    receiver: None,
                    name,
                    args: self.parse_args(&Token::RParen)?,
                }),
                _ => Ok(Expr::Name(name)),
            },
            other => Err(ElError::UnexpectedToken {
                expected: "expression",
                found: other.describe(),
            }),
        }
    }
}
