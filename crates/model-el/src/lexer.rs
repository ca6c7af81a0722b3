//! Tokens and the lexer.

use crate::error::ElError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    /// Names, including `$`-prefixed ones such as `$self` and `$$run`.
    Ident(String),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    Bang,
    And, // &&
    Or,  // ||

    Assign,
    Question,
    Colon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Int(n) => n.to_string(),
            Token::Float(n) => n.to_string(),
            Token::Str(s) => format!("'{s}'"),
            Token::Ident(s) => s.clone(),
            Token::Eof => "end of input".to_string(),
            other => format!("{other:?}"),
        }
    }
}

struct Lexer {
    src: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        let mut is_float = false;
        while let Some(c @ '0'..='9') = self.peek() {
            s.push(c);
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            s.push('.');
            self.pos += 1;
            while let Some(c @ '0'..='9') = self.peek() {
                s.push(c);
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            s.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                s.push(sign);
                self.pos += 1;
            }
            while let Some(c @ '0'..='9') = self.peek() {
                s.push(c);
                self.pos += 1;
            }
        }
        if !is_float {
            if let Ok(n) = s.parse::<i64>() {
                return Token::Int(n);
            }
        }
        Token::Float(s.parse().unwrap_or(f64::NAN))
    }

    fn read_string(&mut self, quote: char, start: usize) -> Result<Token, ElError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(ElError::UnterminatedString(start)),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(c) => s.push(c),
                    None => return Err(ElError::UnterminatedString(start)),
                },
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_ident(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        Token::Ident(s)
    }

    fn next_token(&mut self) -> Result<Token, ElError> {
        self.skip_ws();
        let start = self.pos;
        let Some(ch) = self.advance() else {
            return Ok(Token::Eof);
        };
        let token = match ch {
            '0'..='9' => self.read_number(ch),
            '\'' | '"' => self.read_string(ch, start)?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.read_ident(c),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '?' => Token::Question,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '=' if self.eat('=') => Token::Eq,
            '=' => Token::Assign,
            '!' if self.eat('=') => Token::Ne,
            '!' => Token::Bang,
            '<' if self.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            other => return Err(ElError::UnexpectedChar { ch: other, pos: start }),
        };
        Ok(token)
    }
}

/// Splits `src` into tokens, ending with [`Token::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>, ElError> {
    let mut lexer = Lexer {
        src: src.chars().collect(),
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
