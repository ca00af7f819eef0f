use serde_json::Value;

use crate::ast::AssignOp;
use crate::ast::BinaryOp;
use crate::ast::Expr;
use crate::ast::LogicalOp;
use crate::ast::Program;
use crate::ast::Stmt;
use crate::ast::UnaryOp;
use crate::lexer::tokenize;
use crate::lexer::Token;
use crate::lexer::TokenKind;
use crate::value;
use crate::ExpressionError;

const KEYWORDS: &[&str] = &[
    "var", "let", "const", "if", "else", "while", "for", "typeof", "in",
];

/// Parse a single expression that must span the whole input.
pub(crate) fn parse_expression(source: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a statement list.
pub(crate) fn parse_program(source: &str) -> Result<Program, ExpressionError> {
    let mut parser = Parser::new(source)?;
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            tokens: tokenize(source)?,
            current: 0,
        })
    }

    fn peek(&self) -> &Token {
        let index = self.current.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.peek().is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_ident(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExpressionError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{punct}`")))
        }
    }

    fn expect_eof(&self) -> Result<(), ExpressionError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of expression"))
        }
    }

    fn unexpected(&self, expected: &str) -> ExpressionError {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Number(n) => value::format_number(*n),
            TokenKind::String(s) => format!("'{s}'"),
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Punct(p) => (*p).to_string(),
            TokenKind::Eof => "end of input".to_string(),
        };
        ExpressionError::syntax(format!("expected {expected}, found `{found}`"), token.offset)
    }

    fn identifier(&mut self) -> Result<String, ExpressionError> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ExpressionError> {
        if self.eat(";") {
            return Ok(Stmt::Empty);
        }

        if self.peek().is_punct("{") {
            self.advance();
            let mut body = Vec::new();
            while !self.eat("}") {
                if self.at_eof() {
                    return Err(self.unexpected("`}`"));
                }
                body.push(self.statement()?);
            }
            return Ok(Stmt::Block(body));
        }

        if self.eat_keyword("if") {
            self.expect("(")?;
            let test = self.expression()?;
            self.expect(")")?;
            let consequent = Box::new(self.statement()?);
            let alternate = if self.eat_keyword("else") {
                Some(Box::new(self.statement()?))
            } else {
                None
            };
            return Ok(Stmt::If {
                test,
                consequent,
                alternate,
            });
        }

        if self.eat_keyword("while") {
            self.expect("(")?;
            let test = self.expression()?;
            self.expect(")")?;
            let body = Box::new(self.statement()?);
            return Ok(Stmt::While { test, body });
        }

        if self.eat_keyword("for") {
            return self.for_statement();
        }

        let stmt = self.simple_statement()?;
        self.eat(";");
        Ok(stmt)
    }

    fn simple_statement(&mut self) -> Result<Stmt, ExpressionError> {
        let token = self.peek();
        if token.is_ident("var") || token.is_ident("let") || token.is_ident("const") {
            self.advance();
            let mut declarations = Vec::new();
            loop {
                let name = self.identifier()?;
                let init = if self.eat("=") {
                    Some(self.assignment()?)
                } else {
                    None
                };
                declarations.push((name, init));
                if !self.eat(",") {
                    break;
                }
            }
            return Ok(Stmt::Declare(declarations));
        }
        Ok(Stmt::Expr(self.expression()?))
    }

    fn for_statement(&mut self) -> Result<Stmt, ExpressionError> {
        self.expect("(")?;
        let init = if self.peek().is_punct(";") {
            None
        } else {
            Some(Box::new(self.simple_statement()?))
        };
        self.expect(";")?;
        let test = if self.peek().is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(";")?;
        let update = if self.peek().is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.peek().offset;
        let target = self.conditional()?;

        let op = match &self.peek().kind {
            TokenKind::Punct("=") => AssignOp::Assign,
            TokenKind::Punct("+=") => AssignOp::Compound(BinaryOp::Add),
            TokenKind::Punct("-=") => AssignOp::Compound(BinaryOp::Sub),
            TokenKind::Punct("*=") => AssignOp::Compound(BinaryOp::Mul),
            TokenKind::Punct("/=") => AssignOp::Compound(BinaryOp::Div),
            TokenKind::Punct("%=") => AssignOp::Compound(BinaryOp::Rem),
            _ => return Ok(target),
        };

        if !target.is_assignable() {
            return Err(ExpressionError::syntax("invalid assignment target", offset));
        }

        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let test = self.logical_or()?;
        if !self.eat("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.logical_and()?;
        loop {
            let op = if self.eat("||") {
                LogicalOp::Or
            } else if self.eat("??") {
                LogicalOp::Nullish
            } else {
                return Ok(left);
            };
            let right = self.logical_and()?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn logical_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.equality()?;
        while self.eat("&&") {
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Punct("==") => BinaryOp::Eq,
                TokenKind::Punct("!=") => BinaryOp::NotEq,
                TokenKind::Punct("===") => BinaryOp::StrictEq,
                TokenKind::Punct("!==") => BinaryOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.relational()?;
            left = binary(op, left, right);
        }
    }

    fn relational(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.additive()?;
        loop {
            let op = match &self.peek().kind {
                TokenKind::Punct("<") => BinaryOp::Lt,
                TokenKind::Punct(">") => BinaryOp::Gt,
                TokenKind::Punct("<=") => BinaryOp::LtEq,
                TokenKind::Punct(">=") => BinaryOp::GtEq,
                TokenKind::Ident(name) if name == "in" => BinaryOp::In,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Punct("+") => BinaryOp::Add,
                TokenKind::Punct("-") => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Punct("*") => BinaryOp::Mul,
                TokenKind::Punct("/") => BinaryOp::Div,
                TokenKind::Punct("%") => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Negate),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }

        let increment = self.peek().is_punct("++");
        if increment || self.peek().is_punct("--") {
            let offset = self.advance().offset;
            let target = self.unary()?;
            if !target.is_assignable() {
                return Err(ExpressionError::syntax("invalid update target", offset));
            }
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target: Box::new(target),
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                let property = match &self.peek().kind {
                    TokenKind::Ident(name) => name.clone(),
                    _ => return Err(self.unexpected("a property name")),
                };
                self.advance();
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat("[") {
                let index = self.expression()?;
                self.expect("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat("(") {
                let args = self.list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }

        let increment = self.peek().is_punct("++");
        if (increment || self.peek().is_punct("--")) && expr.is_assignable() {
            self.advance();
            expr = Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ExpressionError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.assignment()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(value::number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenKind::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.advance();
                    Ok(Expr::Literal(Value::Bool(name == "true")))
                }
                "null" | "undefined" => {
                    self.advance();
                    Ok(Expr::Literal(Value::Null))
                }
                _ => Ok(Expr::Ident(self.identifier()?)),
            },
            TokenKind::Punct("(") => {
                self.advance();
                let expr = self.expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                self.advance();
                Ok(Expr::Array(self.list("]")?))
            }
            TokenKind::Punct("{") => {
                self.advance();
                self.object()
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn object(&mut self) -> Result<Expr, ExpressionError> {
        let mut properties = Vec::new();
        while !self.eat("}") {
            let token = self.advance();
            let key = match token.kind {
                TokenKind::Ident(name) => name,
                TokenKind::String(s) => s,
                TokenKind::Number(n) => value::format_number(n),
                _ => {
                    return Err(ExpressionError::syntax(
                        "expected a property name",
                        token.offset,
                    ))
                }
            };
            let value = if self.eat(":") {
                self.assignment()?
            } else {
                Expr::Ident(key.clone())
            };
            properties.push((key, value));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(properties))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
