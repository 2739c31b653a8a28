use std::rc::Rc;

use super::ast::{
    BinaryOp, DeclKind, Expr, ForInit, FunctionBody, FunctionDef, LogicalOp, Stmt,
    TemplateSegment, UnaryOp,
};
use super::fault::Fault;
use super::lexer::{TemplatePart, Token, TokenKind, tokenize};

/// Nesting limit for statements and expressions; keeps hostile input from
/// overflowing the host stack while parsing.
const MAX_NESTING: usize = 64;

/// Parse a complete script body.
pub fn parse(source: &str) -> Result<Vec<Stmt>, Fault> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(body)
}

fn parse_expression(source: &str) -> Result<Expr, Fault> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    if !parser.at_eof() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // --- token helpers ---

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), Fault> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn ident(&mut self) -> Result<String, Fault> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Property names may be any identifier, reserved words included.
    fn property_name(&mut self) -> Result<String, Fault> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn unexpected(&self) -> Fault {
        let tok = self.peek();
        match &tok.kind {
            TokenKind::Eof => Fault::syntax_error("Unexpected end of input"),
            kind => Fault::syntax_error(format!(
                "Unexpected token {} at line {}",
                describe_token(kind),
                tok.line
            )),
        }
    }

    /// Automatic semicolon insertion, simplified: a statement ends at `;`,
    /// before `}`, at end of input, or at a line break.
    fn end_statement(&mut self) -> Result<(), Fault> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
        {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, Fault>) -> Result<T, Fault> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            self.depth -= 1;
            return Err(Fault::syntax_error("Code is nested too deeply"));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    // --- statements ---

    fn statement(&mut self) -> Result<Stmt, Fault> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt, Fault> {
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }

        let TokenKind::Ident(word) = &self.peek().kind else {
            return self.expression_statement();
        };
        let word = word.clone();

        match word.as_str() {
            "export" => {
                self.advance();
                self.statement_inner()
            }
            "let" | "const" | "var" => {
                let kind = self.decl_kind();
                let decls = self.declarators(kind)?;
                self.end_statement()?;
                Ok(Stmt::Decl(kind, decls))
            }
            "function" if matches!(self.peek_kind_at(1), TokenKind::Ident(_)) => {
                self.advance();
                let def = self.function_rest(true)?;
                Ok(Stmt::Function(def))
            }
            "if" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.statement()?);
                let alternate = if self.eat_keyword("else") {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While { test, body })
            }
            "for" => {
                self.advance();
                self.for_statement()
            }
            "return" => {
                self.advance();
                let value = if self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_eof()
                    || self.peek().newline_before
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.end_statement()?;
                Ok(Stmt::Return(value))
            }
            "throw" => {
                self.advance();
                if self.peek().newline_before {
                    return Err(Fault::syntax_error("Illegal newline after throw"));
                }
                let value = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Throw(value))
            }
            "try" => {
                self.advance();
                self.try_statement()
            }
            "break" => {
                self.advance();
                self.end_statement()?;
                Ok(Stmt::Break)
            }
            "continue" => {
                self.advance();
                self.end_statement()?;
                Ok(Stmt::Continue)
            }
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> Result<Stmt, Fault> {
        let expr = self.expression()?;
        self.end_statement()?;
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, Fault> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn decl_kind(&mut self) -> DeclKind {
        let kind = match &self.peek().kind {
            TokenKind::Ident(w) if w == "const" => DeclKind::Const,
            TokenKind::Ident(w) if w == "var" => DeclKind::Var,
            _ => DeclKind::Let,
        };
        self.advance();
        kind
    }

    fn declarators(&mut self, kind: DeclKind) -> Result<Vec<(String, Option<Expr>)>, Fault> {
        let mut decls = Vec::new();
        loop {
            let name = self.ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else if kind == DeclKind::Const && !self.is_keyword("of") {
                return Err(Fault::syntax_error(format!(
                    "Missing initializer in const declaration of '{}'",
                    name
                )));
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat_punct(",") {
                return Ok(decls);
            }
        }
    }

    fn for_statement(&mut self) -> Result<Stmt, Fault> {
        self.expect_punct("(")?;

        let is_decl = self.is_keyword("let") || self.is_keyword("const") || self.is_keyword("var");
        if is_decl
            && matches!(self.peek_kind_at(1), TokenKind::Ident(_))
            && matches!(self.peek_kind_at(2), TokenKind::Ident(w) if w == "of")
        {
            let kind = self.decl_kind();
            let binding = self.ident()?;
            self.advance();
            let iterable = self.assignment()?;
            self.expect_punct(")")?;
            let body = Box::new(self.statement()?);
            return Ok(Stmt::ForOf {
                kind,
                binding,
                iterable,
                body,
            });
        }

        let init = if self.is_punct(";") {
            None
        } else if is_decl {
            let kind = self.decl_kind();
            Some(ForInit::Decl(kind, self.declarators(kind)?))
        } else {
            Some(ForInit::Expr(self.expression()?))
        };
        self.expect_punct(";")?;
        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt, Fault> {
        let block = self.block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat_keyword("catch") {
            if self.eat_punct("(") {
                param = Some(self.ident()?);
                self.expect_punct(")")?;
            }
            handler = Some(self.block()?);
        }
        let finalizer = if self.eat_keyword("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(Fault::syntax_error("Missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    /// Parses `name? (params) { body }` after the `function` keyword.
    fn function_rest(&mut self, require_name: bool) -> Result<Rc<FunctionDef>, Fault> {
        let name = if require_name || matches!(self.peek().kind, TokenKind::Ident(_)) {
            Some(self.ident()?)
        } else {
            None
        };
        let params = self.params()?;
        let body = self.block()?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
        }))
    }

    fn params(&mut self) -> Result<Vec<String>, Fault> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            params.push(self.ident()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(params)
    }

    // --- expressions ---

    fn expression(&mut self) -> Result<Expr, Fault> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, Fault> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> Result<Expr, Fault> {
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }

        let target = self.conditional()?;
        let op = match &self.peek().kind {
            TokenKind::Punct("=") => None,
            TokenKind::Punct("+=") => Some(BinaryOp::Add),
            TokenKind::Punct("-=") => Some(BinaryOp::Sub),
            TokenKind::Punct("*=") => Some(BinaryOp::Mul),
            TokenKind::Punct("/=") => Some(BinaryOp::Div),
            TokenKind::Punct("%=") => Some(BinaryOp::Rem),
            _ => return Ok(target),
        };
        if !matches!(
            target,
            Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            return Err(Fault::syntax_error(
                "Invalid left-hand side in assignment",
            ));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn try_arrow(&mut self) -> Result<Option<Expr>, Fault> {
        let params = match (&self.peek().kind, self.peek_kind_at(1)) {
            (TokenKind::Ident(name), TokenKind::Punct("=>")) if !is_reserved(name) => {
                let name = name.clone();
                self.advance();
                vec![name]
            }
            (TokenKind::Punct("("), _) if self.arrow_params_ahead() => self.params()?,
            _ => return Ok(None),
        };
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(self.assignment()?)
        };
        Ok(Some(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        }))))
    }

    /// Looks past `( a, b )` to see whether an `=>` follows.
    fn arrow_params_ahead(&self) -> bool {
        let mut offset = 1;
        if matches!(self.peek_kind_at(offset), TokenKind::Punct(")")) {
            return matches!(self.peek_kind_at(offset + 1), TokenKind::Punct("=>"));
        }
        loop {
            if !matches!(self.peek_kind_at(offset), TokenKind::Ident(_)) {
                return false;
            }
            offset += 1;
            match self.peek_kind_at(offset) {
                TokenKind::Punct(",") => offset += 1,
                TokenKind::Punct(")") => {
                    return matches!(self.peek_kind_at(offset + 1), TokenKind::Punct("=>"));
                }
                _ => return false,
            }
        }
    }

    fn conditional(&mut self) -> Result<Expr, Fault> {
        let test = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical_or(&mut self) -> Result<Expr, Fault> {
        let mut left = self.logical_and()?;
        loop {
            let op = if self.eat_punct("||") {
                LogicalOp::Or
            } else if self.eat_punct("??") {
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

    fn logical_and(&mut self) -> Result<Expr, Fault> {
        let mut left = self.equality()?;
        while self.eat_punct("&&") {
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, Fault>,
    ) -> Result<Expr, Fault> {
        let mut left = next(self)?;
        'outer: loop {
            for (punct, op) in ops {
                if self.eat_punct(punct) {
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> Result<Expr, Fault> {
        self.binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::LooseEq),
                ("!=", BinaryOp::LooseNe),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> Result<Expr, Fault> {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, Fault> {
        self.binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, Fault> {
        self.binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, Fault> {
        self.nested(Self::unary_inner)
    }

    fn unary_inner(&mut self) -> Result<Expr, Fault> {
        let op = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Punct(p @ ("++" | "--")) => {
                let increment = *p == "++";
                self.advance();
                let target = self.unary()?;
                return update(increment, true, target);
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let operand = self.unary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, Fault> {
        let expr = self.call_member()?;
        if self.peek().newline_before {
            return Ok(expr);
        }
        match &self.peek().kind {
            TokenKind::Punct(p @ ("++" | "--")) => {
                let increment = *p == "++";
                self.advance();
                update(increment, false, expr)
            }
            _ => Ok(expr),
        }
    }

    fn call_member(&mut self) -> Result<Expr, Fault> {
        let mut expr = if self.eat_keyword("new") {
            let callee = self.member_only()?;
            let args = if self.is_punct("(") {
                self.arguments()?
            } else {
                Vec::new()
            };
            Expr::New {
                callee: Box::new(callee),
                args,
            }
        } else {
            self.primary()?
        };

        loop {
            if self.eat_punct(".") {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Callee of `new`: member accesses only, so the argument list binds to `new`.
    fn member_only(&mut self) -> Result<Expr, Fault> {
        let mut expr = self.primary()?;
        while self.eat_punct(".") {
            let property = self.property_name()?;
            expr = Expr::Member {
                object: Box::new(expr),
                property,
            };
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, Fault> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            args.push(self.assignment()?);
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, Fault> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Template(parts) => {
                let segments = parts
                    .into_iter()
                    .map(|part| match part {
                        TemplatePart::Text(text) => Ok(TemplateSegment::Text(text)),
                        TemplatePart::Code(code) => parse_expression(&code).map(TemplateSegment::Expr),
                    })
                    .collect::<Result<Vec<_>, Fault>>()?;
                Ok(Expr::Template(segments))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "function" => Ok(Expr::Function(self.function_rest(false)?)),
                _ if is_reserved(&word) => {
                    self.pos -= 1;
                    Err(self.unexpected())
                }
                _ => Ok(Expr::Ident(word)),
            },
            TokenKind::Punct("(") => {
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.assignment()?);
                    if !self.is_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                Ok(Expr::Array(items))
            }
            TokenKind::Punct("{") => self.object_literal(),
            TokenKind::Eof => Err(Fault::syntax_error("Unexpected end of input")),
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    fn object_literal(&mut self) -> Result<Expr, Fault> {
        let mut props = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.advance().kind {
                TokenKind::Ident(name) => name,
                TokenKind::Str(s) => s,
                TokenKind::Number(n) => super::value::format_number(n),
                TokenKind::Eof => return Err(Fault::syntax_error("Unexpected end of input")),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
            };
            let value = if self.eat_punct(":") {
                self.assignment()?
            } else if self.is_punct("(") {
                let params = self.params()?;
                let body = self.block()?;
                Expr::Function(Rc::new(FunctionDef {
                    name: Some(key.clone()),
                    params,
                    body: FunctionBody::Block(body),
                }))
            } else {
                Expr::Ident(key.clone())
            };
            props.push((key, value));
            if !self.is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        Ok(Expr::Object(props))
    }
}

fn update(increment: bool, prefix: bool, target: Expr) -> Result<Expr, Fault> {
    if !matches!(
        target,
        Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
    ) {
        let side = if prefix { "prefix" } else { "postfix" };
        return Err(Fault::syntax_error(format!(
            "Invalid left-hand side expression in {} operation",
            side
        )));
    }
    Ok(Expr::Update {
        increment,
        prefix,
        target: Box::new(target),
    })
}

fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "let"
            | "const"
            | "var"
            | "function"
            | "if"
            | "else"
            | "while"
            | "for"
            | "return"
            | "throw"
            | "try"
            | "catch"
            | "finally"
            | "break"
            | "continue"
            | "new"
            | "typeof"
            | "true"
            | "false"
            | "null"
            | "export"
    )
}

fn describe_token(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("'{}'", super::value::format_number(*n)),
        TokenKind::Str(s) => format!("string \"{}\"", s),
        TokenKind::Template(_) => "template literal".to_string(),
        TokenKind::Ident(name) => format!("'{}'", name),
        TokenKind::Punct(p) => format!("'{}'", p),
        TokenKind::Eof => "end of input".to_string(),
    }
}
