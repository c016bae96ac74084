//! Recursive-descent parser: tokens in, untyped [`crate::ast`] out.
//! Mirrors the shape of `glang/parse` (one function per grammar
//! production) without a parser-combinator crate, matching the rest of
//! the corpus's hand-rolled scanning/parsing idiom.

use crate::ast::*;
use crate::diag::Diagnostics;
use crate::lexer::{Lexer, TokKind, Token};
use crate::pos::Pos;

pub struct Parser {
    toks: Vec<Token>,
    idx: usize,
    pub diags: Diagnostics,
}

/// Parses a whole source file as a `package` declaration followed by
/// top-level declarations.
#[must_use]
pub fn parse_file(file: &str, src: &str) -> (File, Diagnostics) {
    let (toks, lex_errs) = Lexer::new(file, src).tokenize();
    let mut p = Parser { toks, idx: 0, diags: Diagnostics::new() };
    for (pos, msg) in lex_errs {
        p.diags.push(pos, msg);
    }
    let file_ast = p.parse_file();
    (file_ast, p.diags)
}

/// Parses a single bare function body (`-bare` mode, spec.md §9): the
/// whole input is the statements a `func main()`-shaped wrapper would
/// contain, with no surrounding `package`/`func` syntax.
#[must_use]
pub fn parse_bare_func(file: &str, src: &str) -> (Vec<Stmt>, Diagnostics) {
    let (toks, lex_errs) = Lexer::new(file, src).tokenize();
    let mut p = Parser { toks, idx: 0, diags: Diagnostics::new() };
    for (pos, msg) in lex_errs {
        p.diags.push(pos, msg);
    }
    let body = p.parse_stmt_list_until_eof();
    (body, p.diags)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.toks[self.idx]
    }

    fn peek_kind(&self) -> &TokKind {
        &self.toks[self.idx].kind
    }

    fn pos(&self) -> Pos {
        self.peek().pos.clone()
    }

    fn bump(&mut self) -> Token {
        let t = self.toks[self.idx].clone();
        if self.idx + 1 < self.toks.len() {
            self.idx += 1;
        }
        t
    }

    fn at(&self, kind: &TokKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokKind, what: &str) -> bool {
        if self.eat(kind) {
            true
        } else {
            let pos = self.pos();
            self.diags.push(pos, format!("expected {what}, found {:?}", self.peek_kind()));
            false
        }
    }

    fn expect_ident(&mut self, what: &str) -> String {
        if let TokKind::Ident(name) = self.peek_kind().clone() {
            self.bump();
            name
        } else {
            let pos = self.pos();
            self.diags.push(pos, format!("expected {what}, found {:?}", self.peek_kind()));
            String::new()
        }
    }

    /// Skips tokens until the start of the next declaration or statement,
    /// so one malformed construct doesn't cascade into spurious errors for
    /// everything after it.
    fn recover_to(&mut self, stoppers: &[TokKind]) {
        while !self.peek_kind().is_eof() {
            if stoppers.iter().any(|s| self.at(s)) {
                return;
            }
            self.bump();
        }
    }

    fn parse_file(&mut self) -> File {
        self.expect(&TokKind::KwPackage, "`package`");
        let pkg_name = self.expect_ident("package name");
        self.eat(&TokKind::Semi);

        let mut decls = Vec::new();
        while !self.peek_kind().is_eof() {
            match self.parse_decl() {
                Some(d) => decls.push(d),
                None => self.recover_to(&[TokKind::KwFunc, TokKind::KwVar, TokKind::KwConst, TokKind::KwStruct]),
            }
            self.eat(&TokKind::Semi);
        }
        File { pkg_name, decls }
    }

    fn parse_decl(&mut self) -> Option<Decl> {
        match self.peek_kind().clone() {
            TokKind::KwStruct => self.parse_struct().map(Decl::Struct),
            TokKind::KwConst => self.parse_const().map(Decl::Const),
            TokKind::KwVar => self.parse_var().map(Decl::Var),
            TokKind::KwFunc => self.parse_func_or_alias(),
            _ => {
                let pos = self.pos();
                self.diags.push(pos, format!("expected a declaration, found {:?}", self.peek_kind()));
                self.bump();
                None
            }
        }
    }

    fn parse_struct(&mut self) -> Option<StructDecl> {
        let pos = self.pos();
        self.bump(); // struct
        let name = self.expect_ident("struct name");
        self.expect(&TokKind::LBrace, "`{`");
        let mut fields = Vec::new();
        while !self.at(&TokKind::RBrace) && !self.peek_kind().is_eof() {
            let fname = self.expect_ident("field name");
            let ty = self.parse_type();
            fields.push(Field { name: fname, ty });
            self.eat(&TokKind::Semi);
        }
        self.expect(&TokKind::RBrace, "`}`");
        Some(StructDecl { name, fields, pos })
    }

    fn parse_const(&mut self) -> Option<ConstDecl> {
        let pos = self.pos();
        self.bump(); // const
        let name = self.expect_ident("const name");
        let ty = self.parse_type();
        self.expect(&TokKind::Assign, "`=`");
        let vpos = self.pos();
        let value = match self.peek_kind().clone() {
            TokKind::Int(v) => {
                self.bump();
                v
            }
            TokKind::Minus => {
                self.bump();
                match self.peek_kind().clone() {
                    TokKind::Int(v) => {
                        self.bump();
                        -v
                    }
                    _ => {
                        self.diags.push(vpos, "expected an integer literal");
                        0
                    }
                }
            }
            TokKind::Byte(b) => {
                self.bump();
                i64::from(b)
            }
            _ => {
                self.diags.push(vpos, "expected a constant integer literal");
                0
            }
        };
        Some(ConstDecl { name, ty, value, pos })
    }

    fn parse_var(&mut self) -> Option<VarDecl> {
        let pos = self.pos();
        self.bump(); // var
        let name = self.expect_ident("var name");
        let ty = self.parse_type();
        Some(VarDecl { name, ty, pos })
    }

    /// `func g = pkg.f` or `func [(recv *T)] name(params) [ret] { body }`.
    fn parse_func_or_alias(&mut self) -> Option<Decl> {
        let pos = self.pos();
        self.bump(); // func

        if self.at(&TokKind::LParen) {
            // `func (recv *T) name(...) ...`
            self.bump();
            let recv_name = self.expect_ident("receiver name");
            let recv_ty = self.parse_type();
            self.expect(&TokKind::RParen, "`)`");
            let name = self.expect_ident("method name");
            let is_test = false;
            let (params, ret, body) = self.parse_func_tail();
            return Some(Decl::Func(FuncDecl {
                name,
                receiver: Some(Param { name: recv_name, ty: recv_ty }),
                params,
                ret,
                body,
                is_test,
                pos,
            }));
        }

        let name = self.expect_ident("function name");
        if self.eat(&TokKind::Assign) {
            let of_pkg = self.expect_ident("aliased package");
            self.expect(&TokKind::Dot, "`.`");
            let of_name = self.expect_ident("aliased function");
            return Some(Decl::FuncAlias(FuncAliasDecl { name, of_pkg, of_name, pos }));
        }

        let is_test = name.starts_with("Test");
        let (params, ret, body) = self.parse_func_tail();
        Some(Decl::Func(FuncDecl {
            name,
            receiver: None,
            params,
            ret,
            body,
            is_test,
            pos,
        }))
    }

    fn parse_func_tail(&mut self) -> (Vec<Param>, Option<TypeExpr>, Vec<Stmt>) {
        self.expect(&TokKind::LParen, "`(`");
        let mut params = Vec::new();
        while !self.at(&TokKind::RParen) && !self.peek_kind().is_eof() {
            let pname = self.expect_ident("parameter name");
            let pty = self.parse_type();
            params.push(Param { name: pname, ty: pty });
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.expect(&TokKind::RParen, "`)`");

        let ret = if self.at(&TokKind::LBrace) {
            None
        } else {
            Some(self.parse_type())
        };

        let body = self.parse_block();
        (params, ret, body)
    }

    fn parse_type(&mut self) -> TypeExpr {
        let pos = self.pos();
        match self.peek_kind().clone() {
            TokKind::Star => {
                self.bump();
                let inner = self.parse_type();
                TypeExpr { kind: TypeExprKind::Pointer(Box::new(inner)), pos }
            }
            TokKind::LBracket => {
                self.bump();
                if self.eat(&TokKind::RBracket) {
                    let elem = self.parse_type();
                    TypeExpr { kind: TypeExprKind::Slice(Box::new(elem)), pos }
                } else {
                    let len = match self.peek_kind().clone() {
                        TokKind::Int(v) => {
                            self.bump();
                            v
                        }
                        _ => {
                            self.diags.push(self.pos(), "expected an array length");
                            0
                        }
                    };
                    self.expect(&TokKind::RBracket, "`]`");
                    let elem = self.parse_type();
                    TypeExpr { kind: TypeExprKind::Array { elem: Box::new(elem), len }, pos }
                }
            }
            TokKind::Ident(name) => {
                self.bump();
                TypeExpr { kind: TypeExprKind::Name(name), pos }
            }
            other => {
                self.diags.push(pos.clone(), format!("expected a type, found {other:?}"));
                TypeExpr { kind: TypeExprKind::Name("int".into()), pos }
            }
        }
    }

    fn parse_block(&mut self) -> Vec<Stmt> {
        self.expect(&TokKind::LBrace, "`{`");
        let mut stmts = Vec::new();
        while !self.at(&TokKind::RBrace) && !self.peek_kind().is_eof() {
            stmts.push(self.parse_stmt());
            self.eat(&TokKind::Semi);
        }
        self.expect(&TokKind::RBrace, "`}`");
        stmts
    }

    fn parse_stmt_list_until_eof(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.peek_kind().is_eof() {
            stmts.push(self.parse_stmt());
            self.eat(&TokKind::Semi);
        }
        stmts
    }

    fn parse_stmt(&mut self) -> Stmt {
        let pos = self.pos();
        match self.peek_kind().clone() {
            TokKind::KwVar => {
                self.bump();
                let name = self.expect_ident("variable name");
                let ty = if self.at(&TokKind::Assign) { None } else { Some(self.parse_type()) };
                let init = if self.eat(&TokKind::Assign) { Some(self.parse_expr()) } else { None };
                Stmt::VarDecl { name, ty, init, pos }
            }
            TokKind::KwReturn => {
                self.bump();
                let value = if self.at(&TokKind::Semi) || self.at(&TokKind::RBrace) {
                    None
                } else {
                    Some(self.parse_expr())
                };
                Stmt::Return { value, pos }
            }
            TokKind::KwIf => self.parse_if(),
            TokKind::KwFor => self.parse_for(),
            TokKind::LBrace => Stmt::Block(self.parse_block()),
            _ => self.parse_simple_stmt(),
        }
    }

    /// `name := expr`, `lhs = rhs`, or a bare expression statement (call).
    fn parse_simple_stmt(&mut self) -> Stmt {
        let pos = self.pos();
        let expr = self.parse_expr();
        if self.eat(&TokKind::Define) {
            let name = match &expr {
                Expr::Ident(n, _) => n.clone(),
                _ => {
                    self.diags.push(pos.clone(), "`:=` left-hand side must be a name");
                    String::new()
                }
            };
            let init = self.parse_expr();
            return Stmt::VarDecl { name, ty: None, init: Some(init), pos };
        }
        if self.eat(&TokKind::Assign) {
            let rhs = self.parse_expr();
            return Stmt::Assign { lhs: expr, rhs, pos };
        }
        Stmt::ExprStmt(expr)
    }

    fn parse_if(&mut self) -> Stmt {
        let pos = self.pos();
        self.bump(); // if
        let cond = self.parse_expr();
        let then_body = self.parse_block();
        let else_body = if self.eat(&TokKind::KwElse) {
            if self.at(&TokKind::KwIf) {
                vec![self.parse_if()]
            } else {
                self.parse_block()
            }
        } else {
            Vec::new()
        };
        Stmt::If { cond, then_body, else_body, pos }
    }

    /// `for {}`, `for cond {}`, or `for init; cond; iter {}`.
    fn parse_for(&mut self) -> Stmt {
        let pos = self.pos();
        self.bump(); // for

        if self.at(&TokKind::LBrace) {
            let body = self.parse_block();
            return Stmt::For { init: None, cond: None, iter: None, body, pos };
        }

        // Disambiguate `for cond {}` from `for init; cond; iter {}` by
        // scanning ahead for a `;` before the block's `{`.
        let has_clauses = self.scan_has_semi_before_brace();
        if !has_clauses {
            let cond = self.parse_expr();
            let body = self.parse_block();
            return Stmt::For { init: None, cond: Some(cond), iter: None, body, pos };
        }

        let init = if self.at(&TokKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt()))
        };
        self.expect(&TokKind::Semi, "`;`");
        let cond = if self.at(&TokKind::Semi) { None } else { Some(self.parse_expr()) };
        self.expect(&TokKind::Semi, "`;`");
        let iter = if self.at(&TokKind::LBrace) { None } else { Some(Box::new(self.parse_simple_stmt())) };
        let body = self.parse_block();
        Stmt::For { init, cond, iter, body, pos }
    }

    fn scan_has_semi_before_brace(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.idx;
        loop {
            match &self.toks[i].kind {
                TokKind::LParen | TokKind::LBracket => depth += 1,
                TokKind::RParen | TokKind::RBracket => depth -= 1,
                TokKind::Semi if depth == 0 => return true,
                TokKind::LBrace if depth == 0 => return false,
                TokKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
    }

    // Precedence climbing, lowest to highest: `|`, `^`, `&`, equality,
    // relational, additive, unary, postfix, primary.
    fn parse_expr(&mut self) -> Expr {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Expr {
        let mut lhs = self.parse_xor();
        while self.at(&TokKind::Pipe) {
            let pos = self.pos();
            self.bump();
            let rhs = self.parse_xor();
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), pos };
        }
        lhs
    }

    fn parse_xor(&mut self) -> Expr {
        let mut lhs = self.parse_and();
        while self.at(&TokKind::Caret) {
            let pos = self.pos();
            self.bump();
            let rhs = self.parse_and();
            lhs = Expr::Binary { op: BinOp::Xor, lhs: Box::new(lhs), rhs: Box::new(rhs), pos };
        }
        lhs
    }

    fn parse_and(&mut self) -> Expr {
        let mut lhs = self.parse_equality();
        while self.at(&TokKind::Amp) {
            let pos = self.pos();
            self.bump();
            let rhs = self.parse_equality();
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), pos };
        }
        lhs
    }

    fn parse_equality(&mut self) -> Expr {
        let mut lhs = self.parse_relational();
        loop {
            let op = match self.peek_kind() {
                TokKind::Eq => BinOp::Eq,
                TokKind::Ne => BinOp::Ne,
                _ => break,
            };
            let pos = self.pos();
            self.bump();
            let rhs = self.parse_relational();
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), pos };
        }
        lhs
    }

    fn parse_relational(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.peek_kind() {
                TokKind::Lt => BinOp::Lt,
                TokKind::Le => BinOp::Le,
                TokKind::Gt => BinOp::Gt,
                TokKind::Ge => BinOp::Ge,
                _ => break,
            };
            let pos = self.pos();
            self.bump();
            let rhs = self.parse_additive();
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), pos };
        }
        lhs
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.peek_kind() {
                TokKind::Plus => BinOp::Add,
                TokKind::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.pos();
            self.bump();
            let rhs = self.parse_unary();
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), pos };
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let pos = self.pos();
        match self.peek_kind() {
            TokKind::Minus => {
                self.bump();
                let e = self.parse_unary();
                Expr::Unary { op: UnOp::Neg, expr: Box::new(e), pos }
            }
            TokKind::Bang => {
                self.bump();
                let e = self.parse_unary();
                Expr::Unary { op: UnOp::Not, expr: Box::new(e), pos }
            }
            TokKind::Amp => {
                self.bump();
                let e = self.parse_unary();
                Expr::AddrOf { expr: Box::new(e), pos }
            }
            TokKind::Star => {
                self.bump();
                let e = self.parse_unary();
                Expr::Deref { expr: Box::new(e), pos }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut e = self.parse_primary();
        loop {
            let pos = self.pos();
            match self.peek_kind().clone() {
                TokKind::Dot => {
                    self.bump();
                    let name = self.expect_ident("field or method name");
                    e = Expr::Field { base: Box::new(e), name, pos };
                }
                TokKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    while !self.at(&TokKind::RParen) && !self.peek_kind().is_eof() {
                        args.push(self.parse_expr());
                        if !self.eat(&TokKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokKind::RParen, "`)`");
                    e = Expr::Call { func: Box::new(e), args, pos };
                }
                TokKind::LBracket => {
                    self.bump();
                    if self.eat(&TokKind::Colon) {
                        let hi = if self.at(&TokKind::RBracket) { None } else { Some(Box::new(self.parse_expr())) };
                        self.expect(&TokKind::RBracket, "`]`");
                        e = Expr::Slice { array: Box::new(e), lo: None, hi, pos };
                    } else {
                        let first = self.parse_expr();
                        if self.eat(&TokKind::Colon) {
                            let hi = if self.at(&TokKind::RBracket) { None } else { Some(Box::new(self.parse_expr())) };
                            self.expect(&TokKind::RBracket, "`]`");
                            e = Expr::Slice { array: Box::new(e), lo: Some(Box::new(first)), hi, pos };
                        } else {
                            self.expect(&TokKind::RBracket, "`]`");
                            e = Expr::Index { array: Box::new(e), index: Box::new(first), pos };
                        }
                    }
                }
                _ => break,
            }
        }
        e
    }

    fn parse_primary(&mut self) -> Expr {
        let pos = self.pos();
        match self.peek_kind().clone() {
            TokKind::Int(v) => {
                self.bump();
                Expr::IntLit(v, pos)
            }
            TokKind::Byte(b) => {
                self.bump();
                Expr::ByteLit(b, pos)
            }
            TokKind::KwTrue => {
                self.bump();
                Expr::BoolLit(true, pos)
            }
            TokKind::KwFalse => {
                self.bump();
                Expr::BoolLit(false, pos)
            }
            TokKind::Ident(name) => {
                self.bump();
                Expr::Ident(name, pos)
            }
            TokKind::LParen => {
                self.bump();
                let e = self.parse_expr();
                self.expect(&TokKind::RParen, "`)`");
                e
            }
            other => {
                self.diags.push(pos.clone(), format!("expected an expression, found {other:?}"));
                self.bump();
                Expr::IntLit(0, pos)
            }
        }
    }
}
