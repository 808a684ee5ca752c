//! Recursive-descent parser producing the expression AST.

use super::lexer::{Spanned, Token};

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// A comprehension clause: `for <target> in <iter> [if <condition>]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompClause {
    /// Bound names; more than one destructures array elements.
    pub target: Vec<String>,
    /// The iterable expression.
    pub iter: Box<Expr>,
    /// Optional filter.
    pub condition: Option<Box<Expr>>,
}

/// Expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Name(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Set(Vec<Expr>),
    Unary {
        negate: bool,
        operand: Box<Expr>,
    },
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logic {
        op: BoolOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Attr {
        object: Box<Expr>,
        name: String,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    ListComp {
        element: Box<Expr>,
        clause: CompClause,
    },
    SetComp {
        element: Box<Expr>,
        clause: CompClause,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        clause: CompClause,
    },
}

/// Parses a token stream into an expression.
///
/// # Errors
///
/// Returns a message and the byte offset where parsing failed.
pub fn parse(tokens: &[Spanned]) -> Result<Expr, (String, usize)> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if let Some(extra) = parser.peek() {
        return Err((
            format!("unexpected trailing '{}'", extra.token),
            extra.offset,
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&'a Token> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let spanned = self.tokens.get(self.pos);
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_token() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), (String, usize)> {
        match self.peek() {
            Some(spanned) if spanned.token == *expected => {
                self.pos += 1;
                Ok(())
            }
            Some(spanned) => Err((
                format!("expected '{expected}', found '{}'", spanned.token),
                spanned.offset,
            )),
            None => Err((format!("expected '{expected}', found end of expression"), self.end())),
        }
    }

    fn end(&self) -> usize {
        self.tokens.last().map_or(0, |s| s.offset)
    }

    fn unexpected_end(&self) -> (String, usize) {
        ("unexpected end of expression".to_string(), self.end())
    }

    fn expression(&mut self) -> Result<Expr, (String, usize)> {
        let value = self.or_expr()?;
        if self.eat(&Token::If) {
            let condition = self.or_expr()?;
            self.expect(&Token::Else)?;
            let otherwise = self.expression()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(value),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(value)
    }

    fn or_expr(&mut self) -> Result<Expr, (String, usize)> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Logic {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, (String, usize)> {
        let mut left = self.not_expr()?;
        while self.eat(&Token::And) {
            let right = self.not_expr()?;
            left = Expr::Logic {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, (String, usize)> {
        if self.eat(&Token::Not) {
            // `not in` is handled at the comparison level, so a bare `not`
            // here always negates.
            let operand = self.not_expr()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, (String, usize)> {
        let left = self.arith()?;
        let op = match self.peek_token() {
            Some(Token::Eq) => Some(CmpOp::Eq),
            Some(Token::Ne) => Some(CmpOp::Ne),
            Some(Token::Lt) => Some(CmpOp::Lt),
            Some(Token::Le) => Some(CmpOp::Le),
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Ge) => Some(CmpOp::Ge),
            Some(Token::In) => Some(CmpOp::In),
            Some(Token::Not) => {
                // Lookahead for `not in`.
                if self.tokens.get(self.pos + 1).map(|s| &s.token) == Some(&Token::In) {
                    self.pos += 1;
                    Some(CmpOp::NotIn)
                } else {
                    None
                }
            }
            _ => None,
        };
        let Some(op) = op else { return Ok(left) };
        self.pos += 1;
        let right = self.arith()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn arith(&mut self) -> Result<Expr, (String, usize)> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, (String, usize)> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, (String, usize)> {
        if self.eat(&Token::Minus) {
            let operand = self.factor()?;
            return Ok(Expr::Unary {
                negate: true,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Token::Plus) {
            return self.factor();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, (String, usize)> {
        let mut expr = self.primary()?;
        loop {
            match self.peek_token() {
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.identifier("attribute name")?;
                    expr = Expr::Attr {
                        object: Box::new(expr),
                        name,
                    };
                }
                Some(Token::LParen) => {
                    let Expr::Name(function) = expr else {
                        let offset = self.peek().map_or(0, |s| s.offset);
                        return Err(("only named functions can be called".to_string(), offset));
                    };
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if self.eat(&Token::Comma) {
                                if self.peek_token() == Some(&Token::RParen) {
                                    break;
                                }
                                continue;
                            }
                            break;
                        }
                        self.expect(&Token::RParen)?;
                    }
                    expr = Expr::Call { function, args };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn identifier(&mut self, what: &str) -> Result<String, (String, usize)> {
        match self.advance() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => Ok(name.clone()),
            Some(spanned) => Err((
                format!("expected {what}, found '{}'", spanned.token),
                spanned.offset,
            )),
            None => Err(self.unexpected_end()),
        }
    }

    fn primary(&mut self) -> Result<Expr, (String, usize)> {
        let Some(spanned) = self.advance() else {
            return Err(self.unexpected_end());
        };
        match &spanned.token {
            Token::Int(v) => Ok(Expr::Int(*v)),
            Token::Float(v) => Ok(Expr::Float(*v)),
            Token::Str(v) => Ok(Expr::Str(v.clone())),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Ident(name) => Ok(Expr::Name(name.clone())),
            Token::LParen => {
                let first = self.expression()?;
                if self.eat(&Token::Comma) {
                    // Tuple display; evaluates to a list.
                    let mut items = vec![first];
                    while self.peek_token() != Some(&Token::RParen) {
                        items.push(self.expression()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Expr::List(items))
                } else {
                    self.expect(&Token::RParen)?;
                    Ok(first)
                }
            }
            Token::LBracket => self.list_display(),
            Token::LBrace => self.brace_display(),
            other => Err((format!("unexpected '{other}'"), spanned.offset)),
        }
    }

    fn list_display(&mut self) -> Result<Expr, (String, usize)> {
        if self.eat(&Token::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.expression()?;
        if self.peek_token() == Some(&Token::For) {
            let clause = self.comp_clause()?;
            self.expect(&Token::RBracket)?;
            return Ok(Expr::ListComp {
                element: Box::new(first),
                clause,
            });
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek_token() == Some(&Token::RBracket) {
                break;
            }
            items.push(self.expression()?);
        }
        self.expect(&Token::RBracket)?;
        Ok(Expr::List(items))
    }

    fn brace_display(&mut self) -> Result<Expr, (String, usize)> {
        if self.eat(&Token::RBrace) {
            return Ok(Expr::Dict(Vec::new()));
        }
        let first = self.expression()?;
        if self.eat(&Token::Colon) {
            let value = self.expression()?;
            if self.peek_token() == Some(&Token::For) {
                let clause = self.comp_clause()?;
                self.expect(&Token::RBrace)?;
                return Ok(Expr::DictComp {
                    key: Box::new(first),
                    value: Box::new(value),
                    clause,
                });
            }
            let mut entries = vec![(first, value)];
            while self.eat(&Token::Comma) {
                if self.peek_token() == Some(&Token::RBrace) {
                    break;
                }
                let key = self.expression()?;
                self.expect(&Token::Colon)?;
                let value = self.expression()?;
                entries.push((key, value));
            }
            self.expect(&Token::RBrace)?;
            return Ok(Expr::Dict(entries));
        }
        if self.peek_token() == Some(&Token::For) {
            let clause = self.comp_clause()?;
            self.expect(&Token::RBrace)?;
            return Ok(Expr::SetComp {
                element: Box::new(first),
                clause,
            });
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek_token() == Some(&Token::RBrace) {
                break;
            }
            items.push(self.expression()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::Set(items))
    }

    fn comp_clause(&mut self) -> Result<CompClause, (String, usize)> {
        self.expect(&Token::For)?;
        let mut target = vec![self.identifier("loop variable")?];
        while self.eat(&Token::Comma) {
            target.push(self.identifier("loop variable")?);
        }
        self.expect(&Token::In)?;
        let iter = self.or_expr()?;
        let condition = if self.eat(&Token::If) {
            Some(Box::new(self.or_expr()?))
        } else {
            None
        };
        Ok(CompClause {
            target,
            iter: Box::new(iter),
            condition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lexer::tokenize;

    fn parse_str(source: &str) -> Expr {
        parse(&tokenize(source).unwrap()).unwrap()
    }

    fn parse_err(source: &str) -> String {
        parse(&tokenize(source).unwrap()).unwrap_err().0
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_str("1 + 2 * 3");
        match expr {
            Expr::Binary {
                op: BinOp::Add,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. })),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_comparison_binds_looser_than_arith() {
        let expr = parse_str("a + 1 == b");
        assert!(matches!(expr, Expr::Compare { op: CmpOp::Eq, .. }));
    }

    #[test]
    fn test_not_in() {
        let expr = parse_str("'x' not in names");
        assert!(matches!(expr, Expr::Compare { op: CmpOp::NotIn, .. }));
    }

    #[test]
    fn test_conditional() {
        let expr = parse_str("'big' if n > 10 else 'small'");
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse_str("user.roles[0]");
        match expr {
            Expr::Index { object, .. } => {
                assert!(matches!(*object, Expr::Attr { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_call_with_args() {
        let expr = parse_str("min(3, 1, 2)");
        match expr {
            Expr::Call { function, args } => {
                assert_eq!(function, "min");
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_only_named_callables() {
        assert!(parse_err("[1][0](2)").contains("named functions"));
    }

    #[test]
    fn test_parenthesized_name_is_still_callable() {
        let expr = parse_str("(len)([1])");
        assert!(matches!(expr, Expr::Call { ref function, .. } if function == "len"));
    }

    #[test]
    fn test_list_and_dict_literals() {
        assert_eq!(
            parse_str("[1, 2, 3]"),
            Expr::List(vec![Expr::Int(1), Expr::Int(2), Expr::Int(3)])
        );
        let expr = parse_str("{'a': 1}");
        assert!(matches!(expr, Expr::Dict(entries) if entries.len() == 1));
        let expr = parse_str("{1, 2}");
        assert!(matches!(expr, Expr::Set(items) if items.len() == 2));
        assert_eq!(parse_str("{}"), Expr::Dict(Vec::new()));
    }

    #[test]
    fn test_tuple_display() {
        let expr = parse_str("(1, 2)");
        assert!(matches!(expr, Expr::List(items) if items.len() == 2));
    }

    #[test]
    fn test_list_comprehension() {
        let expr = parse_str("[x * 2 for x in xs if x > 0]");
        match expr {
            Expr::ListComp { clause, .. } => {
                assert_eq!(clause.target, vec!["x".to_string()]);
                assert!(clause.condition.is_some());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_dict_comprehension_with_destructuring() {
        let expr = parse_str("{k: v for k, v in pairs}");
        match expr {
            Expr::DictComp { clause, .. } => {
                assert_eq!(clause.target, vec!["k".to_string(), "v".to_string()]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_set_comprehension() {
        let expr = parse_str("{x for x in xs}");
        assert!(matches!(expr, Expr::SetComp { .. }));
    }

    #[test]
    fn test_conditional_element_in_comprehension() {
        let expr = parse_str("[x if x > 0 else 0 for x in xs]");
        match expr {
            Expr::ListComp { element, .. } => {
                assert!(matches!(*element, Expr::Conditional { .. }));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_err("1 2").contains("trailing"));
    }

    #[test]
    fn test_unbalanced_bracket() {
        assert!(parse(&tokenize("[1, 2").unwrap()).is_err());
    }
}
