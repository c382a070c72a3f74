// Formula parser - converts formula source (without the leading '=') into an AST
// Supports: numbers, cell refs (A1), basic math (+, -, *, /), unary +/-, parentheses

use std::fmt;

use crate::position::Position;

/// Formula expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Cell reference. May be structurally out of bounds: such references
    /// stay in the AST and evaluate to `#REF!`, but are excluded from the
    /// formula's reference list.
    Ref(Position),
    Neg(Box<Expr>),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn symbol(&self) -> char {
        match self {
            Op::Add => '+',
            Op::Sub => '-',
            Op::Mul => '*',
            Op::Div => '/',
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
        }
    }
}

/// A parsed formula: the AST plus its deduplicated, sorted reference list.
///
/// Construction is the only fallible step; evaluation never fails
/// structurally (errors come back as `#REF!`/`#VALUE!`/`#DIV/0!` values).
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
    refs: Vec<Position>,
}

impl Formula {
    /// Parse formula source (the text after the leading `=`).
    pub fn parse(src: &str) -> Result<Formula, String> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err("empty formula".to_string());
        }
        let (expr, pos) = parse_add_sub(&tokens, 0)?;
        if pos != tokens.len() {
            return Err("unexpected trailing input".to_string());
        }

        let mut refs = Vec::new();
        collect_refs(&expr, &mut refs);
        refs.retain(|p| p.is_valid());
        refs.sort_unstable();
        refs.dedup();

        Ok(Formula { expr, refs })
    }

    /// The in-bounds positions this formula reads, sorted and deduplicated.
    pub fn referenced_positions(&self) -> &[Position] {
        &self.refs
    }

    /// Canonical expression text, reconstructed from the AST with minimal
    /// parentheses. Does not include the leading `=`.
    pub fn expression(&self) -> String {
        self.expr.to_string()
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

fn collect_refs(expr: &Expr, out: &mut Vec<Position>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Ref(pos) => out.push(*pos),
        Expr::Neg(inner) => collect_refs(inner, out),
        Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, out);
            collect_refs(right, out);
        }
    }
}

// =========================================================================
// Canonical printing
// =========================================================================

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0)
    }
}

/// Write `expr`, parenthesizing when its precedence is below what the
/// surrounding context requires.
fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, min_prec: u8) -> fmt::Result {
    match expr {
        Expr::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                write!(f, "{}", *n as i64)
            } else {
                write!(f, "{n}")
            }
        }
        Expr::Ref(pos) => write!(f, "{pos}"),
        Expr::Neg(inner) => {
            let parens = 3 < min_prec;
            if parens {
                f.write_str("(")?;
            }
            f.write_str("-")?;
            write_expr(f, inner, 3)?;
            if parens {
                f.write_str(")")?;
            }
            Ok(())
        }
        Expr::BinaryOp { op, left, right } => {
            let prec = op.precedence();
            let parens = prec < min_prec;
            if parens {
                f.write_str("(")?;
            }
            write_expr(f, left, prec)?;
            write!(f, "{}", op.symbol())?;
            // Subtraction and division are left-associative: the right
            // operand must bind strictly tighter to survive reprinting.
            let right_min = match op {
                Op::Sub | Op::Div => prec + 1,
                Op::Add | Op::Mul => prec,
            };
            write_expr(f, right, right_min)?;
            if parens {
                f.write_str(")")?;
            }
            Ok(())
        }
    }
}

// =========================================================================
// Tokenizer
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    CellRef(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            'A'..='Z' | 'a'..='z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match Position::parse_a1(&ident) {
                    Some(pos) => tokens.push(Token::CellRef(pos)),
                    None => return Err(format!("invalid cell reference: {ident}")),
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("unexpected character: {c}")),
        }
    }

    Ok(tokens)
}

// =========================================================================
// Recursive descent
// =========================================================================

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    match tokens.get(pos) {
        Some(Token::Minus) => {
            let (inner, new_pos) = parse_unary(tokens, pos + 1)?;
            Ok((Expr::Neg(Box::new(inner)), new_pos))
        }
        Some(Token::Plus) => parse_unary(tokens, pos + 1),
        _ => parse_primary(tokens, pos),
    }
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    match tokens.get(pos) {
        None => Err("unexpected end of expression".to_string()),
        Some(Token::Number(n)) => Ok((Expr::Number(*n), pos + 1)),
        Some(Token::CellRef(p)) => Ok((Expr::Ref(*p), pos + 1)),
        Some(Token::LParen) => {
            let (expr, new_pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(new_pos) {
                Some(Token::RParen) => Ok((expr, new_pos + 1)),
                _ => Err("expected closing parenthesis".to_string()),
            }
        }
        Some(other) => Err(format!("unexpected token: {other:?}")),
    }
}
