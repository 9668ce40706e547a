use crate::{
    error::{syntax_error, Result},
    tokenizer::{Token, TokenType},
};
use log::debug;
use std::fmt::{self, Display, Formatter};

/// One of the 26 single-letter variables `A` through `Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(char);

impl Variable {
    pub fn new(name: char) -> Option<Variable> {
        name.is_ascii_uppercase().then_some(Variable(name))
    }

    pub fn name(self) -> char {
        self.0
    }

    pub fn index(self) -> usize {
        (self.0 as u8 - b'A') as usize
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: u32,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Let { variable: Variable, value: Expr },
    Print(Vec<PrintItem>),
    Input(Variable),
    If { condition: Cond, target: u32 },
    Goto(u32),
    Gosub(u32),
    Return,
    End,
    Rem(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintItem {
    String(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i64),
    Variable(Variable),
    Negate(Box<Expr>),
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Subtract => 1,
            BinaryOp::Multiply | BinaryOp::Divide => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cond {
    pub left: Expr,
    pub operator: RelOp,
    pub right: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        };
        write!(f, "{}", symbol)
    }
}

impl Display for RelOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            RelOp::Equal => "=",
            RelOp::NotEqual => "<>",
            RelOp::Less => "<",
            RelOp::Greater => ">",
            RelOp::LessEqual => "<=",
            RelOp::GreaterEqual => ">=",
        };
        write!(f, "{}", symbol)
    }
}

// Parenthesises only where re-parsing would otherwise associate differently.
impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Variable(v) => write!(f, "{}", v),
            Expr::Negate(operand) => match **operand {
                Expr::Binary { .. } => write!(f, "-({})", operand),
                _ => write!(f, "-{}", operand),
            },
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let precedence = operator.precedence();
                match &**left {
                    Expr::Binary { operator: inner, .. } if inner.precedence() < precedence => {
                        write!(f, "({})", left)?
                    }
                    _ => write!(f, "{}", left)?,
                }
                write!(f, " {} ", operator)?;
                match &**right {
                    Expr::Binary { operator: inner, .. } if inner.precedence() <= precedence => {
                        write!(f, "({})", right)
                    }
                    _ => write!(f, "{}", right),
                }
            }
        }
    }
}

impl Display for Cond {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)
    }
}

impl Display for PrintItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PrintItem::String(s) => write!(f, "\"{}\"", s),
            PrintItem::Expr(expr) => write!(f, "{}", expr),
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { variable, value } => write!(f, "LET {} = {}", variable, value),
            Statement::Print(items) => {
                write!(f, "PRINT ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Statement::Input(variable) => write!(f, "INPUT {}", variable),
            Statement::If { condition, target } => write!(f, "IF {} THEN {}", condition, target),
            Statement::Goto(target) => write!(f, "GOTO {}", target),
            Statement::Gosub(target) => write!(f, "GOSUB {}", target),
            Statement::Return => write!(f, "RETURN"),
            Statement::End => write!(f, "END"),
            Statement::Rem(text) if text.is_empty() => write!(f, "REM"),
            Statement::Rem(text) => write!(f, "REM {}", text),
        }
    }
}

impl Display for Line {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number)?;
        for (i, statement) in self.statements.iter().enumerate() {
            let separator = if i == 0 { " " } else { ": " };
            write!(f, "{}{}", separator, statement)?;
        }
        Ok(())
    }
}

/// Renders a program back to source text, one line per `Line`.
pub fn render(program: &[Line]) -> String {
    program.iter().map(|line| format!("{}\n", line)).collect()
}

/// Bound on expression nesting. Parentheses, unary minus and each chained
/// operator count one level.
pub const MAX_EXPR_DEPTH: usize = 256;

pub fn parse(tokens: &[Token]) -> Result<Vec<Line>> {
    assert!(
        tokens
            .last()
            .map_or(false, |t| t.token_type == TokenType::EOF),
        "Token slice must be terminated by EOF"
    );

    let mut consumed = 0;
    let mut lines = Vec::new();

    loop {
        match tokens[consumed].token_type {
            TokenType::EOF => break,
            // A stray comment or an empty line carries nothing to execute
            TokenType::Rem(_) | TokenType::NewLine => consumed += 1,
            _ => {
                let (line, line_consumed) = parse_line(&tokens[consumed..]).inspect_err(|err| {
                    debug!("{}", err);
                })?;
                lines.push(line);
                consumed += line_consumed;
            }
        }
    }

    Ok(lines)
}

fn parse_line(tokens: &[Token]) -> Result<(Line, usize)> {
    let (number, mut consumed) = parse_line_number(tokens, "line number")?;

    let (statements, statements_consumed) = parse_statement_list(&tokens[consumed..])?;
    consumed += statements_consumed;

    match tokens[consumed].token_type {
        TokenType::NewLine => consumed += 1,
        TokenType::EOF => (),
        _ => return syntax_error("end of line", &tokens[consumed]),
    }

    Ok((Line { number, statements }, consumed))
}

fn parse_line_number(tokens: &[Token], expected: &str) -> Result<(u32, usize)> {
    match tokens[0].token_type {
        TokenType::Number(n) => match u32::try_from(n) {
            Ok(number) if number > 0 => Ok((number, 1)),
            _ => syntax_error("a line number between 1 and 4294967295", &tokens[0]),
        },
        _ => syntax_error(expected, &tokens[0]),
    }
}

fn parse_statement_list(tokens: &[Token]) -> Result<(Vec<Statement>, usize)> {
    let (first, mut consumed) = parse_statement(tokens)?;
    let mut statements = vec![first];

    while tokens[consumed].token_type == TokenType::Colon {
        consumed += 1;
        let (statement, statement_consumed) = parse_statement(&tokens[consumed..])?;
        statements.push(statement);
        consumed += statement_consumed;
    }

    Ok((statements, consumed))
}

fn parse_statement(tokens: &[Token]) -> Result<(Statement, usize)> {
    match &tokens[0].token_type {
        TokenType::Let => parse_let(tokens),
        TokenType::Print => parse_print(tokens),
        TokenType::Input => {
            let (variable, consumed) = parse_variable(&tokens[1..], "a variable after INPUT")?;
            Ok((Statement::Input(variable), consumed + 1))
        }
        TokenType::If => parse_if(tokens),
        TokenType::Goto => {
            let (target, consumed) = parse_line_number(&tokens[1..], "a line number after GOTO")?;
            Ok((Statement::Goto(target), consumed + 1))
        }
        TokenType::Gosub => {
            let (target, consumed) =
                parse_line_number(&tokens[1..], "a line number after GOSUB")?;
            Ok((Statement::Gosub(target), consumed + 1))
        }
        TokenType::Return => Ok((Statement::Return, 1)),
        TokenType::End => Ok((Statement::End, 1)),
        TokenType::Rem(text) => Ok((Statement::Rem(text.clone()), 1)),
        _ => syntax_error("a statement", &tokens[0]),
    }
}

fn parse_variable(tokens: &[Token], expected: &str) -> Result<(Variable, usize)> {
    match tokens[0].token_type {
        TokenType::Identifier(name) => match Variable::new(name) {
            Some(variable) => Ok((variable, 1)),
            None => syntax_error(expected, &tokens[0]),
        },
        _ => syntax_error(expected, &tokens[0]),
    }
}

fn parse_let(tokens: &[Token]) -> Result<(Statement, usize)> {
    let mut consumed = 1; // Skip LET

    let (variable, variable_consumed) =
        parse_variable(&tokens[consumed..], "a variable after LET")?;
    consumed += variable_consumed;

    if tokens[consumed].token_type != TokenType::Equal {
        return syntax_error("'=' after variable", &tokens[consumed]);
    }
    consumed += 1;

    let (value, value_consumed) = parse_expr(&tokens[consumed..], 0)?;
    consumed += value_consumed;

    Ok((Statement::Let { variable, value }, consumed))
}

fn parse_print(tokens: &[Token]) -> Result<(Statement, usize)> {
    let mut consumed = 1; // Skip PRINT
    let mut items = Vec::new();

    loop {
        let (item, item_consumed) = parse_print_item(&tokens[consumed..])?;
        items.push(item);
        consumed += item_consumed;

        if tokens[consumed].token_type != TokenType::Comma {
            break;
        }
        consumed += 1;
    }

    Ok((Statement::Print(items), consumed))
}

fn parse_print_item(tokens: &[Token]) -> Result<(PrintItem, usize)> {
    match &tokens[0].token_type {
        TokenType::String(s) => Ok((PrintItem::String(s.clone()), 1)),
        TokenType::Number(_)
        | TokenType::Identifier(_)
        | TokenType::LeftParen
        | TokenType::Minus => {
            let (expr, consumed) = parse_expr(tokens, 0)?;
            Ok((PrintItem::Expr(expr), consumed))
        }
        _ => syntax_error("a string or expression to PRINT", &tokens[0]),
    }
}

fn parse_if(tokens: &[Token]) -> Result<(Statement, usize)> {
    let mut consumed = 1; // Skip IF

    let (condition, condition_consumed) = parse_cond(&tokens[consumed..])?;
    consumed += condition_consumed;

    if tokens[consumed].token_type != TokenType::Then {
        return syntax_error("THEN after condition", &tokens[consumed]);
    }
    consumed += 1;

    let (target, target_consumed) =
        parse_line_number(&tokens[consumed..], "a line number after THEN")?;
    consumed += target_consumed;

    Ok((Statement::If { condition, target }, consumed))
}

fn parse_cond(tokens: &[Token]) -> Result<(Cond, usize)> {
    let (left, mut consumed) = parse_expr(tokens, 0)?;

    let operator = match tokens[consumed].token_type {
        TokenType::Equal => RelOp::Equal,
        TokenType::NotEqual => RelOp::NotEqual,
        TokenType::Less => RelOp::Less,
        TokenType::Greater => RelOp::Greater,
        TokenType::LessEqual => RelOp::LessEqual,
        TokenType::GreaterEqual => RelOp::GreaterEqual,
        _ => return syntax_error("a relational operator", &tokens[consumed]),
    };
    consumed += 1;

    let (right, right_consumed) = parse_expr(&tokens[consumed..], 0)?;
    consumed += right_consumed;

    Ok((
        Cond {
            left,
            operator,
            right,
        },
        consumed,
    ))
}

fn parse_expr(tokens: &[Token], mut depth: usize) -> Result<(Expr, usize)> {
    let (mut left, mut consumed) = parse_term(tokens, depth)?;

    loop {
        let operator = match tokens[consumed].token_type {
            TokenType::Plus => BinaryOp::Add,
            TokenType::Minus => BinaryOp::Subtract,
            _ => break,
        };
        consumed += 1;

        // Each operator deepens the left spine of the tree
        depth += 1;
        if depth > MAX_EXPR_DEPTH {
            return syntax_error("a shallower expression", &tokens[consumed - 1]);
        }

        let (right, right_consumed) = parse_term(&tokens[consumed..], depth)?;
        consumed += right_consumed;

        left = Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        };
    }

    Ok((left, consumed))
}

fn parse_term(tokens: &[Token], mut depth: usize) -> Result<(Expr, usize)> {
    let (mut left, mut consumed) = parse_factor(tokens, depth)?;

    loop {
        let operator = match tokens[consumed].token_type {
            TokenType::Star => BinaryOp::Multiply,
            TokenType::Slash => BinaryOp::Divide,
            _ => break,
        };
        consumed += 1;

        // Each operator deepens the left spine of the tree
        depth += 1;
        if depth > MAX_EXPR_DEPTH {
            return syntax_error("a shallower expression", &tokens[consumed - 1]);
        }

        let (right, right_consumed) = parse_factor(&tokens[consumed..], depth)?;
        consumed += right_consumed;

        left = Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        };
    }

    Ok((left, consumed))
}

fn parse_factor(tokens: &[Token], depth: usize) -> Result<(Expr, usize)> {
    if depth > MAX_EXPR_DEPTH {
        return syntax_error("a shallower expression", &tokens[0]);
    }

    match tokens[0].token_type {
        TokenType::Number(n) => Ok((Expr::Number(n), 1)),
        TokenType::Identifier(_) => {
            let (variable, consumed) = parse_variable(tokens, "a variable")?;
            Ok((Expr::Variable(variable), consumed))
        }
        TokenType::Minus => {
            let (operand, consumed) = parse_factor(&tokens[1..], depth + 1)?;
            Ok((Expr::Negate(Box::new(operand)), consumed + 1))
        }
        TokenType::LeftParen => {
            let mut consumed = 1; // Skip '('

            let (expr, expr_consumed) = parse_expr(&tokens[consumed..], depth + 1)?;
            consumed += expr_consumed;

            if tokens[consumed].token_type != TokenType::RightParen {
                return syntax_error("')' after expression", &tokens[consumed]);
            }
            consumed += 1; // Skip ')'

            Ok((expr, consumed))
        }
        _ => syntax_error("an expression", &tokens[0]),
    }
}
