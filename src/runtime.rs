use crate::environment::Environment;
use crate::error::{runtime_error, Error, Result};
use crate::io::{Input, Output};
use crate::parser::{BinaryOp, Cond, Expr, Line, PrintItem, RelOp, Statement};
use log::{debug, trace, warn};
use std::collections::HashMap;

/// Deepest GOSUB nesting before a run is aborted.
pub const MAX_GOSUB_DEPTH: usize = 4096;

enum Flow {
    Next,
    Jump(usize),
    Halt,
}

/// Executes a parsed program. Jumps resolve through the line-number map,
/// fallthrough moves to the next line in program order.
pub struct Interpreter<'a> {
    program: &'a [Line],
    line_map: HashMap<u32, usize>,
    env: Environment,
    call_stack: Vec<usize>,
    cursor: usize,
    end_message: Option<String>,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a [Line]) -> Self {
        let mut line_map = HashMap::with_capacity(program.len());
        for (index, line) in program.iter().enumerate() {
            if line_map.insert(line.number, index).is_some() {
                warn!("line {} is defined more than once, the last one wins", line.number);
            }
        }

        Interpreter {
            program,
            line_map,
            env: Environment::new(),
            call_stack: Vec::new(),
            cursor: 0,
            end_message: None,
        }
    }

    /// Text emitted when an END statement stops the program.
    pub fn with_end_message(mut self, message: impl Into<String>) -> Self {
        self.end_message = Some(message.into());
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn run(&mut self, output: &mut dyn Output, input: &mut dyn Input) -> Result<()> {
        self.env = Environment::new();
        self.call_stack.clear();
        self.cursor = 0;

        debug!("running {} lines", self.program.len());

        while self.cursor < self.program.len() {
            match self.execute_line(output, input)? {
                Flow::Next => self.cursor += 1,
                Flow::Jump(index) => self.cursor = index,
                Flow::Halt => {
                    debug!("END in line {}", self.program[self.cursor].number);
                    return Ok(());
                }
            }
        }

        debug!("ran past the last line");
        Ok(())
    }

    fn execute_line(&mut self, output: &mut dyn Output, input: &mut dyn Input) -> Result<Flow> {
        let program = self.program;
        let line = &program[self.cursor];
        trace!("line {}", line.number);

        for statement in &line.statements {
            let flow = self
                .execute_statement(statement, output, input)
                .map_err(|err| match err {
                    Error::Runtime { message } => Error::Runtime {
                        message: format!("{} in line {}", message, line.number),
                    },
                    other => other,
                })?;

            if !matches!(flow, Flow::Next) {
                return Ok(flow);
            }
        }

        Ok(Flow::Next)
    }

    fn execute_statement(
        &mut self,
        statement: &Statement,
        output: &mut dyn Output,
        input: &mut dyn Input,
    ) -> Result<Flow> {
        match statement {
            Statement::Let { variable, value } => {
                let value = evaluate(value, &self.env)?;
                self.env.insert(*variable, value);
                Ok(Flow::Next)
            }
            Statement::Print(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        PrintItem::String(s) => rendered.push(s.clone()),
                        PrintItem::Expr(expr) => {
                            rendered.push(evaluate(expr, &self.env)?.to_string())
                        }
                    }
                }
                output.emit(&rendered.join(" "))?;
                Ok(Flow::Next)
            }
            Statement::Input(variable) => {
                let value = input.request(&format!("{}? ", variable))?;
                self.env.insert(*variable, value);
                Ok(Flow::Next)
            }
            Statement::If { condition, target } => {
                if evaluate_cond(condition, &self.env)? {
                    self.jump("IF", *target)
                } else {
                    Ok(Flow::Next)
                }
            }
            Statement::Goto(target) => self.jump("GOTO", *target),
            Statement::Gosub(target) => {
                if self.call_stack.len() >= MAX_GOSUB_DEPTH {
                    return runtime_error(format!(
                        "GOSUB nested deeper than {} levels",
                        MAX_GOSUB_DEPTH
                    ));
                }
                let flow = self.jump("GOSUB", *target)?;
                // Returns resume at the start of the following line
                self.call_stack.push(self.cursor + 1);
                Ok(flow)
            }
            Statement::Return => match self.call_stack.pop() {
                Some(index) => {
                    debug!(
                        "RETURN from line {} to index {}",
                        self.program[self.cursor].number, index
                    );
                    Ok(Flow::Jump(index))
                }
                None => runtime_error("unbalanced RETURN"),
            },
            Statement::End => {
                if let Some(message) = &self.end_message {
                    output.emit(message)?;
                }
                Ok(Flow::Halt)
            }
            Statement::Rem(_) => Ok(Flow::Next),
        }
    }

    fn jump(&self, keyword: &str, target: u32) -> Result<Flow> {
        match self.line_map.get(&target) {
            Some(&index) => {
                debug!(
                    "{} from line {} to line {}",
                    keyword, self.program[self.cursor].number, target
                );
                Ok(Flow::Jump(index))
            }
            None => runtime_error(format!("{} to undefined line {}", keyword, target)),
        }
    }
}

/// Runs `program` to completion with a fresh interpreter.
pub fn run(program: &[Line], output: &mut dyn Output, input: &mut dyn Input) -> Result<()> {
    Interpreter::new(program).run(output, input)
}

pub fn evaluate(expr: &Expr, env: &Environment) -> Result<i64> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Variable(variable) => Ok(env.get(*variable)),
        Expr::Negate(operand) => checked(evaluate(operand, env)?.checked_neg()),
        Expr::Binary {
            left,
            operator,
            right,
        } => {
            let left_val = evaluate(left, env)?;
            let right_val = evaluate(right, env)?;

            match operator {
                BinaryOp::Add => checked(left_val.checked_add(right_val)),
                BinaryOp::Subtract => checked(left_val.checked_sub(right_val)),
                BinaryOp::Multiply => checked(left_val.checked_mul(right_val)),
                BinaryOp::Divide => floor_divide(left_val, right_val),
            }
        }
    }
}

pub fn evaluate_cond(cond: &Cond, env: &Environment) -> Result<bool> {
    let left_val = evaluate(&cond.left, env)?;
    let right_val = evaluate(&cond.right, env)?;

    Ok(match cond.operator {
        RelOp::Equal => left_val == right_val,
        RelOp::NotEqual => left_val != right_val,
        RelOp::Less => left_val < right_val,
        RelOp::Greater => left_val > right_val,
        RelOp::LessEqual => left_val <= right_val,
        RelOp::GreaterEqual => left_val >= right_val,
    })
}

fn checked(value: Option<i64>) -> Result<i64> {
    match value {
        Some(value) => Ok(value),
        None => runtime_error("arithmetic overflow"),
    }
}

// Rounds toward negative infinity.
fn floor_divide(left: i64, right: i64) -> Result<i64> {
    if right == 0 {
        return runtime_error("division by zero");
    }

    let quotient = checked(left.checked_div(right))?;
    if left % right != 0 && (left < 0) != (right < 0) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ScriptedInput;
    use crate::parser::{parse, Variable};
    use crate::tokenizer::tokenize;

    fn run_capture(source: &str, responses: &[&str]) -> Result<(Result<()>, Vec<String>)> {
        let tokens = tokenize(source)?;
        let program = parse(&tokens)?;
        let mut output: Vec<String> = Vec::new();
        let mut input = ScriptedInput::new(responses.iter().copied());
        let result = run(&program, &mut output, &mut input);
        Ok((result, output))
    }

    fn run_str(source: &str) -> Result<Vec<String>> {
        let (result, output) = run_capture(source, &[])?;
        result?;
        Ok(output)
    }

    fn runtime_message(result: Result<()>) -> String {
        match result {
            Err(Error::Runtime { message }) => message,
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_let_and_print() -> Result<()> {
        assert_eq!(run_str("1 LET A=10\n2 PRINT A\n3 END\n")?, vec!["10"]);
        Ok(())
    }

    #[test]
    fn test_precedence() -> Result<()> {
        assert_eq!(
            run_str("1 LET A=5\n2 LET B=A*2+3\n3 PRINT B\n4 END\n")?,
            vec!["13"]
        );
        assert_eq!(run_str("1 PRINT (1+2)*3, 10-4-3, 2*-3\n")?, vec!["9 3 -6"]);
        Ok(())
    }

    #[test]
    fn test_floor_division() -> Result<()> {
        assert_eq!(run_str("1 LET A=7\n2 LET B=2\n3 PRINT A/B\n4 END\n")?, vec!["3"]);
        assert_eq!(
            run_str("1 PRINT -7/2, 7/-2, -7/-2, -6/2, 0/-5\n")?,
            vec!["-4 -4 3 -3 0"]
        );
        Ok(())
    }

    #[test]
    fn test_if_jumps_over_lines() -> Result<()> {
        assert_eq!(
            run_str("1 LET A=1\n2 IF A=1 THEN 4\n3 PRINT \"skipped\"\n4 PRINT \"done\"\n")?,
            vec!["done"]
        );
        Ok(())
    }

    #[test]
    fn test_false_if_falls_through_on_same_line() -> Result<()> {
        assert_eq!(
            run_str("1 IF A<>0 THEN 3: PRINT \"same line\"\n2 END\n3 PRINT \"jumped\"\n")?,
            vec!["same line"]
        );
        assert_eq!(
            run_str("1 IF A=0 THEN 3: PRINT \"same line\"\n2 END\n3 PRINT \"jumped\"\n")?,
            vec!["jumped"]
        );
        Ok(())
    }

    #[test]
    fn test_relational_operators() -> Result<()> {
        let source = "\
1 LET A=2
2 IF A<3 THEN 4
3 PRINT \"lt\"
4 IF A>=2 THEN 6
5 PRINT \"ge\"
6 IF A<=1 THEN 8
7 PRINT \"le\"
8 IF A>2 THEN 10
9 PRINT \"gt\"
10 END
";
        assert_eq!(run_str(source)?, vec!["le", "gt"]);
        Ok(())
    }

    #[test]
    fn test_gosub_returns_to_next_line() -> Result<()> {
        assert_eq!(
            run_str("1 GOSUB 3\n2 END\n3 PRINT \"sub\"\n4 RETURN\n")?,
            vec!["sub"]
        );
        Ok(())
    }

    #[test]
    fn test_gosub_mid_line_skips_rest_of_line() -> Result<()> {
        assert_eq!(
            run_str("1 GOSUB 4: PRINT \"not reached\"\n2 PRINT \"after\"\n3 END\n4 PRINT \"sub\": RETURN\n")?,
            vec!["sub", "after"]
        );
        Ok(())
    }

    #[test]
    fn test_nested_gosub() -> Result<()> {
        let source = "\
10 GOSUB 100
20 PRINT \"main\"
30 END
100 PRINT \"outer\"
110 GOSUB 200
120 RETURN
200 PRINT \"inner\"
210 RETURN
";
        assert_eq!(run_str(source)?, vec!["outer", "inner", "main"]);
        Ok(())
    }

    #[test]
    fn test_loop_with_goto() -> Result<()> {
        let source = "\
10 LET I=1
20 LET S=0
30 LET S=S+I
40 LET I=I+1
50 IF I<=10 THEN 30
60 PRINT \"sum\", S
";
        assert_eq!(run_str(source)?, vec!["sum 55"]);
        Ok(())
    }

    #[test]
    fn test_fallthrough_follows_program_order() -> Result<()> {
        // Line 10 falls through to line 5, the next line in source order
        assert_eq!(
            run_str("10 PRINT \"ten\"\n5 PRINT \"five\"\n20 END\n")?,
            vec!["ten", "five"]
        );
        Ok(())
    }

    #[test]
    fn test_unbound_variables_are_zero() -> Result<()> {
        assert_eq!(run_str("1 PRINT Q, Q+1\n")?, vec!["0 1"]);
        Ok(())
    }

    #[test]
    fn test_print_joins_items_with_spaces() -> Result<()> {
        assert_eq!(
            run_str("1 LET X=4\n2 PRINT \"X is\", X, \"and\", X*X\n")?,
            vec!["X is 4 and 16"]
        );
        Ok(())
    }

    #[test]
    fn test_rem_is_ignored() -> Result<()> {
        assert_eq!(
            run_str("1 REM nothing: PRINT 1\n2 PRINT 2: REM trailing\n")?,
            vec!["2"]
        );
        Ok(())
    }

    #[test]
    fn test_input() -> Result<()> {
        let tokens = tokenize("1 INPUT A\n2 INPUT B\n3 PRINT A+B\n")?;
        let program = parse(&tokens)?;
        let mut output: Vec<String> = Vec::new();
        let mut input = ScriptedInput::new(["20", "-5"]);

        let mut interpreter = Interpreter::new(&program);
        interpreter.run(&mut output, &mut input)?;

        assert_eq!(output, vec!["15"]);
        assert_eq!(input.prompts, vec!["A? ", "B? "]);
        let b = Variable::new('B').expect("valid variable name");
        assert_eq!(interpreter.environment().get(b), -5);
        Ok(())
    }

    #[test]
    fn test_input_rejects_non_integers() -> Result<()> {
        let (result, output) = run_capture("1 INPUT A\n2 PRINT A\n", &["1.5"])?;
        assert!(runtime_message(result).contains("expected an integer"));
        assert!(output.is_empty());

        let (result, _) = run_capture("1 INPUT A\n", &[])?;
        assert!(runtime_message(result).contains("no input available"));
        Ok(())
    }

    #[test]
    fn test_end_stops_and_emits_message() -> Result<()> {
        let tokens = tokenize("1 PRINT 1: END: PRINT 2\n2 PRINT 3\n")?;
        let program = parse(&tokens)?;
        let mut output: Vec<String> = Vec::new();

        Interpreter::new(&program)
            .with_end_message("Program ended.")
            .run(&mut output, &mut ScriptedInput::default())?;

        assert_eq!(output, vec!["1", "Program ended."]);
        Ok(())
    }

    #[test]
    fn test_division_by_zero() -> Result<()> {
        let (result, output) = run_capture("1 PRINT 1/0\n", &[])?;
        assert_eq!(runtime_message(result), "division by zero in line 1");
        assert!(output.is_empty());
        Ok(())
    }

    #[test]
    fn test_undefined_target() -> Result<()> {
        let (result, _) = run_capture("1 GOTO 99\n", &[])?;
        assert_eq!(runtime_message(result), "GOTO to undefined line 99 in line 1");

        let (result, _) = run_capture("1 GOSUB 5\n", &[])?;
        assert!(runtime_message(result).contains("undefined line 5"));

        let (result, _) = run_capture("1 IF 1=1 THEN 7\n", &[])?;
        assert!(runtime_message(result).contains("undefined line 7"));
        Ok(())
    }

    #[test]
    fn test_dangling_target_only_fails_when_reached() -> Result<()> {
        assert_eq!(run_str("1 IF 1=2 THEN 99\n2 PRINT \"ok\"\n")?, vec!["ok"]);
        Ok(())
    }

    #[test]
    fn test_unbalanced_return() -> Result<()> {
        let (result, output) = run_capture("1 PRINT \"a\"\n2 RETURN\n", &[])?;
        assert_eq!(runtime_message(result), "unbalanced RETURN in line 2");
        assert_eq!(output, vec!["a"]);
        Ok(())
    }

    #[test]
    fn test_runaway_gosub() -> Result<()> {
        let (result, _) = run_capture("1 GOSUB 1\n", &[])?;
        assert!(runtime_message(result).contains("GOSUB nested deeper"));
        Ok(())
    }

    #[test]
    fn test_overflow() -> Result<()> {
        let (result, _) = run_capture("1 LET A=9223372036854775807\n2 LET A=A+1\n", &[])?;
        assert_eq!(runtime_message(result), "arithmetic overflow in line 2");

        let (result, _) =
            run_capture("1 LET A=-9223372036854775807-1\n2 PRINT A/-1\n", &[])?;
        assert_eq!(runtime_message(result), "arithmetic overflow in line 2");
        Ok(())
    }

    #[test]
    fn test_duplicate_line_numbers_jump_to_last() -> Result<()> {
        assert_eq!(
            run_str("1 GOTO 5\n5 PRINT \"first\"\n6 END\n5 PRINT \"second\"\n")?,
            vec!["second"]
        );
        Ok(())
    }

    #[test]
    fn test_empty_program() -> Result<()> {
        assert!(run_str("")?.is_empty());
        Ok(())
    }
}
