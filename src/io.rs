use crate::error::{runtime_error, Result};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Receives each line a PRINT statement produces.
pub trait Output {
    fn emit(&mut self, line: &str) -> Result<()>;
}

/// Supplies the integer an INPUT statement asks for.
pub trait Input {
    fn request(&mut self, prompt: &str) -> Result<i64>;
}

/// Strict integer coercion shared by every text-backed input source.
pub fn parse_integer(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    match trimmed.parse() {
        Ok(value) => Ok(value),
        Err(_) => runtime_error(format!("expected an integer, got {:?}", trimmed)),
    }
}

pub struct StdoutOutput;

impl Output for StdoutOutput {
    fn emit(&mut self, line: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}

pub struct StdinInput;

impl Input for StdinInput {
    fn request(&mut self, prompt: &str) -> Result<i64> {
        // Print the prompt and flush stdout to ensure it appears before input
        print!("{}", prompt);
        io::stdout().flush()?;

        read_integer(&mut io::stdin().lock(), prompt)
    }
}

/// Reads one line from `reader` and coerces it strictly to an integer. A
/// line that cannot be read as text counts as bad input, not an I/O failure.
pub fn read_integer<R: BufRead>(reader: &mut R, prompt: &str) -> Result<i64> {
    let mut input = String::new();
    match reader.read_line(&mut input) {
        Ok(0) => runtime_error(format!("no input available for prompt {:?}", prompt.trim())),
        Ok(_) => parse_integer(&input),
        Err(err) => runtime_error(format!(
            "unreadable input for prompt {:?}: {}",
            prompt.trim(),
            err
        )),
    }
}

impl Output for Vec<String> {
    fn emit(&mut self, line: &str) -> Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Answers INPUT requests from a fixed queue of responses, remembering the
/// prompts it was shown.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    responses: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedInput {
            responses: responses.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }
}

impl Input for ScriptedInput {
    fn request(&mut self, prompt: &str) -> Result<i64> {
        self.prompts.push(prompt.to_string());
        match self.responses.pop_front() {
            Some(response) => parse_integer(&response),
            None => runtime_error(format!("no input available for prompt {:?}", prompt.trim())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    #[test]
    fn test_parse_integer() -> Result<()> {
        assert_eq!(parse_integer("42")?, 42);
        assert_eq!(parse_integer("  -7\n")?, -7);
        assert!(matches!(parse_integer("3.5"), Err(Error::Runtime { .. })));
        assert!(matches!(parse_integer("abc"), Err(Error::Runtime { .. })));
        assert!(matches!(parse_integer(""), Err(Error::Runtime { .. })));
        Ok(())
    }

    #[test]
    fn test_read_integer() -> Result<()> {
        let mut reader = Cursor::new(&b"12\n-3\n"[..]);
        assert_eq!(read_integer(&mut reader, "A? ")?, 12);
        assert_eq!(read_integer(&mut reader, "B? ")?, -3);
        assert!(matches!(
            read_integer(&mut reader, "C? "),
            Err(Error::Runtime { .. })
        ));

        let mut reader = Cursor::new(&b"\xff\xfe\n"[..]);
        assert!(matches!(
            read_integer(&mut reader, "A? "),
            Err(Error::Runtime { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_scripted_input() -> Result<()> {
        let mut input = ScriptedInput::new(["1", " 2 "]);
        assert_eq!(input.request("A? ")?, 1);
        assert_eq!(input.request("B? ")?, 2);
        assert!(input.request("C? ").is_err());
        assert_eq!(input.prompts, vec!["A? ", "B? ", "C? "]);
        Ok(())
    }

    #[test]
    fn test_vec_output() -> Result<()> {
        let mut output: Vec<String> = Vec::new();
        output.emit("one")?;
        output.emit("two")?;
        assert_eq!(output, vec!["one".to_string(), "two".to_string()]);
        Ok(())
    }
}
