use nu_ansi_term::{Color, Style};
use reedline::{
    Highlighter, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    StyledText,
};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::{
    error::{syntax_error, Result},
    parser::{parse, render, Line},
    tokenizer::{tokenize, TokenType},
};

#[derive(Clone)]
pub struct REPLPrompt;

impl Prompt for REPLPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("basic")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("  ... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    List,
    New,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Empty,
    Command(Command),
    Stored(u32),
    Deleted(u32),
}

/// Program lines typed at the prompt, kept sorted by line number.
#[derive(Debug, Default)]
pub struct ProgramBuffer {
    lines: BTreeMap<u32, String>,
}

impl ProgramBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interprets one line of user input: a command, a numbered line to
    /// store, or a bare line number to delete.
    pub fn enter(&mut self, input: &str) -> Result<Entry> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Entry::Empty);
        }

        match trimmed.to_ascii_uppercase().as_str() {
            "RUN" => return Ok(Entry::Command(Command::Run)),
            "LIST" => return Ok(Entry::Command(Command::List)),
            "NEW" => return Ok(Entry::Command(Command::New)),
            _ => (),
        }

        let tokens = tokenize(trimmed)?;
        match tokens[0].token_type {
            TokenType::Number(n) if tokens[1].token_type == TokenType::EOF => {
                match u32::try_from(n) {
                    Ok(number) if number > 0 => {
                        self.lines.remove(&number);
                        Ok(Entry::Deleted(number))
                    }
                    _ => syntax_error("a line number between 1 and 4294967295", &tokens[0]),
                }
            }
            TokenType::Number(_) => {
                let mut lines = parse(&tokens)?;
                match lines.pop() {
                    Some(line) if lines.is_empty() => {
                        let number = line.number;
                        self.lines.insert(number, line.to_string());
                        Ok(Entry::Stored(number))
                    }
                    _ => syntax_error("a single program line", &tokens[0]),
                }
            }
            _ => syntax_error("a line number or RUN, LIST, NEW", &tokens[0]),
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn source(&self) -> String {
        self.lines.values().map(|line| format!("{}\n", line)).collect()
    }

    pub fn program(&self) -> Result<Vec<Line>> {
        let tokens = tokenize(&self.source())?;
        parse(&tokens)
    }

    pub fn listing(&self) -> Result<String> {
        Ok(render(&self.program()?))
    }
}

pub static KEYWORD_COLOR: Color = Color::LightBlue;
pub static LITERAL_COLOR: Color = Color::Yellow;
pub static COMMENT_COLOR: Color = Color::DarkGray;
pub static DEFAULT_COLOR: Color = Color::White;
pub static OPERATOR_COLOR: Color = Color::LightGray;

pub struct SyntaxHighlighter;

impl Highlighter for SyntaxHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled_text = StyledText::new();

        let tokens = match tokenize(line) {
            Ok(t) => t,
            Err(_) => {
                styled_text.push((Style::new().fg(DEFAULT_COLOR), line.to_string()));
                return styled_text;
            }
        };

        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(line.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let offsets: Vec<usize> = tokens
            .iter()
            .map(|token| line_starts[token.line - 1] + token.column)
            .collect();

        if let Some(&first) = offsets.first() {
            if first > 0 {
                styled_text.push((Style::new().fg(DEFAULT_COLOR), line[..first].to_string()));
            }
        }

        // Each token is colored up to where the next one starts
        for (i, token) in tokens.iter().enumerate() {
            let start = offsets[i];
            let end = offsets.get(i + 1).copied().unwrap_or(line.len());
            if start >= end {
                continue;
            }

            let color = match &token.token_type {
                // Keywords
                TokenType::Let
                | TokenType::Print
                | TokenType::Input
                | TokenType::If
                | TokenType::Then
                | TokenType::Goto
                | TokenType::Gosub
                | TokenType::Return
                | TokenType::End => KEYWORD_COLOR,
                // Literals
                TokenType::String(_) | TokenType::Number(_) => LITERAL_COLOR,
                TokenType::Rem(_) => COMMENT_COLOR,
                // Operators
                TokenType::LeftParen
                | TokenType::RightParen
                | TokenType::Comma
                | TokenType::Colon
                | TokenType::Plus
                | TokenType::Minus
                | TokenType::Star
                | TokenType::Slash
                | TokenType::Equal
                | TokenType::Greater
                | TokenType::Less
                | TokenType::NotEqual
                | TokenType::GreaterEqual
                | TokenType::LessEqual => OPERATOR_COLOR,
                // Everything else
                TokenType::Identifier(_) | TokenType::NewLine | TokenType::EOF => DEFAULT_COLOR,
            };

            styled_text.push((Style::new().fg(color), line[start..end].to_string()));
        }

        styled_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_store_and_list_in_line_order() -> Result<()> {
        let mut buffer = ProgramBuffer::new();
        assert_eq!(buffer.enter("20 PRINT A")?, Entry::Stored(20));
        assert_eq!(buffer.enter("10 LET A=1+2")?, Entry::Stored(10));
        assert_eq!(buffer.enter("   ")?, Entry::Empty);

        assert_eq!(buffer.source(), "10 LET A = 1 + 2\n20 PRINT A\n");
        assert_eq!(buffer.listing()?, buffer.source());
        assert_eq!(buffer.program()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_replace_and_delete() -> Result<()> {
        let mut buffer = ProgramBuffer::new();
        buffer.enter("10 PRINT 1")?;
        buffer.enter("10 PRINT 2")?;
        assert_eq!(buffer.source(), "10 PRINT 2\n");

        assert_eq!(buffer.enter("10")?, Entry::Deleted(10));
        assert!(buffer.is_empty());
        Ok(())
    }

    #[test]
    fn test_commands() -> Result<()> {
        let mut buffer = ProgramBuffer::new();
        assert_eq!(buffer.enter("run")?, Entry::Command(Command::Run));
        assert_eq!(buffer.enter(" LIST ")?, Entry::Command(Command::List));
        assert_eq!(buffer.enter("New")?, Entry::Command(Command::New));
        Ok(())
    }

    #[test]
    fn test_rejected_entries_leave_buffer_untouched() -> Result<()> {
        let mut buffer = ProgramBuffer::new();
        buffer.enter("10 END")?;

        assert!(matches!(buffer.enter("PRINT 1"), Err(Error::Syntax { .. })));
        assert!(matches!(buffer.enter("20 LET A"), Err(Error::Syntax { .. })));
        assert!(matches!(buffer.enter("20 PRINT a"), Err(Error::Lexical { .. })));
        assert!(matches!(buffer.enter("0"), Err(Error::Syntax { .. })));

        assert_eq!(buffer.source(), "10 END\n");
        Ok(())
    }

    #[test]
    fn test_highlight_covers_whole_line() {
        let line = "10 PRINT \"hi\", A: REM note";
        let styled = SyntaxHighlighter.highlight(line, 0);
        let text: String = styled.buffer.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(text, line);

        let keyword = styled
            .buffer
            .iter()
            .find(|(_, s)| s.trim() == "PRINT")
            .map(|(style, _)| style.foreground);
        assert_eq!(keyword, Some(Some(KEYWORD_COLOR)));
    }
}
