//! Line-oriented operator console.

use std::io::{self, Write};

use async_trait::async_trait;
use fulfillment::Prompter;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Prompter that reads answers line by line and writes prompts to `out`.
pub struct LinePrompter<R, W> {
    lines: Lines<R>,
    out: W,
}

/// Prompter over the process's standard input and output.
pub type ConsolePrompter = LinePrompter<BufReader<Stdin>, io::Stdout>;

impl ConsolePrompter {
    pub fn stdio() -> Self {
        LinePrompter::new(BufReader::new(tokio::io::stdin()), io::stdout())
    }
}

impl<R: AsyncBufRead + Unpin, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

#[async_trait]
impl<R, W> Prompter for LinePrompter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.out, "{question} ")?;
        self.out.flush()?;
        let line = self.lines.next_line().await?;
        if line.is_none() {
            writeln!(self.out)?;
        }
        Ok(line)
    }

    fn say(&mut self, message: &str) {
        if let Err(e) = writeln!(self.out, "{message}") {
            tracing::warn!(error = %e, "failed to write to console");
        }
    }
}
