//! Interactive question loop (`localmind cli`).

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::answer::AnswerService;

/// Read questions from `input` until `exit`, `quit`, an empty line or EOF,
/// writing each answer and its sources to `output`.
///
/// A failed question is reported and the loop carries on.
pub async fn run_loop<R, W>(service: &AnswerService, mut input: R, output: &mut W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "Local QA bot. Type your question, or 'exit' to quit.")?;

    loop {
        write!(output, "\nYou: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty()
            || question.eq_ignore_ascii_case("exit")
            || question.eq_ignore_ascii_case("quit")
        {
            break;
        }

        writeln!(output, "Thinking...")?;
        let answer = match service.answer(question, None).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "question failed");
                writeln!(output, "Error: {}", e)?;
                continue;
            }
        };

        writeln!(output, "\nBot: {}", answer.text)?;
        writeln!(output, "\nSources (documents used):")?;
        for source in &answer.sources {
            writeln!(output, " - {} (chunk {})", source.doc_id, source.chunk_index)?;
        }
    }

    Ok(())
}
