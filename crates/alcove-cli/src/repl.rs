//! Interactive console loop over rustyline.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::output::StyledOutput;
use crate::parse::parse_line;
use crate::session::{Flow, Session};

pub fn run(mut session: Session, mut out: StyledOutput) -> Result<()> {
    out.info("alcove console; `help` lists commands, `exit` leaves");
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline(&session.prompt()) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                match parse_line(&line) {
                    Ok(Some(command)) => {
                        if let Flow::Exit = session.execute(command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => out.error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                out.error(&format!("input error: {}", e));
                break;
            }
        }
    }
    Ok(())
}

/// Run commands from a script file, stopping at the first parse error.
pub fn run_script(session: &mut Session, source: &str) -> Result<()> {
    for (number, line) in source.lines().enumerate() {
        let parsed =
            parse_line(line).map_err(|e| anyhow::anyhow!("line {}: {}", number + 1, e))?;
        if let Some(command) = parsed {
            if let Flow::Exit = session.execute(command) {
                break;
            }
        }
    }
    Ok(())
}
