//! Styled terminal output.
//!
//! Uses `termcolor` and respects the `NO_COLOR` environment variable.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub fn color_choice() -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    fn tagged(&mut self, tag: &str, color: Color, text: &str) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(true);
        let _ = self.stdout.set_color(&spec);
        let _ = write!(self.stdout, "{} ", tag);
        let _ = self.stdout.reset();
        let _ = writeln!(self.stdout, "{}", text);
    }

    pub fn success(&mut self, text: &str) {
        self.tagged("[+]", Color::Green, text);
    }

    pub fn info(&mut self, text: &str) {
        self.tagged("[*]", Color::Cyan, text);
    }

    pub fn warn(&mut self, text: &str) {
        self.tagged("[!]", Color::Yellow, text);
    }

    pub fn error(&mut self, text: &str) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Red)).set_bold(true);
        let _ = self.stderr.set_color(&spec);
        let _ = write!(self.stderr, "[-] ");
        let _ = self.stderr.reset();
        let _ = writeln!(self.stderr, "{}", text);
    }

    pub fn plain(&mut self, text: &str) {
        let _ = writeln!(self.stdout, "{}", text);
    }
}
