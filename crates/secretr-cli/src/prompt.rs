//! Interactive credential prompts.

use std::io::{self, Write};

use secretr_core::config::Prompter;

/// Prompts on stderr and reads answers from stdin, so prompts never
/// contaminate the JSON written to stdout.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn visible(&mut self, label: &str) -> io::Result<String> {
        eprint!("{label}: ");
        io::stderr().flush()?;

        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        Ok(answer.trim_end_matches(['\r', '\n']).to_owned())
    }

    fn hidden(&mut self, label: &str) -> io::Result<String> {
        eprint!("{label}: ");
        io::stderr().flush()?;
        rpassword::read_password()
    }
}
