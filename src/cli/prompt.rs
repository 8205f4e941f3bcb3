//! Line-oriented interactive prompts.

use std::io::{self, BufRead, StdinLock, Stdout, Write};

use console::style;

use crate::models::{Metadata, MetadataValue};

/// Reads answers from `input` and writes prompts to `output`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }

    /// Print a line that is not a question.
    pub fn say(&mut self, message: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }

    /// Ask once. `None` means the input is exhausted.
    pub fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask once; end of input reads as a blank answer.
    pub fn ask_line(&mut self, prompt: &str) -> io::Result<String> {
        Ok(self.ask(prompt)?.unwrap_or_default())
    }

    /// Yes/no question, defaulting to no.
    pub fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let answer = self.ask_line(&format!("{prompt} [y/N]: "))?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    /// Collect values until a blank entry.
    pub fn prompt_list(&mut self, label: &str) -> io::Result<Vec<String>> {
        self.say(style(format!("Enter {label} (blank to stop):")).cyan().bold())?;
        let mut items = Vec::new();
        loop {
            let value = self.ask_line("> ")?;
            if value.is_empty() {
                break;
            }
            items.push(value);
        }
        Ok(items)
    }

    /// Collect metadata objects.
    ///
    /// A blank first key ends collection entirely; a blank key after at least
    /// one pair closes the current object and starts the next.
    pub fn prompt_metadata_list(&mut self) -> io::Result<Vec<Metadata>> {
        self.say(
            style("Enter metadata objects (leave first key blank to stop):")
                .cyan()
                .bold(),
        )?;
        let mut list = Vec::new();

        loop {
            self.say(style("\nNew metadata object").yellow().bold())?;
            let first_key = self.ask_line(" key: ")?;
            if first_key.is_empty() {
                break;
            }

            let mut meta = Metadata::new();
            let value = self.ask_line(" value: ")?;
            meta.insert(first_key, MetadataValue::from_input(&value));

            loop {
                let key = self.ask_line(" key (blank to finish this object): ")?;
                if key.is_empty() {
                    break;
                }
                let value = self.ask_line(" value: ")?;
                meta.insert(key, MetadataValue::from_input(&value));
            }

            list.push(meta);
        }

        Ok(list)
    }

    pub fn prompt_queries(&mut self) -> io::Result<Vec<String>> {
        self.prompt_list("query texts")
    }

    /// Pick one of `options` by its 1-based index. `None` on blank input.
    pub fn select(&mut self, prompt: &str, options: &[String]) -> io::Result<Option<usize>> {
        for (i, option) in options.iter().enumerate() {
            self.say(format!("{} {}", style(format!("{}.", i + 1)).yellow().bold(), option))?;
        }
        loop {
            let answer = self.ask_line(&format!("{prompt}: "))?;
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => self.say(
                    style(format!("Enter a number between 1 and {}", options.len())).red(),
                )?,
            }
        }
    }
}
