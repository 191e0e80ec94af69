//! Operator interaction.
//!
//! Prompts are only used to disambiguate selections and to confirm values;
//! none of the vault arithmetic depends on them. Operations receive an
//! [`Operator`] so tests can script the answers.

use crate::error::{VaultError, VaultResult};
use std::{
    cell::RefCell,
    collections::VecDeque,
    io::{self, BufRead, Write},
};

pub trait Operator {
    /// Non-negative integer; parse failures ask again
    fn prompt_int(&self, question: &str, default: u64) -> VaultResult<u64>;

    fn prompt_bool(&self, question: &str, default: bool) -> VaultResult<bool>;

    /// Non-empty string; `None` default means an answer is required
    fn prompt_string(&self, question: &str, default: Option<&str>) -> VaultResult<String>;

    /// Index into `options`
    fn choose(&self, question: &str, options: &[String]) -> VaultResult<usize>;
}

/// `y`, `yes`, `t`, `true` in any case
pub fn parse_bool(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "t" | "true"
    )
}

/// Interactive prompts on stdin/stdout
#[derive(Debug, Default)]
pub struct TerminalOperator;

impl TerminalOperator {
    fn read_line(&self, prompt: &str) -> VaultResult<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(VaultError::aborted("input closed"));
        }
        Ok(line.trim().to_string())
    }
}

impl Operator for TerminalOperator {
    fn prompt_int(&self, question: &str, default: u64) -> VaultResult<u64> {
        loop {
            let answer = self.read_line(&format!("{} ({}) ", question, default))?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.replace(['_', ','], "").parse::<u64>() {
                Ok(value) => return Ok(value),
                Err(_) => println!("⚠️  '{}' is not a non-negative integer", answer),
            }
        }
    }

    fn prompt_bool(&self, question: &str, default: bool) -> VaultResult<bool> {
        let hint = if default { "yes" } else { "no" };
        let answer = self.read_line(&format!("{} ({}) ", question, hint))?;
        if answer.is_empty() {
            return Ok(default);
        }
        Ok(parse_bool(&answer))
    }

    fn prompt_string(&self, question: &str, default: Option<&str>) -> VaultResult<String> {
        loop {
            let prompt = match default {
                Some(value) => format!("{} ({}) ", question, value),
                None => format!("{} ", question),
            };
            let answer = self.read_line(&prompt)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            if let Some(value) = default {
                return Ok(value.to_string());
            }
        }
    }

    fn choose(&self, question: &str, options: &[String]) -> VaultResult<usize> {
        if options.is_empty() {
            return Err(VaultError::invalid_input("nothing to choose from"));
        }
        println!("{}", question);
        for (index, option) in options.iter().enumerate() {
            println!("  ({}) {}", index, option);
        }
        loop {
            let answer = self.read_line("> ")?;
            match answer.parse::<usize>() {
                Ok(index) if index < options.len() => return Ok(index),
                _ => println!("⚠️  enter a number between 0 and {}", options.len() - 1),
            }
        }
    }
}

/// Canned answer for [`ScriptedOperator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Int(u64),
    Bool(bool),
    Text(String),
    Choice(usize),
    /// Take the prompt's default
    Default,
}

/// Replays queued answers; an empty queue answers with the default
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: RefCell<VecDeque<Answer>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    fn next(&self, question: &str) -> Answer {
        self.asked.borrow_mut().push(question.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or(Answer::Default)
    }
}

impl Operator for ScriptedOperator {
    fn prompt_int(&self, question: &str, default: u64) -> VaultResult<u64> {
        match self.next(question) {
            Answer::Int(value) => Ok(value),
            Answer::Default => Ok(default),
            other => Err(VaultError::invalid_input(format!(
                "scripted answer {:?} does not fit integer prompt {:?}",
                other, question
            ))),
        }
    }

    fn prompt_bool(&self, question: &str, default: bool) -> VaultResult<bool> {
        match self.next(question) {
            Answer::Bool(value) => Ok(value),
            Answer::Default => Ok(default),
            other => Err(VaultError::invalid_input(format!(
                "scripted answer {:?} does not fit boolean prompt {:?}",
                other, question
            ))),
        }
    }

    fn prompt_string(&self, question: &str, default: Option<&str>) -> VaultResult<String> {
        match (self.next(question), default) {
            (Answer::Text(value), _) => Ok(value),
            (Answer::Default, Some(value)) => Ok(value.to_string()),
            (other, _) => Err(VaultError::invalid_input(format!(
                "scripted answer {:?} does not fit string prompt {:?}",
                other, question
            ))),
        }
    }

    fn choose(&self, question: &str, _options: &[String]) -> VaultResult<usize> {
        match self.next(question) {
            Answer::Choice(index) => Ok(index),
            Answer::Default => Ok(0),
            other => Err(VaultError::invalid_input(format!(
                "scripted answer {:?} does not fit choice {:?}",
                other, question
            ))),
        }
    }
}
