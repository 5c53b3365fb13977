//! Host doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use netconfig::runner::command_line;
use netconfig::{
    CommandOutput, CommandRunner, InterfaceFilter, Link, LinkSource, NetworkEngine, Platform, Result,
};

/// Answers from a table of full command lines; anything else fails to spawn.
#[derive(Default)]
pub struct TableRunner {
    answers: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

impl TableRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, line: &str, stdout: &str) -> Self {
        self.answers.insert(line.to_string(), CommandOutput::ok(stdout));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for TableRunner {
    fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        let line = command_line(program, args);
        self.calls.lock().unwrap().push(line.clone());
        self.answers.get(&line).cloned().unwrap_or_else(|| CommandOutput {
            spawn_error: Some(format!("no such program in test: {}", line)),
            ..Default::default()
        })
    }
}

pub struct FixedLinks(pub Vec<Link>);

impl LinkSource for FixedLinks {
    fn links(&self) -> Result<Vec<Link>> {
        Ok(self.0.clone())
    }
}

pub fn ethernet(name: &str) -> Link {
    Link {
        name: name.to_string(),
        mac_address: "00:11:22:33:44:55".to_string(),
        addresses: Vec::new(),
        is_up: true,
        is_loopback: false,
    }
}

pub fn engine(platform: Platform, runner: TableRunner, links: Vec<Link>) -> (NetworkEngine, Arc<TableRunner>) {
    let runner = Arc::new(runner);
    let engine = NetworkEngine::new(
        runner.clone(),
        Arc::new(FixedLinks(links)),
        platform,
        InterfaceFilter::default(),
    );
    (engine, runner)
}
