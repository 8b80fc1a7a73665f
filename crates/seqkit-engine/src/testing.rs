use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::ExecError;
use crate::runner::{Invocation, TwRunner};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Output(String),
    NotFound,
    Failed(String),
}

/// Records every invocation and answers from a table keyed by the joined args.
#[derive(Debug, Default)]
pub(crate) struct FakeRunner {
    replies: HashMap<String, Reply>,
    calls: RefCell<Vec<Invocation>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, args: &str, output: &str) -> Self {
        self.replies
            .insert(args.to_string(), Reply::Output(output.to_string()));
        self
    }

    pub(crate) fn reply_with(mut self, args: &str, reply: Reply) -> Self {
        self.replies.insert(args.to_string(), reply);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|invocation| invocation.args.join(" "))
            .collect()
    }

    pub(crate) fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub(crate) fn count(&self, args: &str) -> usize {
        self.calls().iter().filter(|call| *call == args).count()
    }
}

impl TwRunner for FakeRunner {
    fn execute(&self, invocation: &Invocation) -> Result<String, ExecError> {
        self.calls.borrow_mut().push(invocation.clone());
        let key = invocation.args.join(" ");
        match self.replies.get(&key) {
            None => Ok(String::new()),
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::NotFound) => Err(ExecError::ResourceNotFound {
                output: format!("ERROR: {key} not found"),
            }),
            Some(Reply::Failed(output)) => Err(ExecError::CommandFailed {
                output: output.clone(),
            }),
        }
    }
}
