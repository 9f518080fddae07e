//! Turning `name=value` arguments and interactive answers into tool
//! arguments.

use std::io::{self, BufRead, Write};

use bridge::{Param, Signature, ToolWrapper};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Split `name=value` at the first `=`.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::InvalidArgument {
            argument: raw.to_string(),
            reason: "expected name=value".to_string(),
        }),
    }
}

/// Asks for parameter values on a line-oriented terminal.
pub struct Prompter<'a> {
    input: &'a mut dyn BufRead,
    output: &'a mut dyn Write,
}

impl<'a> Prompter<'a> {
    pub fn new(input: &'a mut dyn BufRead, output: &'a mut dyn Write) -> Self {
        Self { input, output }
    }

    /// Ask for one parameter until a usable answer arrives.
    ///
    /// Returns `None` when an optional parameter is left empty or input
    /// ends.
    pub fn ask(&mut self, param: &Param) -> io::Result<Option<Value>> {
        let requirement = if param.required { "required" } else { "optional" };
        loop {
            write!(self.output, "  {} ({}) ({requirement}): ", param.name, param.kind)?;
            if !param.description.is_empty() {
                write!(self.output, "- {} ", param.description)?;
            }
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }

            let answer = line.trim();
            if answer.is_empty() {
                if param.required {
                    writeln!(self.output, "    This parameter is required.")?;
                    continue;
                }
                return Ok(None);
            }

            match param.kind.parse(answer) {
                Some(value) => return Ok(Some(value)),
                None => writeln!(
                    self.output,
                    "    Invalid value for type '{}'. Please try again.",
                    param.kind
                )?,
            }
        }
    }
}

/// Build the argument map for `wrapper`, keyed by declared names.
///
/// Values are coerced to each parameter's declared type. Parameters left
/// out are asked for when a prompter is given; otherwise a missing required
/// parameter is an error. Keyword wrappers take JSON values where they
/// parse and plain strings otherwise.
pub fn collect_arguments(
    wrapper: &ToolWrapper,
    assignments: &[(String, String)],
    prompter: Option<&mut Prompter<'_>>,
) -> Result<Map<String, Value>> {
    let params = match wrapper.signature() {
        Signature::Keyword => return Ok(keyword_arguments(assignments)),
        Signature::Named(params) => params,
    };

    let mut arguments = Map::new();
    for (name, raw) in assignments {
        let param = wrapper.param(name).ok_or_else(|| Error::InvalidArgument {
            argument: name.clone(),
            reason: format!("{} has no such parameter", wrapper.name()),
        })?;
        let value = param.kind.parse(raw).ok_or_else(|| Error::InvalidArgument {
            argument: name.clone(),
            reason: format!("expected {}, got '{raw}'", param.kind),
        })?;
        arguments.insert(param.name.clone(), value);
    }

    let missing: Vec<&Param> = params
        .iter()
        .filter(|p| !arguments.contains_key(&p.name))
        .collect();

    match prompter {
        Some(prompter) => {
            for param in missing {
                match prompter.ask(param)? {
                    Some(value) => {
                        arguments.insert(param.name.clone(), value);
                    }
                    None if param.required => {
                        return Err(Error::MissingArgument {
                            name: param.name.clone(),
                        });
                    }
                    None => {}
                }
            }
        }
        None => {
            if let Some(param) = missing.into_iter().find(|p| p.required) {
                return Err(Error::MissingArgument {
                    name: param.name.clone(),
                });
            }
        }
    }

    Ok(arguments)
}

fn keyword_arguments(assignments: &[(String, String)]) -> Map<String, Value> {
    assignments
        .iter()
        .map(|(name, raw)| {
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            (name.clone(), value)
        })
        .collect()
}
