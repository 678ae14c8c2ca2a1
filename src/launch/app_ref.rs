//! ASGI application references (`module:callable`)

use crate::error::{BerthError, BerthResult};
use std::fmt;

/// A validated `module:callable` reference, e.g. `app:app` or
/// `service.api.main:create_app`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRef {
    module: String,
    callable: String,
}

impl AppRef {
    /// Parse and validate a reference
    pub fn parse(reference: &str) -> BerthResult<Self> {
        let invalid = |reason: &str| BerthError::InvalidAppRef {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (module, callable) = reference
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' between module and callable"))?;

        if module.is_empty() {
            return Err(invalid("empty module"));
        }
        if callable.is_empty() {
            return Err(invalid("empty callable"));
        }
        if !module.split('.').all(is_identifier) {
            return Err(invalid("module must be a dotted path of identifiers"));
        }
        // uvicorn also accepts attribute paths after the colon (`app:api.router`)
        if !callable.split('.').all(is_identifier) {
            return Err(invalid("callable must be an identifier"));
        }

        Ok(Self {
            module: module.to_string(),
            callable: callable.to_string(),
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn callable(&self) -> &str {
        &self.callable
    }
}

impl fmt::Display for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.callable)
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}
