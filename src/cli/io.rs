//! stdin/stdout handling
//!
//! A module without a path is read as one JSON document from stdin. Each
//! command answers with exactly one JSON response line on stdout.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// One response line
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response<'a> {
    Ok { data: Value },
    Error { code: &'a str, message: &'a str },
}

impl Response<'_> {
    /// Writes the response as a single line
    pub fn emit(&self) -> CliResult<()> {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer(&mut stdout, self)?;
        writeln!(stdout)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Reads a whole JSON document from stdin
pub fn read_request() -> CliResult<Value> {
    let mut content = String::new();
    io::stdin().lock().read_to_string(&mut content)?;

    if content.trim().is_empty() {
        return Err(CliError::Io("No query module on stdin".to_string()));
    }
    Ok(serde_json::from_str(&content)?)
}

pub fn write_text(text: &str) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_shapes() {
        let ok = Response::Ok { data: json!([1, 2]) };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "ok", "data": [1, 2]})
        );

        let error = Response::Error {
            code: "TQ_TYPE_MISMATCH",
            message: "bad",
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"status": "error", "code": "TQ_TYPE_MISMATCH", "message": "bad"})
        );
    }
}
