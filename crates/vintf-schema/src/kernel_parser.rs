//! Streaming parser for kernel `.config` text.
//!
//! Feed buffers with [`KernelConfigParser::process`] in any chunking, then call
//! [`KernelConfigParser::finish`] once to flush a trailing unterminated line.
//! Values stay raw; see [`KernelConfigTypedValue::infer`] for typing them.
//!
//! [`KernelConfigTypedValue::infer`]: crate::kernel::KernelConfigTypedValue::infer

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelConfigError {
    #[error("unrecognized line in configs: {0}")]
    UnrecognizedLine(String),
    #[error("duplicated key in configs: {0}")]
    DuplicateKey(String),
    #[error("key {0} is set but commented as not set")]
    SetButCommentedNotSet(String),
}

/// Every problem found in one parse, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfigErrors(pub Vec<KernelConfigError>);

impl KernelConfigErrors {
    pub fn first(&self) -> Option<&KernelConfigError> {
        self.0.first()
    }
}

impl fmt::Display for KernelConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for KernelConfigErrors {}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Record `# CONFIG_X is not set` as `CONFIG_X=n`.
    pub process_comments: bool,
    /// Trim whitespace around lines, keys and values; skip indented comments.
    pub relaxed_format: bool,
}

#[derive(Debug, Default)]
pub struct KernelConfigParser {
    options: ParserOptions,
    configs: BTreeMap<String, String>,
    remaining: String,
    errors: Vec<KernelConfigError>,
}

impl KernelConfigParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Consume a buffer. Returns the first error found in it, but keeps
    /// parsing the rest.
    pub fn process(&mut self, buf: &str) -> Result<(), KernelConfigError> {
        let before = self.errors.len();
        let mut rest = buf;
        while let Some(pos) = rest.find('\n') {
            self.remaining.push_str(&rest[..pos]);
            let line = std::mem::take(&mut self.remaining);
            self.process_line(&line);
            rest = &rest[pos + 1..];
        }
        self.remaining.push_str(rest);
        match self.errors.get(before) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Flush the last line and hand back the parsed map, or every error seen.
    pub fn finish(mut self) -> Result<BTreeMap<String, String>, KernelConfigErrors> {
        let line = std::mem::take(&mut self.remaining);
        self.process_line(&line);
        if self.errors.is_empty() {
            Ok(self.configs)
        } else {
            Err(KernelConfigErrors(self.errors))
        }
    }

    pub fn configs(&self) -> &BTreeMap<String, String> {
        &self.configs
    }

    pub fn errors(&self) -> &[KernelConfigError] {
        &self.errors
    }

    fn process_line(&mut self, raw: &str) {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let line = if self.options.relaxed_format {
            raw.trim()
        } else {
            raw
        };
        if line.is_empty() {
            return;
        }

        if let Some(comment) = line.strip_prefix('#') {
            if self.options.process_comments {
                if let Some(key) = not_set_key(comment) {
                    if self.configs.contains_key(key) {
                        self.errors
                            .push(KernelConfigError::SetButCommentedNotSet(key.to_owned()));
                    } else {
                        self.configs.insert(key.to_owned(), "n".to_owned());
                    }
                }
            }
            return;
        }

        let Some((key, value)) = line.split_once('=') else {
            self.errors
                .push(KernelConfigError::UnrecognizedLine(line.to_owned()));
            return;
        };
        let (key, value) = if self.options.relaxed_format {
            (key.trim(), value.trim())
        } else {
            (key, value)
        };
        // Strict keys are taken verbatim, whitespace included; only an empty key is refused.
        if key.is_empty() {
            self.errors
                .push(KernelConfigError::UnrecognizedLine(line.to_owned()));
            return;
        }
        if self.configs.contains_key(key) {
            self.errors
                .push(KernelConfigError::DuplicateKey(key.to_owned()));
            return;
        }
        self.configs.insert(key.to_owned(), value.to_owned());
    }
}

/// The key of an exact `# CONFIG_X is not set` comment, given the text after `#`.
fn not_set_key(comment: &str) -> Option<&str> {
    let key = comment.strip_prefix(' ')?.strip_suffix(" is not set")?;
    let valid = key.starts_with("CONFIG")
        && key.len() > "CONFIG".len()
        && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    valid.then_some(key)
}
