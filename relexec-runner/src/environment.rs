//! Environment mapping and composition helpers.
//!
//! A runner owns an [`EnvMap`] copied from a snapshot at construction; the
//! helpers here mutate that copy only and never the process environment.

use std::sync::LazyLock;

use hashbrown::HashMap;
use regex::Regex;

/// Variable name to value.
pub type EnvMap = HashMap<String, String>;

/// Separator used by the append/prepend helpers when none is given.
pub const DEFAULT_SEPARATOR: &str = " ";

/// Argument appended to the tool command to dump its environment.
pub const ENVIRONMENT_DUMP_ARGS: &str = "-E environment";

/// A line counts as an assignment when it starts with an identifier followed
/// by `=`. Everything after the first `=` is the value, `=` included.
static ASSIGNMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+=").expect("Failed to compile assignment regex"));

/// Copies the current process environment. Variables whose name or value is
/// not valid Unicode are skipped.
pub fn snapshot_process_env() -> EnvMap {
    std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Sets `name` unless `value` is `None`.
pub fn set_var(env: &mut EnvMap, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        env.insert(name.to_string(), value.to_string());
    }
}

/// Appends `separator + value` to a non-empty variable, or sets it to `value`.
pub fn append_var(env: &mut EnvMap, name: &str, value: &str, separator: &str) {
    match env.get_mut(name) {
        Some(current) if !current.is_empty() => {
            current.push_str(separator);
            current.push_str(value);
        }
        _ => {
            env.insert(name.to_string(), value.to_string());
        }
    }
}

/// Places `value + separator` in front of a non-empty variable, or sets it to
/// `value`.
pub fn prepend_var(env: &mut EnvMap, name: &str, value: &str, separator: &str) {
    match env.get_mut(name) {
        Some(current) if !current.is_empty() => {
            *current = format!("{value}{separator}{current}");
        }
        _ => {
            env.insert(name.to_string(), value.to_string());
        }
    }
}

/// One line of an environment dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpLine {
    Assignment { name: String, value: String },
    /// Anything that is not an assignment; echoed rather than parsed.
    Output(String),
}

/// Classifies each line of `<tool> -E environment` output.
///
/// The rule is deliberately permissive: a line matching `^\w+=` is split at
/// its first `=` after trimming surrounding whitespace, and every other line
/// is plain output.
pub fn parse_environment_dump(output: &str) -> Vec<DumpLine> {
    output
        .lines()
        .map(|line| {
            if ASSIGNMENT_LINE.is_match(line) {
                if let Some((name, value)) = line.trim().split_once('=') {
                    return DumpLine::Assignment {
                        name: name.to_string(),
                        value: value.to_string(),
                    };
                }
            }
            DumpLine::Output(line.to_string())
        })
        .collect()
}
