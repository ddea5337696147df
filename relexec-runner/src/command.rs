use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

/// Platform tag fixed when a runner is constructed. Decides how commands are
/// quoted for display and whether shell-string commands get a forced shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Any non-Windows host.
    Unix,
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }
}

/// A logical command: an argv-style token list or a single shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Argv(Vec<String>),
    Shell(String),
}

impl Command {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv(args.into_iter().map(Into::into).collect())
    }

    pub fn shell(script: impl Into<String>) -> Self {
        Self::Shell(script.into())
    }

    pub fn is_shell(&self) -> bool {
        matches!(self, Self::Shell(_))
    }

    /// Renders the command as a shell-safe string for logging and errors.
    ///
    /// Shell strings are used verbatim. Argv tokens use Windows command-line
    /// quoting on [`Platform::Windows`] and POSIX single-quote escaping
    /// elsewhere.
    pub fn display_string(&self, platform: Platform) -> String {
        match self {
            Self::Shell(script) => script.clone(),
            Self::Argv(args) => {
                let quote: fn(Cow<'_, str>) -> Cow<'_, str> = match platform {
                    Platform::Windows => shell_escape::windows::escape,
                    Platform::Unix => quote_unix,
                };
                args.iter()
                    .map(|arg| quote(Cow::Borrowed(arg.as_str())))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }
}

/// Tokens made only of these characters are printed bare on Unix.
fn is_unix_safe(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

fn quote_unix(token: Cow<'_, str>) -> Cow<'_, str> {
    if !token.is_empty() && token.chars().all(is_unix_safe) {
        token
    } else {
        shell_escape::unix::escape(token)
    }
}

impl From<Vec<String>> for Command {
    fn from(args: Vec<String>) -> Self {
        Self::Argv(args)
    }
}

impl From<Vec<&str>> for Command {
    fn from(args: Vec<&str>) -> Self {
        Self::argv(args)
    }
}

impl From<&[&str]> for Command {
    fn from(args: &[&str]) -> Self {
        Self::argv(args.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Command {
    fn from(args: [&str; N]) -> Self {
        Self::argv(args)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string(Platform::host()))
    }
}

/// Options applied only to shell-string invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    /// Shell executable forced for shell-string commands. `None` lets the
    /// backend use the host default.
    pub executable: Option<PathBuf>,
}

impl ShellOptions {
    pub const DEFAULT_UNIX_SHELL: &'static str = "/bin/bash";

    /// Windows gets no options; every other platform forces bash.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Windows => Self::default(),
            Platform::Unix => Self {
                executable: Some(PathBuf::from(Self::DEFAULT_UNIX_SHELL)),
            },
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.executable.is_none()
    }
}
