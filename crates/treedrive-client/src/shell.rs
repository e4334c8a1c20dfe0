//! Interactive shell: command parsing and the local `ls`/`cd`/`pwd` helpers.

use std::path::{Path, PathBuf};

pub const HELP: &str = "Available commands: LOGIN <username>, PUSH <path>, GET <filename>, \
LIST, DELETE <filename>, ls [dir], cd [dir], pwd, EXIT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Push(PathBuf),
    Get(String),
    List,
    Delete(String),
    Ls(Option<PathBuf>),
    /// `None` or `~` goes to the home directory.
    Cd(Option<PathBuf>),
    Pwd,
    Help,
    Exit,
}

impl Command {
    /// Whether the command talks to the server on behalf of a user.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Command::Push(_) | Command::Get(_) | Command::Delete(_)
        )
    }
}

/// Parse one input line. `Ok(None)` for a blank line; `Err` carries the
/// usage text to show.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let arg = (!rest.is_empty()).then_some(rest);

    let command = match (verb.to_ascii_uppercase().as_str(), arg) {
        ("LOGIN", Some(name)) => Command::Login(name.into()),
        ("LOGIN", None) => return Err("Usage: LOGIN <username>".into()),
        ("PUSH", Some(path)) => Command::Push(PathBuf::from(path)),
        ("PUSH", None) => return Err("Usage: PUSH <path>".into()),
        ("GET", Some(name)) => Command::Get(name.into()),
        ("GET", None) => return Err("Usage: GET <filename>".into()),
        ("DELETE", Some(name)) => Command::Delete(name.into()),
        ("DELETE", None) => return Err("Usage: DELETE <filename>".into()),
        ("LIST", _) => Command::List,
        ("LS", dir) => Command::Ls(dir.map(PathBuf::from)),
        ("CD", dir) => Command::Cd(dir.map(PathBuf::from)),
        ("PWD", _) => Command::Pwd,
        ("HELP", _) => Command::Help,
        ("EXIT" | "QUIT", _) => Command::Exit,
        _ => return Err(format!("Invalid command. {HELP}")),
    };
    Ok(Some(command))
}

/// Listing of `dir`: directories first (suffixed with `/`), then files
/// with their sizes, each group sorted by name.
pub fn list_dir(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            dirs.push(name);
        } else if meta.is_file() {
            files.push((name, meta.len()));
        }
    }
    dirs.sort();
    files.sort();

    let lines = dirs
        .into_iter()
        .map(|d| format!("{d}/"))
        .chain(
            files
                .into_iter()
                .map(|(name, len)| format!("{name:<30} {:>10}", format_size(len))),
        )
        .collect();
    Ok(lines)
}

/// Resolve a `cd` target against `cwd`: no argument or `~` means home.
pub fn resolve_dir(cwd: &Path, target: Option<&Path>, home: Option<&Path>) -> PathBuf {
    match target {
        None => home.map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf()),
        Some(t) if t == Path::new("~") => {
            home.map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf())
        }
        Some(t) => cwd.join(t),
    }
}

/// Change the process working directory; relative PUSH paths and the
/// downloads directory resolve against it.
pub fn change_dir(dir: &Path) -> std::io::Result<PathBuf> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Not a directory: {}", dir.display()),
        ));
    }
    std::env::set_current_dir(dir)?;
    std::env::current_dir()
}

/// Human-readable byte count for listings.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbs_case_insensitive() {
        assert_eq!(
            parse_command("login alice").unwrap(),
            Some(Command::Login("alice".into()))
        );
        assert_eq!(
            parse_command("  Get  notes.txt ").unwrap(),
            Some(Command::Get("notes.txt".into()))
        );
        assert_eq!(parse_command("list").unwrap(), Some(Command::List));
        assert_eq!(parse_command("EXIT").unwrap(), Some(Command::Exit));
    }

    #[test]
    fn test_blank_and_missing_args() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("PUSH").unwrap_err(), "Usage: PUSH <path>");
        assert_eq!(parse_command("delete").unwrap_err(), "Usage: DELETE <filename>");
        assert!(parse_command("FROB x").unwrap_err().starts_with("Invalid command."));
    }

    #[test]
    fn test_push_keeps_spaces_in_path() {
        assert_eq!(
            parse_command("PUSH my file.txt").unwrap(),
            Some(Command::Push(PathBuf::from("my file.txt")))
        );
    }

    #[test]
    fn test_requires_login() {
        assert!(Command::Push("a".into()).requires_login());
        assert!(Command::Get("a".into()).requires_login());
        assert!(Command::Delete("a".into()).requires_login());
        assert!(!Command::List.requires_login());
        assert!(!Command::Login("a".into()).requires_login());
    }

    #[test]
    fn test_list_dir_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"xyz").unwrap();
        std::fs::create_dir(dir.path().join("z")).unwrap();
        let lines = list_dir(dir.path()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "z/");
        assert!(lines[1].starts_with("a.txt "));
        assert!(lines[1].ends_with("3 B"));
    }

    #[test]
    fn test_resolve_dir() {
        let cwd = Path::new("/srv/data");
        let home = Some(Path::new("/home/alice"));
        assert_eq!(resolve_dir(cwd, None, home), PathBuf::from("/home/alice"));
        assert_eq!(
            resolve_dir(cwd, Some(Path::new("~")), home),
            PathBuf::from("/home/alice")
        );
        assert_eq!(
            resolve_dir(cwd, Some(Path::new("in")), home),
            PathBuf::from("/srv/data/in")
        );
        assert_eq!(resolve_dir(cwd, None, None), PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_cd_without_argument() {
        assert_eq!(parse_command("cd").unwrap(), Some(Command::Cd(None)));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
