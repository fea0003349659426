use std::path::PathBuf;

/// Placeholder replaced by the test id in generated test file names
pub const TEST_PLACEHOLDER: &str = "$%test%$";

/// Split a command line into argv the way a shell would group words.
///
/// Single and double quotes group characters (the other quote is literal
/// inside), whitespace outside quotes separates tokens. No escapes and no
/// expansion; the result is handed straight to exec, never to a shell.
pub fn split_command(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    // An unterminated quote still yields what was collected
    if in_token {
        tokens.push(current);
    }

    tokens
}

/// Human readable memory amount, input in megabytes
pub fn format_memory(memory_mb: f64) -> String {
    let bytes = memory_mb * 1024.0 * 1024.0;
    if bytes > 1024.0 * 1024.0 {
        format!("{:.3}MB", memory_mb)
    } else if bytes > 1024.0 {
        format!("{:.3}KB", bytes / 1024.0)
    } else {
        format!("{}B", bytes.round() as u64)
    }
}

/// Path of a persisted test derived from a naming template
pub fn test_file_path(template: &str, test_id: u64) -> PathBuf {
    PathBuf::from(template.replace(TEST_PLACEHOLDER, &test_id.to_string()))
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            match std::env::var_os("HOME") {
                Some(home) => {
                    let mut expanded = PathBuf::from(home);
                    let rest = rest.trim_start_matches('/');
                    if !rest.is_empty() {
                        expanded.push(rest);
                    }
                    expanded
                }
                None => PathBuf::from(path),
            }
        }
        _ => PathBuf::from(path),
    }
}
