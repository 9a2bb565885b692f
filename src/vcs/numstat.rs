use super::VcsError;

/// One line of `git log --numstat` output.
///
/// Counts stay strings: binary files report `-` for both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub lines_added: String,
    pub lines_removed: String,
    pub path: String,
}

/// Parse `--numstat` output into one [`FileStat`] per changed file.
///
/// Each non-blank line is `<added>\t<removed>\t<path>`. Renames keep git's
/// `old => new` notation inside the path field.
pub fn parse_numstat(output: &str) -> Result<Vec<FileStat>, VcsError> {
    output
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut parts = line.splitn(3, '\t');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(added), Some(removed), Some(path)) => Ok(FileStat {
                    lines_added: added.to_string(),
                    lines_removed: removed.to_string(),
                    path: path.to_string(),
                }),
                _ => Err(VcsError::MalformedNumstat(line.to_string())),
            }
        })
        .collect()
}
