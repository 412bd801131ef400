use std::path::Path;

use tokenprobe_core::{Error, Result};

/// Read a newline-delimited list, skipping blank lines and `#` comments.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| Error::Input(format!("{}: {e}", path.display())))?;
    Ok(s.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_string())
        .collect())
}

/// The URL list a run is driven by. Order and duplicates are preserved.
pub fn read_links(path: &Path) -> Result<Vec<String>> {
    read_lines(path)
}

/// A saved model reply, read as-is for offline re-parsing.
pub fn read_reply(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Input(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_links_ignores_blanks_and_hash_comments() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
            # batch 1
            https://github.com/a/x

            https://github.com/b/y
            https://github.com/a/x
            "#
        )
        .unwrap();
        let got = read_links(f.path()).unwrap();
        assert_eq!(
            got,
            vec![
                "https://github.com/a/x".to_string(),
                "https://github.com/b/y".to_string(),
                "https://github.com/a/x".to_string(),
            ]
        );
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_links(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
        assert!(err.to_string().contains("nope.txt"));
    }
}
