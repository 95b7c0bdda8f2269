use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::constants::INVALID_ADDRESS;
use crate::error::{LoadError, MemoryError};
use crate::memory::{Page, empty_page};

/// Text of a program as handed to process creation.
///
/// The first non-empty line is the declared size; every following line is
/// one cell of the program, consumed `page_size` lines per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    name: String,
    text: String,
}

impl ProgramSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        ProgramSource { name: name.into(), text: text.into() }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| LoadError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(ProgramSource::new(path.display().to_string(), text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into the declared size and the body lines
    pub fn split(&self) -> Result<(usize, Vec<&str>), LoadError> {
        let mut lines = self.text.lines().skip_while(|line| line.trim().is_empty());
        let header = lines.next().ok_or(LoadError::MissingSize)?;
        let size = header
            .trim()
            .parse::<usize>()
            .map_err(|_| LoadError::InvalidSize(header.to_string()))?;
        Ok((size, lines.collect()))
    }
}

/// Cut program lines into pages, padding the last one with blank cells
pub fn paginate(lines: &[&str], page_size: usize) -> Vec<Page> {
    lines
        .chunks(page_size)
        .map(|chunk| {
            let mut page = empty_page(page_size);
            for (cell, line) in page.iter_mut().zip(chunk) {
                *cell = line.to_string();
            }
            page
        })
        .collect()
}

/// Read whitespace-separated virtual addresses; they stay textual because
/// their digit width is part of their meaning
pub fn read_virtual_addresses<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read input file {}", path.as_ref().display()))?;
    Ok(content.split_whitespace().map(str::to_string).collect())
}

/// Map a translation outcome to its output value
pub fn to_output(result: &Result<usize, MemoryError>) -> i64 {
    match result {
        Ok(pa) => *pa as i64,
        Err(_) => INVALID_ADDRESS,
    }
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[i64]) -> Result<()> {
    let output: Vec<String> = results.iter().map(|r| r.to_string()).collect();
    fs::write(path.as_ref(), output.join(" "))
        .with_context(|| format!("Failed to write output file {}", path.as_ref().display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_header_and_body() {
        let source = ProgramSource::new("p", "12\ncreate_console\nwrite_nl\n");
        let (size, body) = source.split().unwrap();
        assert_eq!(size, 12);
        assert_eq!(body, vec!["create_console", "write_nl"]);
    }

    #[test]
    fn test_leading_blank_lines_are_skipped() {
        let source = ProgramSource::new("p", "\n  \n 8 \nquit");
        let (size, body) = source.split().unwrap();
        assert_eq!(size, 8);
        assert_eq!(body, vec!["quit"]);
    }

    #[test]
    fn test_bad_headers() {
        assert_eq!(ProgramSource::new("p", "").split(), Err(LoadError::MissingSize));
        assert_eq!(
            ProgramSource::new("p", "twelve\nquit").split(),
            Err(LoadError::InvalidSize("twelve".to_string()))
        );
        assert!(matches!(
            ProgramSource::new("p", "-4\nquit").split(),
            Err(LoadError::InvalidSize(_))
        ));
    }

    #[test]
    fn test_blank_body_lines_are_cells() {
        let source = ProgramSource::new("p", "4\na\n\nb");
        let (_, body) = source.split().unwrap();
        assert_eq!(body, vec!["a", "", "b"]);
    }

    #[test]
    fn test_paginate_pads_last_page() {
        let pages = paginate(&["a", "b", "c", "d", "e", "f"], 4);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], vec!["a", "b", "c", "d"]);
        assert_eq!(pages[1], vec!["e", "f", "", ""]);
    }

    #[test]
    fn test_paginate_empty_body() {
        assert!(paginate(&[], 4).is_empty());
    }

    #[test]
    fn test_from_file_missing() {
        let err = ProgramSource::from_file("/nonexistent/simos/program").unwrap_err();
        assert!(matches!(err, LoadError::Unreadable { .. }));
    }

    #[test]
    fn test_address_file_round_trip() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("simos-input-{}.txt", std::process::id()));
        let output = dir.join(format!("simos-output-{}.txt", std::process::id()));

        fs::write(&input, "000 010\n  991\n").unwrap();
        assert_eq!(read_virtual_addresses(&input).unwrap(), vec!["000", "010", "991"]);

        write_results(&output, &[0, 4, -1]).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "0 4 -1");

        fs::remove_file(&input).unwrap();
        fs::remove_file(&output).unwrap();
    }

    #[test]
    fn test_to_output() {
        assert_eq!(to_output(&Ok(17)), 17);
        assert_eq!(to_output(&Err(MemoryError::NoFrame)), -1);
    }
}
