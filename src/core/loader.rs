// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Injectable sources for included text and binary files.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

/// Reads whole binary files for `.binary`.
pub trait FileReader {
    fn read_all_bytes(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Opens source text for the main file and `.include`.
pub trait StreamFactory {
    fn get_stream(&self, name: &str) -> io::Result<Box<dyn BufRead>>;
}

/// Reads from the file system, trying the name as given and then each
/// include path in order.
#[derive(Debug, Default, Clone)]
pub struct FsLoader {
    include_paths: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        if direct.is_relative() {
            if let Some(found) = self
                .include_paths
                .iter()
                .map(|dir| dir.join(name))
                .find(|candidate| candidate.is_file())
            {
                return Ok(found);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("file not found: {name}"),
        ))
    }
}

impl FileReader for FsLoader {
    fn read_all_bytes(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path)?)
    }
}

impl StreamFactory for FsLoader {
    fn get_stream(&self, name: &str) -> io::Result<Box<dyn BufRead>> {
        let file = File::open(self.resolve(name)?)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// In-memory files keyed by name.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.to_string(), contents.into());
    }

    fn get(&self, name: &str) -> io::Result<&[u8]> {
        self.files
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("file not found: {name}")))
    }
}

impl FileReader for MemoryLoader {
    fn read_all_bytes(&self, path: &str) -> io::Result<Vec<u8>> {
        self.get(path).map(<[u8]>::to_vec)
    }
}

impl StreamFactory for MemoryLoader {
    fn get_stream(&self, name: &str) -> io::Result<Box<dyn BufRead>> {
        Ok(Box::new(Cursor::new(self.get(name)?.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_loader_serves_text_and_bytes() {
        let loader = MemoryLoader::new()
            .with_file("main.asm", "nop\nrts\n")
            .with_file("font.bin", vec![1u8, 2, 3]);
        let lines: Vec<String> = loader
            .get_stream("main.asm")
            .unwrap()
            .lines()
            .map(Result::unwrap)
            .collect();
        assert_eq!(lines, vec!["nop", "rts"]);
        assert_eq!(loader.read_all_bytes("font.bin").unwrap(), vec![1, 2, 3]);
        assert_eq!(
            loader.read_all_bytes("missing.bin").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn fs_loader_searches_include_paths() {
        let dir = std::env::temp_dir().join(format!("retroforge-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("inc_test.asm"), "lda #1\n").unwrap();
        let loader = FsLoader::new(vec![dir.clone()]);
        let mut text = String::new();
        loader
            .get_stream("inc_test.asm")
            .unwrap()
            .read_line(&mut text)
            .unwrap();
        assert_eq!(text, "lda #1\n");
        fs::remove_dir_all(&dir).unwrap();
    }
}
