//! In-memory remote store used to drive the pipeline end to end.

#![allow(dead_code)]

use backup_pipeline::remote::join_remote;
use backup_pipeline::{RemoteEntry, RemoteEntryKind, RemoteSession};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use zip::ZipArchive;

/// Remote tree keyed by full path. Listings keep insertion order.
#[derive(Default)]
pub struct MemorySession {
    listings: HashMap<String, Vec<RemoteEntry>>,
    contents: HashMap<String, Vec<u8>>,
    /// Paths whose read fails part-way through
    broken: HashSet<String>,
}

impl MemorySession {
    pub fn with_root(root: &str) -> Self {
        let mut session = Self::default();
        session.listings.insert(root.to_string(), Vec::new());
        session
    }

    pub fn add_dir(&mut self, parent: &str, name: &str) -> String {
        let path = self.add_entry(parent, name, RemoteEntryKind::Directory);
        self.listings.insert(path.clone(), Vec::new());
        path
    }

    pub fn add_file(&mut self, parent: &str, name: &str, content: &[u8]) -> String {
        let path = self.add_entry(parent, name, RemoteEntryKind::File);
        self.contents.insert(path.clone(), content.to_vec());
        path
    }

    pub fn add_symlink(&mut self, parent: &str, name: &str) -> String {
        self.add_entry(parent, name, RemoteEntryKind::Symlink)
    }

    /// Make reads of `path` fail after the first byte.
    pub fn break_file(&mut self, path: &str) {
        self.broken.insert(path.to_string());
    }

    fn add_entry(&mut self, parent: &str, name: &str, kind: RemoteEntryKind) -> String {
        let path = join_remote(parent, name);
        self.listings
            .get_mut(parent)
            .expect("parent directory registered")
            .push(RemoteEntry::new(name, kind, path.clone()));
        path
    }
}

impl RemoteSession for MemorySession {
    fn list_dir(&self, path: &str) -> io::Result<Vec<RemoteEntry>> {
        self.listings
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such directory"))
    }

    fn open_file<'a>(&'a self, path: &str) -> io::Result<Box<dyn Read + 'a>> {
        let data = self
            .contents
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        if self.broken.contains(path) {
            Ok(Box::new(FailingReader { first: data.first().copied() }))
        } else {
            Ok(Box::new(data.as_slice()))
        }
    }
}

/// Yields one byte, then a connection reset.
struct FailingReader {
    first: Option<u8>,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.first.take() {
            Some(b) if !buf.is_empty() => {
                buf[0] = b;
                Ok(1)
            }
            _ => Err(io::Error::new(io::ErrorKind::ConnectionReset, "channel closed")),
        }
    }
}

/// All entries of a zip file as (name, content), in archive order.
pub fn zip_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(File::open(path).expect("open archive")).expect("read archive");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).expect("entry");
            let mut data = Vec::new();
            entry.read_to_end(&mut data).expect("entry content");
            (entry.name().to_string(), data)
        })
        .collect()
}
