// fastqsumm: Sample reads and fastqcheck statistics from SAM and BAM files.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Mate matching for paired reads.
use std::collections::HashMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use bstr::BStr;
use bstr::BString;
use bstr::ByteSlice;

use crate::error::Error;
use crate::error::Result;
use crate::fragment::CachedFragment;
use crate::fragment::FragmentView;

/// First-seen mates waiting for their partner, keyed by fragment name.
#[derive(Debug, Default)]
pub struct PairingCache {
    store: HashMap<BString, CachedFragment>,
}

impl PairingCache {
    pub fn new() -> Self {
        PairingCache::default()
    }

    /// Store an owned copy of `fragment`.
    pub fn insert(
        &mut self,
        fragment: &FragmentView,
    ) {
        self.store.insert(fragment.name.to_owned(), fragment.to_cached());
    }

    /// Remove and return the mate named `name`.
    pub fn take(
        &mut self,
        name: &BStr,
    ) -> Option<CachedFragment> {
        self.store.remove(name.as_bytes())
    }

    pub fn contains(
        &self,
        name: &BStr,
    ) -> bool {
        self.store.contains_key(name.as_bytes())
    }

    /// Number of unmatched mates.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Names of reads whose mates are known to be absent.
#[derive(Debug, Default)]
pub struct OrphanSet {
    names: HashSet<BString>,
}

impl OrphanSet {
    /// Read names from `path`, one per line. Blank lines are ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::input(path, e))?;
        let mut names: HashSet<BString> = HashSet::new();
        for line in BufReader::new(file).split(b'\n') {
            let line = line.map_err(|e| Error::input(path, e))?;
            let name = line.trim();
            if !name.is_empty() {
                names.insert(BString::from(name));
            }
        }
        Ok(OrphanSet { names })
    }

    pub fn contains(
        &self,
        name: &BStr,
    ) -> bool {
        self.names.contains(name.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<BString> for OrphanSet {
    fn from_iter<I: IntoIterator<Item = BString>>(iter: I) -> Self {
        OrphanSet { names: iter.into_iter().collect() }
    }
}
