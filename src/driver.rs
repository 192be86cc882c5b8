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

//! The main pass: route every record to its destination groups.
use log::debug;
use log::info;

use crate::error::Result;
use crate::fragment::FragmentView;
use crate::pairing::OrphanSet;
use crate::pairing::PairingCache;
use crate::record::AuxKeys;
use crate::record::FlagFilter;
use crate::record::Record;
use crate::registry::Registry;

/// Counts reported at the end of the main pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records read.
    pub records: u64,
    /// Records rejected by the flag filter.
    pub filtered: u64,
    /// Records accepted by the flag filter.
    pub accepted: u64,
    /// Accepted records that are not part of a pair.
    pub single_end: u64,
    /// Pairs completed.
    pub pairs: u64,
    /// Mates discarded because they are listed as orphans.
    pub orphans: u64,
    /// First mates whose partner never arrived.
    pub stragglers: u64,
}

/// Routes records to the groups of a [Registry].
pub struct FanOut {
    registry: Registry,
    filter: FlagFilter,
    aux_keys: AuxKeys,
    cache: PairingCache,
    orphans: OrphanSet,
    summary: RunSummary,
}

impl FanOut {
    pub fn new(
        registry: Registry,
        filter: FlagFilter,
        aux_keys: AuxKeys,
        orphans: OrphanSet,
    ) -> Self {
        FanOut {
            registry,
            filter,
            aux_keys,
            cache: PairingCache::new(),
            orphans,
            summary: RunSummary::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of first mates waiting for their partner.
    pub fn n_pending(&self) -> usize {
        self.cache.len()
    }

    /// Route one record.
    ///
    /// Single-end reads go to the lane unpaired group and their tag group.
    /// The first mate of a pair is cached; when its partner arrives the
    /// pair goes to the lane paired group and the tag group of the second
    /// mate.
    pub fn process(
        &mut self,
        record: &Record,
    ) -> Result<()> {
        self.summary.records += 1;
        if !self.filter.accepts(record.flags()) {
            self.summary.filtered += 1;
            return Ok(())
        }
        self.summary.accepted += 1;

        let fragment = FragmentView::from_record(record, &self.aux_keys);

        if !record.flags().is_segmented() {
            self.summary.single_end += 1;
            self.registry.lane_unpaired_mut().visit_single(&fragment)?;
            if let Some(key) = fragment.group_key {
                if let Some(group) = self.registry.tag_mut(key) {
                    group.visit_single(&fragment)?;
                }
            }
            return Ok(())
        }

        match self.cache.take(fragment.name) {
            None => {
                if self.orphans.contains(fragment.name) {
                    debug!("Discarding orphan {}", fragment.name);
                    self.summary.orphans += 1;
                } else {
                    self.cache.insert(&fragment);
                }
            },
            Some(mate) => {
                let first = mate.as_view();
                self.registry.lane_paired_mut().visit_pair(&first, &fragment)?;
                if let Some(key) = fragment.group_key {
                    if let Some(group) = self.registry.tag_mut(key) {
                        group.visit_pair(&first, &fragment)?;
                    }
                }
                self.summary.pairs += 1;
            },
        }

        Ok(())
    }

    /// Route every record in `records`.
    pub fn run<I: IntoIterator<Item = Result<Record>>>(
        &mut self,
        records: I,
    ) -> Result<()> {
        for record in records {
            self.process(&record?)?;
        }
        Ok(())
    }

    /// Close the groups and count the stragglers.
    pub fn finish(self) -> Result<RunSummary> {
        let FanOut { registry, cache, mut summary, .. } = self;
        summary.stragglers = cache.len() as u64;
        registry.close()?;

        info!("Unfiltered reads: {}", summary.accepted);
        info!("Filtered reads: {}", summary.filtered);
        info!("Unfiltered single-end reads: {}", summary.single_end);
        info!("Total reads: {}", summary.records);
        info!("Orphaned reads: {}", summary.orphans);
        info!("Unmatched mates: {}", summary.stragglers);

        Ok(summary)
    }
}
