//! Shared storage for active SPS/PPS parameter sets.
//!
//! Parameter sets are immutable once parsed and are commonly referenced by
//! several slices in flight at once, so they're kept behind `Arc` and handed
//! out by cloning the handle rather than the data. Re-parsing a set with an
//! id already in the table overwrites the previous entry (last writer wins,
//! section 7.4.1.2.1's semantics for "currently active").

use crate::error::{AvcError, ParamSetKind, Result};
use crate::pps::Pps;
use crate::sps::{Sps, SubsetSps};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ParamSetStore {
    sps: HashMap<u8, Arc<Sps>>,
    pps: HashMap<u8, Arc<Pps>>,
    subset_sps: HashMap<u8, Arc<SubsetSps>>,
}

impl ParamSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_sps(&mut self, id: u8, sps: Sps) {
        self.sps.insert(id, Arc::new(sps));
    }

    pub fn insert_pps(&mut self, id: u8, pps: Pps) {
        self.pps.insert(id, Arc::new(pps));
    }

    pub fn insert_subset_sps(&mut self, id: u8, sps: SubsetSps) {
        self.subset_sps.insert(id, Arc::new(sps));
    }

    pub fn get_sps(&self, id: u8) -> Result<Arc<Sps>> {
        self.sps.get(&id).cloned().ok_or(AvcError::MissingParameterSet {
            kind: ParamSetKind::Sps,
            id: id as u32,
        })
    }

    pub fn get_pps(&self, id: u8) -> Result<Arc<Pps>> {
        self.pps.get(&id).cloned().ok_or(AvcError::MissingParameterSet {
            kind: ParamSetKind::Pps,
            id: id as u32,
        })
    }

    pub fn get_subset_sps(&self, id: u8) -> Result<Arc<SubsetSps>> {
        self.subset_sps
            .get(&id)
            .cloned()
            .ok_or(AvcError::MissingParameterSet {
                kind: ParamSetKind::SubsetSps,
                id: id as u32,
            })
    }

    /// Resolve the SPS a given PPS id refers to.
    pub fn sps_for_pps(&self, pps_id: u8) -> Result<(Arc<Pps>, Arc<Sps>)> {
        let pps = self.get_pps(pps_id)?;
        let sps = self.get_sps(pps.seq_parameter_set_id)?;
        Ok((pps, sps))
    }

    pub fn sps_count(&self) -> usize {
        self.sps.len()
    }

    pub fn pps_count(&self) -> usize {
        self.pps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;
    use crate::sps::parse_sps;

    fn sample_sps() -> Sps {
        let data = [
            0x42, 0xc0, 0x16, 0xa6, 0x11, 0x05, 0x07, 0xe9, 0xb2, 0x00, 0x00,
            0x00, 0x02, 0x00, 0x00, 0x00, 0x64, 0x1e, 0x2c, 0x5c,
        ];
        let mut reader = BitReader::new(&data);
        parse_sps(&mut reader).unwrap()
    }

    #[test]
    fn test_last_writer_wins() {
        let mut store = ParamSetStore::new();
        let mut sps_a = sample_sps();
        sps_a.level_idc = 10;
        store.insert_sps(0, sps_a);
        let mut sps_b = sample_sps();
        sps_b.level_idc = 20;
        store.insert_sps(0, sps_b);

        assert_eq!(store.get_sps(0).unwrap().level_idc, 20);
    }

    #[test]
    fn test_missing_parameter_set_error() {
        let store = ParamSetStore::new();
        let err = store.get_sps(5).unwrap_err();
        matches!(err, AvcError::MissingParameterSet { .. });
    }
}
