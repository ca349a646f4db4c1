//! In-memory register tables implementing [`RegisterIo`].
//!
//! A thread-safe stand-in for the indoor-bus adapter: one input table, one
//! holding table, bounds-checked like the real device rejects out-of-range
//! reads. Tests and demos seed the input table with synthetic unit data and
//! run the full gateway against it without any serial hardware.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::RegisterKind;
use crate::transport::RegisterIo;

/// Default table sizes, comfortably past the highest mapped region (3728).
const DEFAULT_INPUT_SIZE: usize = 4096;
const DEFAULT_HOLDING_SIZE: usize = 4096;

/// Thread-safe input + holding register storage.
#[derive(Debug, Clone)]
pub struct RegisterBank {
    input: Arc<RwLock<Vec<u16>>>,
    holding: Arc<RwLock<Vec<u16>>>,
}

impl RegisterBank {
    /// Create a bank with the default table sizes.
    pub fn new() -> Self {
        Self::with_sizes(DEFAULT_INPUT_SIZE, DEFAULT_HOLDING_SIZE)
    }

    /// Create a bank with explicit table sizes.
    pub fn with_sizes(input_size: usize, holding_size: usize) -> Self {
        Self {
            input: Arc::new(RwLock::new(vec![0u16; input_size])),
            holding: Arc::new(RwLock::new(vec![0u16; holding_size])),
        }
    }

    fn table(&self, kind: RegisterKind) -> &Arc<RwLock<Vec<u16>>> {
        match kind {
            RegisterKind::Input => &self.input,
            RegisterKind::Holding => &self.holding,
        }
    }

    /// Read `count` registers from the given table.
    pub fn read(&self, kind: RegisterKind, address: u16, count: u16) -> GatewayResult<Vec<u16>> {
        if count == 0 {
            return Err(GatewayError::invalid_argument("read of zero registers"));
        }
        let table = self.table(kind).read().unwrap();
        let start = address as usize;
        let end = start + count as usize;
        if end > table.len() {
            return Err(GatewayError::invalid_argument(format!(
                "{kind} read out of range: address={address}, count={count}"
            )));
        }
        Ok(table[start..end].to_vec())
    }

    /// Write registers into the given table. Tests use the input side to
    /// stage what the adapter would report.
    pub fn write(&self, kind: RegisterKind, address: u16, words: &[u16]) -> GatewayResult<()> {
        if words.is_empty() {
            return Err(GatewayError::invalid_argument("write of zero registers"));
        }
        let mut table = self.table(kind).write().unwrap();
        let start = address as usize;
        let end = start + words.len();
        if end > table.len() {
            return Err(GatewayError::invalid_argument(format!(
                "{kind} write out of range: address={address}, count={}",
                words.len()
            )));
        }
        table[start..end].copy_from_slice(words);
        Ok(())
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegisterIo for RegisterBank {
    async fn read_registers(
        &mut self,
        kind: RegisterKind,
        address: u16,
        count: u16,
    ) -> GatewayResult<Vec<u16>> {
        self.read(kind, address, count)
    }

    async fn write_registers(&mut self, address: u16, words: &[u16]) -> GatewayResult<()> {
        self.write(RegisterKind::Holding, address, words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_roundtrip() {
        let bank = RegisterBank::new();
        bank.write(RegisterKind::Holding, 2000, &[1, 2, 3]).unwrap();
        assert_eq!(
            bank.read(RegisterKind::Holding, 2000, 3).unwrap(),
            vec![1, 2, 3]
        );
        // The input table is independent.
        assert_eq!(bank.read(RegisterKind::Input, 2000, 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_bounds_are_enforced() {
        let bank = RegisterBank::with_sizes(16, 16);
        assert!(bank.read(RegisterKind::Input, 15, 2).is_err());
        assert!(bank.read(RegisterKind::Input, 0, 0).is_err());
        assert!(bank.write(RegisterKind::Holding, 14, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_clones_share_storage() {
        let bank = RegisterBank::new();
        let other = bank.clone();
        bank.write(RegisterKind::Input, 0, &[42]).unwrap();
        assert_eq!(other.read(RegisterKind::Input, 0, 1).unwrap(), vec![42]);
    }
}
