//! Saving blocks and tracking the chain tip.

use std::convert::TryInto;
use std::io;

use tracing::{info, warn};

use bitmark_chain::block::{Block, Header, Packed};
use bitmark_chain::fault::Fault;
use bitmark_chain::serialization::BitmarkDeserialize;

use crate::Store;

impl Store {
    /// Validate chain linkage and save a packed block, finalizing every
    /// transaction it confirms.
    ///
    /// Context-free validity (proof of work, clock, Merkle binding) is the
    /// caller's check; this one owns the tip. The `B` write lands after the
    /// per-transaction state writes so a crash recovers from `S`.
    pub fn save_block(&self, block: &Block, packed: &Packed) -> Result<(), Fault> {
        let _finalize = self.finalize.write().unwrap();
        let mut chain = self.tip_mut();

        if block.number != chain.next_number
            || block.header.previous_block != chain.previous_link
        {
            return Err(Fault::InvalidBlock);
        }

        self.finalize_transactions(&block.transactions);

        self.pools
            .blocks
            .put(&block.number.to_be_bytes(), packed.bytes());

        chain.next_number = block.number + 1;
        chain.previous_link = block.digest;

        metrics::gauge!("bitmark.chain.height", block.number as i64);
        info!(number = block.number, digest = %block.digest, "saved block");
        Ok(())
    }

    /// The stored packed block at `number`.
    pub fn block(&self, number: u64) -> Option<Packed> {
        self.pools
            .blocks
            .get(&number.to_be_bytes())
            .map(|bytes| Packed::from(bytes.to_vec()))
    }

    /// Write `number time difficulty-bits` lines for blocks in
    /// `begin..end`; zero bounds mean the start and end of the chain.
    pub fn print_block_times<W: io::Write>(
        &self,
        writer: &mut W,
        begin: u64,
        end: u64,
    ) -> io::Result<()> {
        let begin = begin.max(1);
        let end = if end == 0 { u64::MAX } else { end };

        let mut start = begin.to_be_bytes().to_vec();
        loop {
            let batch = self.pools.blocks.fetch(&start, 100);
            if batch.is_empty() {
                return Ok(());
            }

            for (key, value) in &batch {
                let number = match key[..].try_into() {
                    Ok(bytes) => u64::from_be_bytes(bytes),
                    Err(_) => {
                        warn!("malformed block key");
                        continue;
                    }
                };
                if number >= end {
                    return Ok(());
                }
                if value.len() < Header::len() {
                    warn!(number, "stored block shorter than a header");
                    continue;
                }
                match Header::bitmark_deserialize(&value[..Header::len()]) {
                    Ok(header) => {
                        writeln!(
                            writer,
                            "{} {} {}",
                            number,
                            header.time.to_rfc3339(),
                            header.bits
                        )?;
                    }
                    Err(_) => warn!(number, "stored block header does not parse"),
                }
            }

            let (last_key, _) = batch.last().expect("batch is non-empty");
            start = last_key.to_vec();
            start.push(0);
        }
    }
}
