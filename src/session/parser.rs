// src/session/parser.rs
//! Byte-at-a-time framing state machine for the inbound sample stream
//!
//! The board sends `0xC0 0x00 0x00` followed by one 24-bit value per channel. The parser hunts
//! for that sentinel, decodes the channel block that follows and hands completed blocks to a
//! FIFO the session drains. Any sentinel mismatch drops straight back to the hunt and the
//! offending byte is looked at again, so a stray `0xC0` inside data never costs a real frame.

use crate::config::constants::chip::BYTES_PER_SAMPLE;
use crate::config::constants::protocol::SYNC_BYTES;
use crate::decoder::SampleDecoder;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitSync1,
    AwaitSync2,
    AwaitSync3,
    InChannelBlock,
}

/// Decoded values of one channel block
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBlock {
    pub raw: Vec<i32>,
    pub microvolts: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub bytes_seen: u64,
    /// Bytes thrown away while hunting for the sentinel
    pub bytes_discarded: u64,
    /// Discards that happened after the first completed block
    pub bytes_discarded_after_sync: u64,
    /// Sentinel prefixes that broke off part way
    pub resyncs: u64,
    pub blocks_completed: u64,
}

pub struct StreamParser {
    state: ParserState,
    channel_count: usize,
    decoder: SampleDecoder,
    extract_position: usize,
    accumulator: [u8; BYTES_PER_SAMPLE],
    fill: usize,
    raw: Vec<i32>,
    microvolts: Vec<f32>,
    completed: VecDeque<ParsedBlock>,
    synchronized: bool,
    stats: ParserStats,
}

impl StreamParser {
    pub fn new(channel_count: usize, decoder: SampleDecoder) -> Self {
        Self {
            state: ParserState::AwaitSync1,
            channel_count,
            decoder,
            extract_position: 0,
            accumulator: [0; BYTES_PER_SAMPLE],
            fill: 0,
            raw: Vec::with_capacity(channel_count),
            microvolts: Vec::with_capacity(channel_count),
            completed: VecDeque::new(),
            synchronized: false,
            stats: ParserStats::default(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Back to the hunt; a partial block is discarded. Stats and queued blocks are kept.
    pub fn reset(&mut self) {
        self.state = ParserState::AwaitSync1;
        self.extract_position = 0;
        self.fill = 0;
        self.raw.clear();
        self.microvolts.clear();
        self.synchronized = false;
    }

    pub fn feed_all(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| self.feed(b)).count()
    }

    /// Push one byte. Returns true when it completed a block.
    pub fn feed(&mut self, byte: u8) -> bool {
        self.stats.bytes_seen += 1;

        match self.state {
            ParserState::AwaitSync1 => {
                if byte == SYNC_BYTES[0] {
                    self.state = ParserState::AwaitSync2;
                } else {
                    self.discard(1);
                }
                false
            }
            ParserState::AwaitSync2 | ParserState::AwaitSync3 => {
                let index = if self.state == ParserState::AwaitSync2 { 1 } else { 2 };
                if byte != SYNC_BYTES[index] {
                    self.resync(index as u64);
                    self.stats.bytes_seen -= 1;
                    return self.feed(byte);
                }

                if index == 1 {
                    self.state = ParserState::AwaitSync3;
                    false
                } else {
                    self.begin_block();
                    self.channel_count == 0 && self.complete_block()
                }
            }
            ParserState::InChannelBlock => {
                self.accumulator[self.fill] = byte;
                self.fill += 1;
                if self.fill < BYTES_PER_SAMPLE {
                    return false;
                }

                let sample = self.decoder.decode(self.extract_position, self.accumulator);
                self.raw.push(sample.raw);
                self.microvolts.push(sample.microvolts);
                self.fill = 0;
                self.extract_position += 1;

                self.extract_position >= self.channel_count && self.complete_block()
            }
        }
    }

    fn begin_block(&mut self) {
        self.state = ParserState::InChannelBlock;
        self.extract_position = 0;
        self.fill = 0;
        self.raw.clear();
        self.microvolts.clear();
    }

    fn complete_block(&mut self) -> bool {
        let block = ParsedBlock {
            raw: std::mem::replace(&mut self.raw, Vec::with_capacity(self.channel_count)),
            microvolts: std::mem::replace(
                &mut self.microvolts,
                Vec::with_capacity(self.channel_count),
            ),
        };
        self.completed.push_back(block);
        self.stats.blocks_completed += 1;
        self.synchronized = true;
        self.state = ParserState::AwaitSync1;
        self.extract_position = 0;
        true
    }

    fn discard(&mut self, count: u64) {
        self.stats.bytes_discarded += count;
        if self.synchronized {
            self.stats.bytes_discarded_after_sync += count;
        }
    }

    /// Sentinel broke off after `matched` bytes; those bytes are lost.
    fn resync(&mut self, matched: u64) {
        self.stats.resyncs += 1;
        self.discard(matched);
        self.state = ParserState::AwaitSync1;
        debug!(matched, "stream sentinel mismatch, resynchronizing");
    }

    pub fn pop_block(&mut self) -> Option<ParsedBlock> {
        self.completed.pop_front()
    }

    pub fn drain_blocks(&mut self) -> impl Iterator<Item = ParsedBlock> + '_ {
        self.completed.drain(..)
    }

    pub fn pending_blocks(&self) -> usize {
        self.completed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(channels: usize) -> StreamParser {
        StreamParser::new(channels, SampleDecoder::default())
    }

    #[test]
    fn test_single_block() {
        let mut p = parser(2);
        let done = p.feed_all(&[0xC0, 0x00, 0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF, 0xFF]);

        assert_eq!(done, 1);
        let block = p.pop_block().unwrap();
        assert_eq!(block.raw, vec![1, -1]);
        assert_eq!(p.state(), ParserState::AwaitSync1);
    }

    #[test]
    fn test_garbage_before_sentinel_is_discarded() {
        let mut p = parser(1);
        p.feed_all(&[0x12, 0x34, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x07]);

        assert_eq!(p.pop_block().unwrap().raw, vec![7]);
        assert_eq!(p.stats().bytes_discarded, 2);
        assert_eq!(p.stats().bytes_discarded_after_sync, 0);
    }

    #[test]
    fn test_mismatch_reevaluates_same_byte() {
        // 0xC0 0xC0 0x00 0x00: the second 0xC0 breaks the first sentinel but starts a new one
        let mut p = parser(1);
        p.feed_all(&[0xC0, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x02]);

        assert_eq!(p.pop_block().unwrap().raw, vec![2]);
        assert_eq!(p.stats().resyncs, 1);
    }

    #[test]
    fn test_mismatch_on_third_byte() {
        let mut p = parser(1);
        p.feed(0xC0);
        p.feed(0x00);
        assert_eq!(p.state(), ParserState::AwaitSync3);
        p.feed(0x05);
        assert_eq!(p.state(), ParserState::AwaitSync1);
        assert_eq!(p.stats().bytes_discarded, 3);
        assert_eq!(p.stats().bytes_seen, 3);
    }

    #[test]
    fn test_reset_drops_partial_block() {
        let mut p = parser(2);
        p.feed_all(&[0xC0, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(p.state(), ParserState::InChannelBlock);

        p.reset();
        p.feed_all(&[0xC0, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x02]);
        assert_eq!(p.pop_block().unwrap().raw, vec![1, 2]);
        assert!(p.pop_block().is_none());
    }

    #[test]
    fn test_discards_after_sync_are_tracked() {
        let mut p = parser(1);
        p.feed_all(&[0xC0, 0x00, 0x00, 0x00, 0x00, 0x01]);
        p.feed_all(&[0xAA, 0xBB]);

        assert_eq!(p.stats().bytes_discarded_after_sync, 2);
    }

    #[test]
    fn test_blocks_queue_in_order() {
        let mut p = parser(1);
        for v in 1..=3u8 {
            p.feed_all(&[0xC0, 0x00, 0x00, 0x00, 0x00, v]);
        }
        let raws: Vec<i32> = p.drain_blocks().map(|b| b.raw[0]).collect();
        assert_eq!(raws, vec![1, 2, 3]);
        assert_eq!(p.pending_blocks(), 0);
    }
}
