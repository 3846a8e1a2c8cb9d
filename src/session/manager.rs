// src/session/manager.rs
//! Host-side session: owns the transport, runs the board handshakes and turns the raw
//! byte stream into timestamped sample batches

use crate::config::constants::protocol::{CMD_DISABLE_DAISY, CMD_START_STREAM, CMD_STOP_STREAM};
use crate::config::constants::session::{DAISY_DISABLE_ATTEMPTS, NO_REPLY_SETTLE_MS};
use crate::config::{SessionConfig, SystemConfig};
use crate::decoder::SampleDecoder;
use crate::error::{BciError, BciResult};
use crate::hal::{ChannelUnit, DaisyInfo, SampleBatch, SampleBlock, SerialTransport, Transport};
use crate::session::handshake::{CloseHandle, Exchange, ExchangeTiming, ReplyPolicy};
use crate::session::parser::{ParserStats, StreamParser};
use crate::session::watchdog::{DroppedSampleMonitor, StallEvent, Watchdog};
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};

/// Per-acquisition bookkeeping, rebuilt by every board reset
#[derive(Debug, Clone)]
pub struct AcquisitionSession {
    pub start_ms: u64,
    pub last_activity_ms: u64,
    /// Sequence number the next completed block receives
    pub next_sequence: u64,
    dropped: DroppedSampleMonitor,
}

impl AcquisitionSession {
    fn new(now_ms: u64, config: &SessionConfig) -> Self {
        Self {
            start_ms: now_ms,
            last_activity_ms: now_ms,
            next_sequence: 0,
            dropped: DroppedSampleMonitor::new(
                config.dropped_sample_count_before_reset,
                config.dropped_sample_safety_delay_before_reset_ms,
            ),
        }
    }

    /// Drops recorded inside the safety window
    pub fn recent_drops(&self) -> usize {
        self.dropped.recent()
    }
}

/// Result of one `tick`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub batch: SampleBatch,
    /// Set once when the device has gone silent for too long
    pub stall: Option<StallEvent>,
    /// Set once when too many samples were dropped in the safety window
    pub dropped_alarm: bool,
}

pub struct BciSession<T: Transport> {
    transport: Option<T>,
    config: SessionConfig,
    decoder: SampleDecoder,
    clock: Arc<dyn TimeProvider>,
    close: CloseHandle,
    daisy: DaisyInfo,
    units: Vec<ChannelUnit>,
    parser: StreamParser,
    read_buffer: Vec<u8>,
    watchdog: Watchdog,
    acquisition: AcquisitionSession,
}

impl BciSession<SerialTransport> {
    /// Open the configured serial port, or the first one that answers.
    pub fn open(config: &SystemConfig) -> BciResult<Self> {
        config.validate().map_err(|errors| BciError::Configuration(errors.join("; ")))?;
        let transport = SerialTransport::discover(&config.serial)?;
        Ok(Self::with_transport(transport, config, Arc::new(SystemTimeProvider::new())))
    }
}

impl<T: Transport> BciSession<T> {
    pub fn with_transport(transport: T, config: &SystemConfig, clock: Arc<dyn TimeProvider>) -> Self {
        let session = &config.session;
        let decoder = SampleDecoder::new(config.chip.reference_voltage, config.chip.assumed_gain);
        let daisy = DaisyInfo::lookup(session.daisy_module);
        let now = clock.now_millis();

        info!(port = transport.name(), "session opened");
        Self {
            transport: Some(transport),
            config: session.clone(),
            decoder,
            daisy,
            units: daisy.channel_units(),
            parser: StreamParser::new(daisy.eeg_channel_count, decoder),
            read_buffer: vec![0; session.read_buffer_size],
            watchdog: Watchdog::new(session.missing_sample_delay_before_reset_ms),
            acquisition: AcquisitionSession::new(now, session),
            close: CloseHandle::new(),
            clock,
        }
    }

    /// Clone to cancel a handshake from another thread.
    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some() && !self.close.is_closed()
    }

    /// Release the transport. Later calls fail with `NotConnected`.
    pub fn close(&mut self) {
        self.close.close();
        if let Some(transport) = self.transport.take() {
            info!(port = transport.name(), "session closed");
        }
    }

    pub fn daisy_info(&self) -> DaisyInfo {
        self.daisy
    }

    pub fn channel_units(&self) -> &[ChannelUnit] {
        &self.units
    }

    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    pub fn acquisition(&self) -> &AcquisitionSession {
        &self.acquisition
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Write `command` one byte at a time under `policy`, returning the collected reply.
    pub fn send_command(&mut self, command: &str, policy: ReplyPolicy, timeout: Duration) -> BciResult<String> {
        let timing = ExchangeTiming {
            timeout,
            poll: Duration::from_millis(self.config.poll_timeout_ms),
            settle: Duration::from_millis(NO_REPLY_SETTLE_MS),
        };

        let transport = match self.transport.as_mut() {
            Some(t) if !self.close.is_closed() => t,
            _ => return Err(BciError::NotConnected),
        };
        Exchange {
            transport,
            clock: self.clock.as_ref(),
            close: &self.close,
            buffer: &mut self.read_buffer,
        }
        .run(command, policy, timing)
    }

    /// Stop the stream, optionally replay the initialization commands, restart the stream and
    /// reset all per-acquisition state.
    pub fn reset_board(&mut self, regular_initialization: bool) -> BciResult<()> {
        let started = self.clock.now_millis();
        let read_timeout = Duration::from_millis(self.config.read_board_reply_timeout_ms);
        let flush_timeout = Duration::from_millis(self.config.flush_board_reply_timeout_ms);

        info!("Stopping board streaming...");
        self.send_command(CMD_STOP_STREAM, ReplyPolicy::Flush, flush_timeout)?;

        if regular_initialization {
            if self.config.daisy_attached && !self.config.daisy_module {
                trace!("Daisy module present but not requested, will now be disabled");
                self.disable_daisy(read_timeout)?;
            }

            let lines: Vec<String> = self.config.additional_command_lines().map(str::to_string).collect();
            for line in lines {
                info!("Additional custom commands for initialization : [{}]", line);
                if let Err(e) = self.send_command(&line, ReplyPolicy::Await, read_timeout) {
                    warn!("Did not succeed sending additional command [{}]: {}", line, e);
                    return Err(e);
                }
            }
        }

        info!("Starting stream...");
        if let Err(e) = self.send_command(CMD_START_STREAM, ReplyPolicy::None, read_timeout) {
            warn!("Did not succeed starting stream: {}", e);
            return Err(e);
        }

        let now = self.clock.now_millis();
        self.acquisition = AcquisitionSession::new(now, &self.config);
        self.parser.reset();
        self.watchdog.activity();
        info!("Status ready (initialization took {}ms)", now.saturating_sub(started));
        Ok(())
    }

    fn disable_daisy(&mut self, timeout: Duration) -> BciResult<()> {
        let mut attempt = 1;
        loop {
            match self.send_command(CMD_DISABLE_DAISY, ReplyPolicy::Await, timeout) {
                Ok(reply) => {
                    trace!("daisy disable reply: {}", reply);
                    return Ok(());
                }
                Err(e) if e.is_timeout() && attempt < DAISY_DISABLE_ATTEMPTS => {
                    warn!(attempt, "no reply to daisy disable, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Did not succeed in disabling daisy module: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Re-derive the channel layout from the daisy setting and rebuild the parser if it
    /// changed.
    pub fn update_daisy(&mut self, quiet: bool) -> DaisyInfo {
        let daisy = DaisyInfo::lookup(self.config.daisy_module);
        if daisy != self.daisy || self.parser.channel_count() != daisy.eeg_channel_count {
            self.daisy = daisy;
            self.units = daisy.channel_units();
            self.parser = StreamParser::new(daisy.eeg_channel_count, self.decoder);
        }

        if !quiet {
            info!(
                "Daisy module {}: {} EEG channels, {} accelerometer channels @ {} Hz",
                if self.config.daisy_module { "enabled" } else { "disabled" },
                daisy.eeg_channel_count,
                daisy.acc_channel_count,
                daisy.sampling_hz
            );
        }
        daisy
    }

    /// Change the daisy request; takes effect on the parser immediately.
    pub fn set_daisy_module(&mut self, enabled: bool) -> DaisyInfo {
        self.config.daisy_module = enabled;
        self.update_daisy(true)
    }

    /// Watchdog check, one bounded read, then parse everything that arrived.
    pub fn tick(&mut self) -> BciResult<TickOutcome> {
        let now = self.clock.now_millis();
        let stall = self.watchdog.check(now, self.acquisition.last_activity_ms);
        if let Some(event) = stall {
            warn!(
                "No response for {}ms, will try recovery now (the board may not reply to any command either)",
                event.threshold.as_millis()
            );
        }

        let poll = Duration::from_millis(self.config.poll_timeout_ms);
        let transport = match self.transport.as_mut() {
            Some(t) if !self.close.is_closed() => t,
            _ => return Err(BciError::NotConnected),
        };
        let length = match transport.read(&mut self.read_buffer, poll) {
            Ok(n) => n,
            Err(e) => {
                warn!("Could not receive data from [{}]", transport.name());
                return Err(BciError::transport("read", e));
            }
        };

        let discarded_before = self.parser.stats().bytes_discarded_after_sync;
        self.parser.feed_all(&self.read_buffer[..length]);

        let mut batch = SampleBatch::new(self.daisy.total_channels());
        let stamp = self.clock.wall_clock_nanos();
        for parsed in self.parser.drain_blocks() {
            batch.blocks.push(SampleBlock {
                sequence: self.acquisition.next_sequence,
                timestamp_nanos: stamp,
                microvolts: parsed.microvolts,
                raw: parsed.raw,
            });
            self.acquisition.next_sequence += 1;
        }

        if !batch.is_empty() {
            self.acquisition.last_activity_ms = self.clock.now_millis();
            self.watchdog.activity();
        }

        let mut dropped_alarm = false;
        if self.parser.stats().bytes_discarded_after_sync > discarded_before
            && self.acquisition.dropped.record(now)
        {
            warn!(
                "{} dropped samples within {}ms",
                self.acquisition.dropped.recent(),
                self.config.dropped_sample_safety_delay_before_reset_ms
            );
            dropped_alarm = true;
        }

        Ok(TickOutcome {
            batch,
            stall,
            dropped_alarm,
        })
    }

    /// Apply the daisy layout and run the full board reset; any failure is a bring-up error.
    pub fn initialize(&mut self) -> BciResult<()> {
        self.update_daisy(false);
        self.reset_board(true).map_err(BciError::bring_up)
    }
}

impl<T: Transport> Drop for BciSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}
