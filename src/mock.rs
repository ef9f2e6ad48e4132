// In-memory serial port and delay used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType, Read, ReadReady, Write};

#[derive(Debug, Clone, Copy)]
enum Rx {
    Byte(u8),
    // Nothing available for one poll or read.
    Gap,
    // Ends the current read; the bytes after it arrive on the next one.
    Break,
    Fail,
}

pub struct MockSerial {
    rx: VecDeque<Rx>,
    pub tx: Vec<u8>,
    pub polls: usize,
    pub writes: usize,
    pub fail_writes: bool,
    stop_after_writes: Option<(usize, &'static AtomicBool)>,
}

impl MockSerial {
    pub fn new() -> Self {
        MockSerial {
            rx: VecDeque::new(),
            tx: Vec::new(),
            polls: 0,
            writes: 0,
            fail_writes: false,
            stop_after_writes: None,
        }
    }

    pub fn with_bytes(bytes: &[u8]) -> Self {
        let mut serial = Self::new();
        serial.push_bytes(bytes);
        serial
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.rx.extend(bytes.iter().map(|&b| Rx::Byte(b)));
        self
    }

    pub fn push_gaps(&mut self, count: usize) -> &mut Self {
        self.rx.extend(std::iter::repeat(Rx::Gap).take(count));
        self
    }

    pub fn push_chunk_break(&mut self) -> &mut Self {
        self.rx.push_back(Rx::Break);
        self
    }

    pub fn push_failure(&mut self) -> &mut Self {
        self.rx.push_back(Rx::Fail);
        self
    }

    /// Raises `flag` once `count` command writes have gone out.
    pub fn stop_after_writes(&mut self, count: usize, flag: &'static AtomicBool) -> &mut Self {
        self.stop_after_writes = Some((count, flag));
        self
    }

    /// Bytes still waiting to be read.
    pub fn remaining(&self) -> usize {
        self.rx.iter().filter(|rx| matches!(rx, Rx::Byte(_))).count()
    }

    /// Command frames written so far, split on the 19-byte frame size.
    pub fn sent_frames(&self) -> Vec<[u8; 19]> {
        self.tx
            .chunks_exact(19)
            .map(|chunk| {
                let mut frame = [0u8; 19];
                frame.copy_from_slice(chunk);
                frame
            })
            .collect()
    }
}

impl ErrorType for MockSerial {
    type Error = ErrorKind;
}

impl ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.polls += 1;
        while matches!(self.rx.front(), Some(Rx::Break)) {
            self.rx.pop_front();
        }
        match self.rx.front() {
            Some(Rx::Byte(_)) => Ok(true),
            Some(Rx::Gap) => {
                self.rx.pop_front();
                Ok(false)
            }
            Some(Rx::Fail) => {
                self.rx.pop_front();
                Err(ErrorKind::Other)
            }
            Some(Rx::Break) | None => Ok(false),
        }
    }
}

impl Read for MockSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.rx.front().copied() {
                Some(Rx::Byte(b)) => {
                    self.rx.pop_front();
                    buf[n] = b;
                    n += 1;
                }
                Some(Rx::Gap) => {
                    if n == 0 {
                        self.rx.pop_front();
                    }
                    break;
                }
                Some(Rx::Break) => {
                    self.rx.pop_front();
                    if n == 0 {
                        continue;
                    }
                    break;
                }
                Some(Rx::Fail) => {
                    if n == 0 {
                        self.rx.pop_front();
                        return Err(ErrorKind::Other);
                    }
                    break;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err(ErrorKind::Other);
        }
        self.tx.extend_from_slice(buf);
        if buf.len() == 19 {
            self.writes += 1;
            if let Some((count, flag)) = self.stop_after_writes {
                if self.writes >= count {
                    flag.store(true, Ordering::Release);
                }
            }
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(ErrorKind::Other);
        }
        Ok(())
    }
}

/// Delay that only records how long it was asked to wait.
#[derive(Default)]
pub struct MockDelay {
    pub elapsed_ns: u64,
}

impl MockDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ns += u64::from(ms) * 1_000_000;
    }
}

pub fn stop_flag() -> &'static AtomicBool {
    Box::leak(Box::new(AtomicBool::new(false)))
}

/// A measurement frame as the sensor emits it, with a valid checksum.
pub fn data_frame(pm2_5: u16, pm10: u16) -> [u8; 10] {
    reply_frame(
        0xC0,
        [
            pm2_5 as u8,
            (pm2_5 >> 8) as u8,
            pm10 as u8,
            (pm10 >> 8) as u8,
            0xA1,
            0x60,
        ],
    )
}

/// A frame with an arbitrary command byte and body, with a valid checksum.
pub fn reply_frame(command: u8, data: [u8; 6]) -> [u8; 10] {
    let checksum = data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));
    let mut frame = [0u8; 10];
    frame[0] = 0xAA;
    frame[1] = command;
    frame[2..8].copy_from_slice(&data);
    frame[8] = checksum;
    frame[9] = 0xAB;
    frame
}
