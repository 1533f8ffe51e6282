// crates/dragnet-pipeline/src/wire.rs
//
// Byte-stream plumbing shared by the client, server, and edge stages.
//
// The wire format is deliberately frameless: a connection carries
// back-to-back records of f32s (little-endian), each of a size both ends
// agreed on out of band, and ends with a clean close after the sender shuts
// down its write side. The reader derives record boundaries purely from
// byte counts, which is why the EOF position matters: at a record boundary
// it means the stream is done, anywhere else it means the peer died.

use std::io::{self, Read, Write};
use std::mem;
use std::net::TcpStream;
use std::os::fd::AsRawFd;

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    /// The connection closed partway through a record.
    #[error("connection closed mid-record ({got} of {want} bytes)")]
    UncleanEof { got: usize, want: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read exactly `buf.len()` bytes unless EOF intervenes.
///
/// Interrupted reads count as zero progress and are retried. Returns the
/// total number of bytes read: `buf.len()` for a full buffer, less if the
/// stream ended early, 0 if it was already at EOF.
pub fn read_full(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Read one record of `floats` f32s.
///
/// `Ok(None)` is a clean EOF at the record boundary; an EOF anywhere inside
/// the record is `WireError::UncleanEof`.
pub fn read_f32_record(r: &mut impl Read, floats: usize) -> Result<Option<Vec<f32>>, WireError> {
    let mut buf = vec![0u8; floats * 4];
    let got = read_full(r, &mut buf)?;
    if got == 0 {
        return Ok(None);
    }
    if got < buf.len() {
        return Err(WireError::UncleanEof { got, want: buf.len() });
    }
    let mut out = vec![0f32; floats];
    LittleEndian::read_f32_into(&buf, &mut out);
    Ok(Some(out))
}

/// Write one record of f32s. `scratch` is reused across calls so steady-state
/// sending allocates nothing.
pub fn write_f32_record(
    w: &mut impl Write,
    data: &[f32],
    scratch: &mut Vec<u8>,
) -> io::Result<()> {
    scratch.resize(data.len() * 4, 0);
    LittleEndian::write_f32_into(data, scratch);
    w.write_all(scratch)
}

/// Ignore SIGPIPE process-wide so a peer that disappears mid-write surfaces
/// as an `EPIPE` error on that one stream instead of killing the process.
pub fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

/// Enable keepalive on an accepted client stream.
pub fn set_keepalive(stream: &TcpStream) -> io::Result<()> {
    let on: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            &on as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that yields `Interrupted` before every successful read, and
    /// feeds the underlying data one byte at a time to force retries.
    struct Choppy {
        data:      Vec<u8>,
        pos:       usize,
        interrupt: bool,
    }

    impl Read for Choppy {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt {
                self.interrupt = false;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            self.interrupt = true;
            if self.pos == self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    fn encode(data: &[f32]) -> Vec<u8> {
        let mut bytes = vec![0u8; data.len() * 4];
        LittleEndian::write_f32_into(data, &mut bytes);
        bytes
    }

    #[test]
    fn read_full_survives_interrupts_and_short_reads() {
        let mut r = Choppy { data: vec![1, 2, 3, 4, 5], pos: 0, interrupt: true };
        let mut buf = [0u8; 5];
        assert_eq!(read_full(&mut r, &mut buf).unwrap(), 5);
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn record_reader_distinguishes_the_three_endings() {
        let payload = [0.5f32, -1.0, 3.25];

        // Full record.
        let mut r = Cursor::new(encode(&payload));
        assert_eq!(read_f32_record(&mut r, 3).unwrap().unwrap(), payload);

        // Clean EOF at the boundary.
        assert!(read_f32_record(&mut r, 3).unwrap().is_none());

        // EOF mid-record.
        let mut r = Cursor::new(encode(&payload)[..7].to_vec());
        match read_f32_record(&mut r, 3) {
            Err(WireError::UncleanEof { got: 7, want: 12 }) => {}
            other => panic!("expected UncleanEof, got {other:?}"),
        }
    }

    #[test]
    fn writer_reuses_scratch() {
        let mut out = Vec::new();
        let mut scratch = Vec::new();
        write_f32_record(&mut out, &[1.0, 2.0], &mut scratch).unwrap();
        write_f32_record(&mut out, &[3.0], &mut scratch).unwrap();
        assert_eq!(out.len(), 12);
        let mut floats = [0f32; 3];
        LittleEndian::read_f32_into(&out, &mut floats);
        assert_eq!(floats, [1.0, 2.0, 3.0]);
    }
}
