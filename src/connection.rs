//! # Blocking Connection
//!
//! [`Connection`] reads and writes typed values over one duplex byte stream.
//!
//! ## Wire Format
//! ```text
//! primitive        [big-endian value]            i64/i32/f64/f32: 8/4/8/4, byte/bool: 1
//! fixed object     [w bytes]                     w from the value codec
//! variable object  [i32 len][payload]            len < 0: |len| compressed bytes
//! byte array       [i32 len][len bytes]          len >= 0, never compressed
//! ```
//!
//! Writes are buffered: call [`flush`](Connection::flush) once a request or
//! response is complete. Reads loop over short transport reads until the
//! declared number of bytes has arrived.
//!
//! ## Concurrency
//! A connection performs no locking. One thread may read while another
//! writes after [`split`](Connection::split); two concurrent readers or two
//! concurrent writers would interleave frames. [`CloseHandle::close`] from
//! any thread unblocks socket I/O in progress.

use crate::config::{Charset, ConnectionConfig};
use crate::core::frame::{LengthPrefix, LENGTH_FIELD_SIZE};
use crate::core::object::{block_length, decode_object, decode_text, encode_object, encode_text};
use crate::core::value::ValueCodec;
use crate::error::{Result, WireError};
use crate::transport::{CloseHandle, TransportShutdown};
use crate::utils::compression::BlockCompressor;
use crate::utils::metrics::WireMetrics;
use crate::utils::trace::{Direction, TraceSink, Tracer, TracingSink};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// Settings and collaborators shared by both halves
#[derive(Clone)]
pub(crate) struct Shared {
    pub config: Arc<ConnectionConfig>,
    pub compressor: Arc<dyn BlockCompressor>,
    pub tracer: Tracer,
    pub metrics: Arc<WireMetrics>,
    pub state: CloseHandle,
}

impl Shared {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.state.is_closed() {
            Err(WireError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Errors raised after a local close are reported as such, whatever the
    /// socket said.
    pub(crate) fn transport_error(&self, e: io::Error) -> WireError {
        if self.state.is_closed() {
            WireError::ConnectionClosed
        } else {
            WireError::Transport(e)
        }
    }

    pub(crate) fn short_read(&self, expected: usize, received: usize) -> WireError {
        if self.state.is_closed() {
            return WireError::ConnectionClosed;
        }
        self.metrics.frame_corrupted();
        WireError::FrameCorruption { expected, received }
    }

    pub(crate) fn invalid_length(&self, e: WireError) -> WireError {
        self.metrics.frame_corrupted();
        e
    }

    pub(crate) fn check_suspicious(&self, len: usize) {
        if len > self.config.suspicious_length {
            warn!(len, "About to read a very large frame");
        }
    }
}

/// Read half of a connection
pub struct WireReader<R> {
    input: BufReader<R>,
    shared: Shared,
}

impl<R: Read> WireReader<R> {
    pub(crate) fn new(input: R, shared: Shared) -> Self {
        Self {
            input: BufReader::with_capacity(shared.config.buffer_size, input),
            shared,
        }
    }

    /// Fill `buf` completely, looping over short reads.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) => return Err(self.shared.short_read(buf.len(), filled)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.shared.transport_error(e)),
            }
        }
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_fully(&mut buf)?;
        Ok(buf)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.shared.ensure_open()?;
        let mut buf = [0u8; N];
        self.read_fully(&mut buf)?;
        self.shared.metrics.frame_received(N);
        Ok(buf)
    }

    pub fn read_long(&mut self) -> Result<i64> {
        let value = BigEndian::read_i64(&self.read_array::<8>()?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub fn read_int(&mut self) -> Result<i32> {
        let value = BigEndian::read_i32(&self.read_array::<4>()?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub fn read_double(&mut self) -> Result<f64> {
        let value = BigEndian::read_f64(&self.read_array::<8>()?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub fn read_float(&mut self) -> Result<f32> {
        let value = BigEndian::read_f32(&self.read_array::<4>()?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let [value] = self.read_array::<1>()?;
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    /// Any non-zero byte reads as `true`
    pub fn read_boolean(&mut self) -> Result<bool> {
        let [byte] = self.read_array::<1>()?;
        let value = byte != 0;
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    /// Read one object written by [`WireWriter::write_value`] with a codec of
    /// the same width.
    pub fn read_value<T, C>(&mut self, codec: &C) -> Result<Option<T>>
    where
        C: ValueCodec<T> + ?Sized,
    {
        self.shared.ensure_open()?;
        let (prefix, len) = match codec.width() {
            Some(width) => (None, width),
            None => {
                let mut field = [0u8; LENGTH_FIELD_SIZE];
                self.read_fully(&mut field)?;
                let prefix = LengthPrefix::from_wire(BigEndian::read_i32(&field))
                    .map_err(|e| self.shared.invalid_length(e))?;
                self.shared.check_suspicious(prefix.payload_len());
                (Some(prefix), prefix.payload_len())
            }
        };
        let payload = self.read_vec(len)?;

        let header = if prefix.is_some() { LENGTH_FIELD_SIZE } else { 0 };
        self.shared.metrics.frame_received(header + len);
        if prefix.is_some_and(LengthPrefix::is_compressed) {
            self.shared.metrics.compressed_received();
        }
        self.shared.tracer.object(Direction::Received, len);

        decode_object(
            payload,
            prefix,
            codec,
            self.shared.compressor.as_ref(),
            self.shared.config.max_decompressed_size,
        )
    }

    /// Read a length-prefixed byte array.
    ///
    /// Lengths above the suspicious threshold are logged but still read.
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        self.shared.ensure_open()?;
        let mut field = [0u8; LENGTH_FIELD_SIZE];
        self.read_fully(&mut field)?;
        let len = LengthPrefix::block_from_wire(BigEndian::read_i32(&field))
            .map_err(|e| self.shared.invalid_length(e))?;
        self.shared.check_suspicious(len);

        let bytes = self.read_vec(len)?;
        self.shared.metrics.frame_received(LENGTH_FIELD_SIZE + len);
        self.shared.tracer.block(Direction::Received, &bytes);
        Ok(bytes)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_byte_array()?;
        decode_text(bytes, self.shared.config.charset)
    }

    pub fn is_open(&self) -> bool {
        !self.shared.state.is_closed()
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.shared.state.clone()
    }

    pub fn set_debug(&self, debug: bool) {
        self.shared.tracer.set_enabled(debug);
    }

    /// Recover the transport. Bytes already buffered but not yet read are
    /// lost.
    pub fn into_inner(self) -> R {
        self.input.into_inner()
    }
}

/// Write half of a connection
pub struct WireWriter<W: Write> {
    output: BufWriter<W>,
    shared: Shared,
}

impl<W: Write> WireWriter<W> {
    pub(crate) fn new(output: W, shared: Shared) -> Self {
        Self {
            output: BufWriter::with_capacity(shared.config.buffer_size, output),
            shared,
        }
    }

    fn io<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<W>) -> io::Result<()>,
    {
        op(&mut self.output).map_err(|e| self.shared.transport_error(e))
    }

    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        self.io(|out| out.write_i64::<BigEndian>(value))?;
        self.shared.metrics.frame_sent(8);
        Ok(())
    }

    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        self.io(|out| out.write_i32::<BigEndian>(value))?;
        self.shared.metrics.frame_sent(4);
        Ok(())
    }

    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        self.io(|out| out.write_f64::<BigEndian>(value))?;
        self.shared.metrics.frame_sent(8);
        Ok(())
    }

    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        self.io(|out| out.write_f32::<BigEndian>(value))?;
        self.shared.metrics.frame_sent(4);
        Ok(())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        self.io(|out| out.write_u8(value))?;
        self.shared.metrics.frame_sent(1);
        Ok(())
    }

    /// Emits exactly 0 or 1
    pub fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        self.io(|out| out.write_u8(u8::from(value)))?;
        self.shared.metrics.frame_sent(1);
        Ok(())
    }

    /// Write one object, or an absent value when `value` is `None`.
    ///
    /// Encoding and size checks happen before anything reaches the buffer,
    /// so a `Codec` or `OversizeWrite` error leaves the stream untouched.
    pub fn write_value<T, C>(&mut self, value: Option<&T>, codec: &C) -> Result<()>
    where
        C: ValueCodec<T> + ?Sized,
    {
        self.shared.ensure_open()?;
        let frame = encode_object(
            value,
            codec,
            self.shared.compressor.as_ref(),
            self.shared.config.compression_threshold,
            self.shared.config.max_decompressed_size,
        )
        .inspect_err(|e| {
            if matches!(e, WireError::OversizeWrite { .. }) {
                self.shared.metrics.oversize_rejected();
            }
        })?;

        self.shared.tracer.object(Direction::Sent, frame.payload.len());
        if let Some(length) = frame.length {
            self.io(|out| out.write_i32::<BigEndian>(length))?;
        }
        self.io(|out| out.write_all(&frame.payload))?;

        self.shared.metrics.frame_sent(frame.wire_len());
        if frame.is_compressed() {
            self.shared.metrics.compressed_sent();
        }
        Ok(())
    }

    /// Write a length-prefixed byte array.
    ///
    /// Payloads longer than the configured cap fail with `OversizeWrite`
    /// before any byte is written.
    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.shared.ensure_open()?;
        let length = block_length(bytes.len(), self.shared.config.max_block_size)
            .inspect_err(|_| self.shared.metrics.oversize_rejected())?;

        self.shared.tracer.block(Direction::Sent, bytes);
        self.io(|out| {
            out.write_i32::<BigEndian>(length)?;
            out.write_all(bytes)
        })?;
        self.shared.metrics.frame_sent(LENGTH_FIELD_SIZE + bytes.len());
        Ok(())
    }

    pub fn write_string(&mut self, text: &str) -> Result<()> {
        let bytes = encode_text(text, self.shared.config.charset)?;
        self.write_byte_array(&bytes)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.shared.ensure_open()?;
        self.io(|out| out.flush())
    }

    pub fn is_open(&self) -> bool {
        !self.shared.state.is_closed()
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.shared.state.clone()
    }

    pub fn set_debug(&self, debug: bool) {
        self.shared.tracer.set_enabled(debug);
    }

    /// Flush and recover the transport
    pub fn into_inner(self) -> Result<W> {
        self.output
            .into_inner()
            .map_err(|e| WireError::Transport(e.into_error()))
    }
}

/// Builder for connections with non-default settings or collaborators
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    compressor: Option<Arc<dyn BlockCompressor>>,
    sink: Arc<dyn TraceSink>,
    shutdown: Option<Arc<dyn TransportShutdown>>,
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self {
            config: ConnectionConfig::default(),
            compressor: None,
            sink: Arc::new(TracingSink),
            shutdown: None,
        }
    }
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the compressor named by the config
    pub fn compressor(mut self, compressor: Arc<dyn BlockCompressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Lets `close` interrupt I/O blocked on an adopted transport
    pub fn shutdown_with(mut self, shutdown: Arc<dyn TransportShutdown>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub(crate) fn into_shared(self) -> Shared {
        let compressor = self
            .compressor
            .unwrap_or_else(|| Arc::new(self.config.compression) as Arc<dyn BlockCompressor>);
        Shared {
            tracer: Tracer::new(self.config.debug, self.sink),
            config: Arc::new(self.config),
            compressor,
            metrics: Arc::new(WireMetrics::new()),
            state: CloseHandle::new(self.shutdown),
        }
    }

    /// Wrap an already established transport
    pub fn adopt<R: Read, W: Write>(self, input: R, output: W) -> Connection<R, W> {
        Connection::from_shared(input, output, self.into_shared(), None)
    }
}

/// A typed connection over one duplex transport
pub struct Connection<R, W: Write> {
    reader: WireReader<R>,
    writer: WireWriter<W>,
    shared: Shared,
    peer: Option<SocketAddr>,
}

impl<R: Read, W: Write> Connection<R, W> {
    /// Wrap an already established transport with default settings.
    ///
    /// The connection cannot interrupt blocked I/O on an adopted transport;
    /// use [`ConnectionBuilder::shutdown_with`] for that.
    pub fn adopt(input: R, output: W) -> Self {
        ConnectionBuilder::default().adopt(input, output)
    }

    pub(crate) fn from_shared(
        input: R,
        output: W,
        shared: Shared,
        peer: Option<SocketAddr>,
    ) -> Self {
        Self {
            reader: WireReader::new(input, shared.clone()),
            writer: WireWriter::new(output, shared.clone()),
            shared,
            peer,
        }
    }

    pub fn is_debug(&self) -> bool {
        self.shared.tracer.is_enabled()
    }

    pub fn set_debug(&self, debug: bool) {
        self.shared.tracer.set_enabled(debug);
    }

    pub fn is_open(&self) -> bool {
        !self.shared.state.is_closed()
    }

    /// Flush pending writes best-effort, then release the transport.
    ///
    /// Every later operation fails with `ConnectionClosed`. Closing twice is
    /// a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.shared.state.is_closed() {
            return Ok(());
        }
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "Failed to flush before close");
        }
        self.shared.state.close()?;
        self.shared.metrics.log_summary();
        Ok(())
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.shared.state.clone()
    }

    /// Remote address for socket-backed connections
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn charset(&self) -> Charset {
        self.shared.config.charset
    }

    pub fn metrics(&self) -> &WireMetrics {
        &self.shared.metrics
    }

    /// Separate the two directions so they can move to different threads
    pub fn split(self) -> (WireReader<R>, WireWriter<W>) {
        (self.reader, self.writer)
    }

    /// Flush and recover both transports
    pub fn into_parts(self) -> Result<(R, W)> {
        let output = self.writer.into_inner()?;
        Ok((self.reader.into_inner(), output))
    }

    pub fn read_long(&mut self) -> Result<i64> {
        self.reader.read_long()
    }

    pub fn read_int(&mut self) -> Result<i32> {
        self.reader.read_int()
    }

    pub fn read_double(&mut self) -> Result<f64> {
        self.reader.read_double()
    }

    pub fn read_float(&mut self) -> Result<f32> {
        self.reader.read_float()
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.reader.read_byte()
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        self.reader.read_boolean()
    }

    pub fn read_value<T, C>(&mut self, codec: &C) -> Result<Option<T>>
    where
        C: ValueCodec<T> + ?Sized,
    {
        self.reader.read_value(codec)
    }

    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        self.reader.read_byte_array()
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.reader.read_string()
    }

    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.writer.write_long(value)
    }

    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.writer.write_int(value)
    }

    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.writer.write_double(value)
    }

    pub fn write_float(&mut self, value: f32) -> Result<()> {
        self.writer.write_float(value)
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        self.writer.write_byte(value)
    }

    pub fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.writer.write_boolean(value)
    }

    pub fn write_value<T, C>(&mut self, value: Option<&T>, codec: &C) -> Result<()>
    where
        C: ValueCodec<T> + ?Sized,
    {
        self.writer.write_value(value, codec)
    }

    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_byte_array(bytes)
    }

    pub fn write_string(&mut self, text: &str) -> Result<()> {
        self.writer.write_string(text)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::core::value::{BigEndian, SerdeCodec};
    use crate::utils::trace::tests::MemorySink;
    use std::io::Cursor;

    fn loopback(bytes: Vec<u8>) -> Connection<Cursor<Vec<u8>>, Vec<u8>> {
        Connection::adopt(Cursor::new(bytes), Vec::new())
    }

    fn written(conn: Connection<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<u8> {
        conn.into_parts().unwrap().1
    }

    #[test]
    fn test_primitives_are_big_endian() {
        let mut conn = loopback(Vec::new());
        conn.write_int(1).unwrap();
        conn.write_long(-2).unwrap();
        conn.write_boolean(true).unwrap();
        conn.write_byte(0xAB).unwrap();
        let bytes = written(conn);
        assert_eq!(
            bytes,
            vec![0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 1, 0xAB]
        );
    }

    #[test]
    fn test_boolean_reads_nonzero_as_true() {
        let mut conn = loopback(vec![0, 1, 7]);
        assert!(!conn.read_boolean().unwrap());
        assert!(conn.read_boolean().unwrap());
        assert!(conn.read_boolean().unwrap());
    }

    #[test]
    fn test_closed_connection_rejects_everything() {
        let mut conn = loopback(vec![0; 16]);
        assert!(conn.is_open());
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(!conn.is_open());
        assert!(matches!(conn.read_int(), Err(WireError::ConnectionClosed)));
        assert!(matches!(conn.write_int(1), Err(WireError::ConnectionClosed)));
        assert!(matches!(
            conn.write_byte_array(b"x"),
            Err(WireError::ConnectionClosed)
        ));
        assert!(matches!(conn.flush(), Err(WireError::ConnectionClosed)));
    }

    #[test]
    fn test_negative_block_length_is_invalid() {
        let mut conn = loopback((-5i32).to_be_bytes().to_vec());
        assert!(matches!(
            conn.read_byte_array(),
            Err(WireError::InvalidLength(-5))
        ));
        assert_eq!(conn.metrics().snapshot().frame_corruptions, 1);
    }

    #[test]
    fn test_min_object_length_is_invalid() {
        let mut conn = loopback(i32::MIN.to_be_bytes().to_vec());
        let result: Result<Option<String>> = conn.read_value(&SerdeCodec::<String>::default());
        assert!(matches!(result, Err(WireError::InvalidLength(i32::MIN))));
    }

    #[test]
    fn test_trace_lines() {
        let sink = Arc::new(MemorySink::default());
        let mut conn = ConnectionBuilder::new()
            .trace_sink(sink.clone())
            .adopt(Cursor::new(Vec::new()), Vec::new());
        conn.set_debug(true);
        conn.write_int(5).unwrap();
        conn.write_value(Some(&9i64), &BigEndian::<i64>::new())
            .unwrap();
        conn.write_string("hi there").unwrap();
        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec!["--> 5", "--> 8 bytes", "--> hi.there"]
        );
    }

    #[test]
    fn test_oversize_write_leaves_connection_usable() {
        let config = ConnectionConfig {
            max_block_size: 4,
            ..ConnectionConfig::default()
        };
        let mut conn = ConnectionBuilder::new()
            .config(config)
            .adopt(Cursor::new(Vec::new()), Vec::new());
        assert!(matches!(
            conn.write_byte_array(b"12345"),
            Err(WireError::OversizeWrite { len: 5, limit: 4 })
        ));
        conn.write_byte_array(b"1234").unwrap();
        assert_eq!(conn.metrics().snapshot().oversize_rejections, 1);
        assert_eq!(written(conn), vec![0, 0, 0, 4, b'1', b'2', b'3', b'4']);
    }
}
