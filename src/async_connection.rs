//! # Async Connection
//!
//! Tokio counterpart of [`Connection`](crate::connection::Connection) with
//! the identical wire format, so a blocking peer and an async peer can talk
//! to each other.
//!
//! Cancellation follows tokio conventions: dropping an in-flight future
//! abandons the operation, which leaves the stream mid-frame, so the
//! connection must be closed afterwards. Closing through a
//! [`CloseHandle`] wakes any read or write pending on either half with
//! [`WireError::ConnectionClosed`].

use crate::connection::{ConnectionBuilder, Shared};
use crate::core::frame::{LengthPrefix, LENGTH_FIELD_SIZE};
use crate::core::object::{block_length, decode_object, decode_text, encode_object, encode_text};
use crate::core::value::ValueCodec;
use crate::error::{Result, WireError};
use crate::transport::CloseHandle;
use crate::utils::metrics::WireMetrics;
use crate::utils::trace::Direction;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

/// Drive one transport operation until it finishes or the connection closes
async fn until_closed<T, F>(shared: &Shared, op: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::select! {
        biased;
        () = shared.state.cancelled() => Err(WireError::ConnectionClosed),
        result = op => result.map_err(|e| shared.transport_error(e)),
    }
}

/// Read half of an async connection
pub struct AsyncWireReader<R> {
    input: BufReader<R>,
    shared: Shared,
}

impl<R: AsyncRead + Unpin> AsyncWireReader<R> {
    fn new(input: R, shared: Shared) -> Self {
        Self {
            input: BufReader::with_capacity(shared.config.buffer_size, input),
            shared,
        }
    }

    async fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = tokio::select! {
                biased;
                () = self.shared.state.cancelled() => return Err(WireError::ConnectionClosed),
                read = self.input.read(&mut buf[filled..]) => read,
            };
            match read {
                Ok(0) => return Err(self.shared.short_read(buf.len(), filled)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.shared.transport_error(e)),
            }
        }
        Ok(())
    }

    async fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.shared.ensure_open()?;
        let mut buf = [0u8; N];
        self.read_fully(&mut buf).await?;
        self.shared.metrics.frame_received(N);
        Ok(buf)
    }

    async fn read_length(&mut self) -> Result<i32> {
        let mut field = [0u8; LENGTH_FIELD_SIZE];
        self.read_fully(&mut field).await?;
        Ok(i32::from_be_bytes(field))
    }

    pub async fn read_long(&mut self) -> Result<i64> {
        let value = i64::from_be_bytes(self.read_array().await?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub async fn read_int(&mut self) -> Result<i32> {
        let value = i32::from_be_bytes(self.read_array().await?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub async fn read_double(&mut self) -> Result<f64> {
        let value = f64::from_be_bytes(self.read_array().await?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub async fn read_float(&mut self) -> Result<f32> {
        let value = f32::from_be_bytes(self.read_array().await?);
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub async fn read_byte(&mut self) -> Result<u8> {
        let [value] = self.read_array::<1>().await?;
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub async fn read_boolean(&mut self) -> Result<bool> {
        let [byte] = self.read_array::<1>().await?;
        let value = byte != 0;
        self.shared.tracer.value(Direction::Received, value);
        Ok(value)
    }

    pub async fn read_value<T, C>(&mut self, codec: &C) -> Result<Option<T>>
    where
        C: ValueCodec<T> + ?Sized,
    {
        self.shared.ensure_open()?;
        let (prefix, len) = match codec.width() {
            Some(width) => (None, width),
            None => {
                let prefix = LengthPrefix::from_wire(self.read_length().await?)
                    .map_err(|e| self.shared.invalid_length(e))?;
                self.shared.check_suspicious(prefix.payload_len());
                (Some(prefix), prefix.payload_len())
            }
        };

        let mut payload = vec![0u8; len];
        self.read_fully(&mut payload).await?;

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

    pub async fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        self.shared.ensure_open()?;
        let len = LengthPrefix::block_from_wire(self.read_length().await?)
            .map_err(|e| self.shared.invalid_length(e))?;
        self.shared.check_suspicious(len);

        let mut bytes = vec![0u8; len];
        self.read_fully(&mut bytes).await?;
        self.shared.metrics.frame_received(LENGTH_FIELD_SIZE + len);
        self.shared.tracer.block(Direction::Received, &bytes);
        Ok(bytes)
    }

    pub async fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_byte_array().await?;
        decode_text(bytes, self.shared.config.charset)
    }
}

/// Write half of an async connection
pub struct AsyncWireWriter<W> {
    output: BufWriter<W>,
    shared: Shared,
}

impl<W: AsyncWrite + Unpin> AsyncWireWriter<W> {
    fn new(output: W, shared: Shared) -> Self {
        Self {
            output: BufWriter::with_capacity(shared.config.buffer_size, output),
            shared,
        }
    }

    pub async fn write_long(&mut self, value: i64) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        until_closed(&self.shared, self.output.write_i64(value)).await?;
        self.shared.metrics.frame_sent(8);
        Ok(())
    }

    pub async fn write_int(&mut self, value: i32) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        until_closed(&self.shared, self.output.write_i32(value)).await?;
        self.shared.metrics.frame_sent(4);
        Ok(())
    }

    pub async fn write_double(&mut self, value: f64) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        until_closed(&self.shared, self.output.write_f64(value)).await?;
        self.shared.metrics.frame_sent(8);
        Ok(())
    }

    pub async fn write_float(&mut self, value: f32) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        until_closed(&self.shared, self.output.write_f32(value)).await?;
        self.shared.metrics.frame_sent(4);
        Ok(())
    }

    pub async fn write_byte(&mut self, value: u8) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        until_closed(&self.shared, self.output.write_u8(value)).await?;
        self.shared.metrics.frame_sent(1);
        Ok(())
    }

    pub async fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.tracer.value(Direction::Sent, value);
        until_closed(&self.shared, self.output.write_u8(u8::from(value))).await?;
        self.shared.metrics.frame_sent(1);
        Ok(())
    }

    pub async fn write_value<T, C>(&mut self, value: Option<&T>, codec: &C) -> Result<()>
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
            until_closed(&self.shared, self.output.write_i32(length)).await?;
        }
        until_closed(&self.shared, self.output.write_all(&frame.payload)).await?;

        self.shared.metrics.frame_sent(frame.wire_len());
        if frame.is_compressed() {
            self.shared.metrics.compressed_sent();
        }
        Ok(())
    }

    pub async fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.shared.ensure_open()?;
        let length = block_length(bytes.len(), self.shared.config.max_block_size)
            .inspect_err(|_| self.shared.metrics.oversize_rejected())?;

        self.shared.tracer.block(Direction::Sent, bytes);
        until_closed(&self.shared, self.output.write_i32(length)).await?;
        until_closed(&self.shared, self.output.write_all(bytes)).await?;
        self.shared.metrics.frame_sent(LENGTH_FIELD_SIZE + bytes.len());
        Ok(())
    }

    pub async fn write_string(&mut self, text: &str) -> Result<()> {
        let bytes = encode_text(text, self.shared.config.charset)?;
        self.write_byte_array(&bytes).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.shared.ensure_open()?;
        until_closed(&self.shared, self.output.flush()).await
    }

    /// Flush and shut down the write side of the transport
    async fn shutdown(&mut self) -> Result<()> {
        until_closed(&self.shared, self.output.shutdown()).await
    }
}

/// A typed async connection over one duplex transport
pub struct AsyncConnection<R, W> {
    reader: AsyncWireReader<R>,
    writer: AsyncWireWriter<W>,
    shared: Shared,
    peer: Option<SocketAddr>,
}

/// Async connection over a TCP socket
pub type AsyncTcpConnection = AsyncConnection<OwnedReadHalf, OwnedWriteHalf>;

impl ConnectionBuilder {
    /// Wrap an already established async transport
    pub fn adopt_async<R, W>(self, input: R, output: W) -> AsyncConnection<R, W>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        AsyncConnection::from_shared(input, output, self.into_shared(), None)
    }

    /// Connect to `host:port` asynchronously
    #[instrument(skip(self))]
    pub async fn connect(self, host: &str, port: u16) -> Result<AsyncTcpConnection> {
        let stream = TcpStream::connect((host, port)).await?;
        info!(host, port, "Connected");
        self.from_tokio_tcp(stream)
    }

    /// Wrap an accepted tokio socket
    pub fn from_tokio_tcp(self, stream: TcpStream) -> Result<AsyncTcpConnection> {
        let peer = stream.peer_addr().ok();
        let (input, output) = stream.into_split();
        Ok(AsyncConnection::from_shared(
            input,
            output,
            self.into_shared(),
            peer,
        ))
    }
}

impl AsyncConnection<OwnedReadHalf, OwnedWriteHalf> {
    /// Connect to `host:port` with default settings
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        ConnectionBuilder::default().connect(host, port).await
    }
}

impl<R, W> AsyncConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn adopt(input: R, output: W) -> Self {
        ConnectionBuilder::default().adopt_async(input, output)
    }

    fn from_shared(input: R, output: W, shared: Shared, peer: Option<SocketAddr>) -> Self {
        Self {
            reader: AsyncWireReader::new(input, shared.clone()),
            writer: AsyncWireWriter::new(output, shared.clone()),
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

    /// Flush, shut down the write side and mark the connection closed.
    ///
    /// The peer observes end-of-stream. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.shared.state.is_closed() {
            return Ok(());
        }
        if let Err(e) = self.writer.shutdown().await {
            warn!(error = %e, "Failed to shut down before close");
        }
        self.shared.state.close()?;
        self.shared.metrics.log_summary();
        Ok(())
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.shared.state.clone()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn metrics(&self) -> &WireMetrics {
        &self.shared.metrics
    }

    pub fn split(self) -> (AsyncWireReader<R>, AsyncWireWriter<W>) {
        (self.reader, self.writer)
    }

    pub async fn read_long(&mut self) -> Result<i64> {
        self.reader.read_long().await
    }

    pub async fn read_int(&mut self) -> Result<i32> {
        self.reader.read_int().await
    }

    pub async fn read_double(&mut self) -> Result<f64> {
        self.reader.read_double().await
    }

    pub async fn read_float(&mut self) -> Result<f32> {
        self.reader.read_float().await
    }

    pub async fn read_byte(&mut self) -> Result<u8> {
        self.reader.read_byte().await
    }

    pub async fn read_boolean(&mut self) -> Result<bool> {
        self.reader.read_boolean().await
    }

    pub async fn read_value<T, C>(&mut self, codec: &C) -> Result<Option<T>>
    where
        C: ValueCodec<T> + ?Sized,
    {
        self.reader.read_value(codec).await
    }

    pub async fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        self.reader.read_byte_array().await
    }

    pub async fn read_string(&mut self) -> Result<String> {
        self.reader.read_string().await
    }

    pub async fn write_long(&mut self, value: i64) -> Result<()> {
        self.writer.write_long(value).await
    }

    pub async fn write_int(&mut self, value: i32) -> Result<()> {
        self.writer.write_int(value).await
    }

    pub async fn write_double(&mut self, value: f64) -> Result<()> {
        self.writer.write_double(value).await
    }

    pub async fn write_float(&mut self, value: f32) -> Result<()> {
        self.writer.write_float(value).await
    }

    pub async fn write_byte(&mut self, value: u8) -> Result<()> {
        self.writer.write_byte(value).await
    }

    pub async fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.writer.write_boolean(value).await
    }

    pub async fn write_value<T, C>(&mut self, value: Option<&T>, codec: &C) -> Result<()>
    where
        C: ValueCodec<T> + ?Sized,
    {
        self.writer.write_value(value, codec).await
    }

    pub async fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_byte_array(bytes).await
    }

    pub async fn write_string(&mut self, text: &str) -> Result<()> {
        self.writer.write_string(text).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await
    }
}
