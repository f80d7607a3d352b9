//! PDU framing over async byte streams.
//!
//! Each message on the wire is a PDU: two magic bytes, an integer
//! payload length, then one encoded value. The reader suspends until
//! enough bytes arrive; it never polls.

use bser::Tag;
use bser::Value;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

use crate::error::Error;
use crate::error::Result;
use crate::transport::BoxReader;
use crate::transport::BoxWriter;
use crate::transport::MessageSink;
use crate::transport::MessageSource;

/// Reads exactly one PDU off the stream and decodes its payload.
pub(crate) async fn read_pdu<R>(reader: &mut R) -> Result<Value>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;
    if header != bser::PDU_HEADER {
        return Err(Error::Decode(bser::Error::BadPduHeader(header)));
    }

    // The length is itself a tagged integer of unknown width, so it
    // is read in two steps before the payload can be sized.
    let mut tag_byte = [0u8; 1];
    reader.read_exact(&mut tag_byte).await?;
    let tag = Tag::from_u8(tag_byte[0]).ok_or(Error::Decode(bser::Error::InvalidTag(tag_byte[0])))?;
    let width = tag
        .int_width()
        .ok_or(Error::Decode(bser::Error::ExpectedInt(tag_byte[0])))?;

    let mut int_buf = [0u8; 9];
    int_buf[0] = tag_byte[0];
    reader.read_exact(&mut int_buf[1..1 + width]).await?;
    let len = bser::Decoder::new(&int_buf[..1 + width]).int().map_err(Error::Decode)?;
    let len = usize::try_from(len).map_err(|_| Error::Decode(bser::Error::BadLength(len)))?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    bser::decode(&payload).map_err(Error::Decode)
}

/// [`MessageSource`] that decodes PDUs from a transport's read half.
pub(crate) struct PduSource {
    reader: BoxReader,
}

impl PduSource {
    pub(crate) fn new(reader: BoxReader) -> Self {
        Self { reader }
    }
}

#[async_trait::async_trait]
impl MessageSource for PduSource {
    async fn next_message(&mut self) -> Result<Option<Value>> {
        read_pdu(self.reader.as_mut()).await.map(Some)
    }
}

/// [`MessageSink`] that writes pre-encoded PDUs to a transport's
/// write half.
pub(crate) struct PduSink {
    writer: BoxWriter,
}

impl PduSink {
    pub(crate) fn new(writer: BoxWriter) -> Self {
        Self { writer }
    }
}

#[async_trait::async_trait]
impl MessageSink for PduSink {
    async fn write_message(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
