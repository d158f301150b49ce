//! Two-phase frame I/O: CRLF-delimited text and length-bounded binary.
//!
//! The text reader consumes one byte at a time so that nothing past the
//! CRLF is buffered; a binary payload announced by the line it just read is
//! still fully present on the socket for [`read_payload`].

use bytes::{Bytes, BytesMut};
use krill_types::{BINARY_TIMEOUT, TEXT_TIMEOUT};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtoError;

/// Upper bound on a single text line, matching the original protocol.
pub const MAX_LINE_LEN: usize = 4096;

/// Read one CRLF-terminated line, without the terminator.
///
/// EOF with buffered bytes yields the partial line; EOF on an empty buffer
/// is [`ProtoError::ConnectionClosed`]. The whole read is bounded by the
/// text deadline.
pub async fn read_line<R>(reader: &mut R) -> Result<String, ProtoError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(TEXT_TIMEOUT, read_line_inner(reader))
        .await
        .map_err(|_| ProtoError::Timeout)?
}

async fn read_line_inner<R>(reader: &mut R) -> Result<String, ProtoError>
where
    R: AsyncRead + Unpin,
{
    let mut line: Vec<u8> = Vec::with_capacity(128);
    let mut byte = [0u8; 1];

    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            if line.is_empty() {
                return Err(ProtoError::ConnectionClosed);
            }
            break;
        }

        if byte[0] == b'\n' && line.last() == Some(&b'\r') {
            line.pop();
            break;
        }

        line.push(byte[0]);
        if line.len() > MAX_LINE_LEN {
            return Err(ProtoError::LineTooLong);
        }
    }

    String::from_utf8(line)
        .ok()
        .filter(|s| s.is_ascii())
        .ok_or(ProtoError::NotAscii)
}

/// Write one line, appending CRLF.
pub async fn write_line<W>(writer: &mut W, line: &str) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    let mut framed = String::with_capacity(line.len() + 2);
    framed.push_str(line);
    framed.push_str("\r\n");
    write_text(writer, &framed).await
}

/// Write already-framed text (each line must carry its own CRLF).
///
/// Multi-record replies are assembled as one string and sent in a single
/// write, matching the coordinator's original behavior.
pub async fn write_text<W>(writer: &mut W, text: &str) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    tokio::time::timeout(TEXT_TIMEOUT, async {
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
        Ok::<_, std::io::Error>(())
    })
    .await
    .map_err(|_| ProtoError::Timeout)??;
    Ok(())
}

/// Read exactly `size` raw payload bytes under the binary deadline.
pub async fn read_payload<R>(reader: &mut R, size: usize) -> Result<Bytes, ProtoError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(BINARY_TIMEOUT, async {
        let mut buf = BytesMut::zeroed(size);
        reader.read_exact(&mut buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtoError::ConnectionClosed
            } else {
                ProtoError::Io(e)
            }
        })?;
        Ok(buf.freeze())
    })
    .await
    .map_err(|_| ProtoError::Timeout)?
}

/// Write a raw payload under the binary deadline. No framing, no escaping.
pub async fn write_payload<W>(writer: &mut W, data: &[u8]) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
{
    tokio::time::timeout(BINARY_TIMEOUT, async {
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok::<_, std::io::Error>(())
    })
    .await
    .map_err(|_| ProtoError::Timeout)??;
    Ok(())
}
