use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineEvent {
    Line(String),
    /// The primary output stream reached end of file.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineSource {
    /// Debugger stdout; its closure means the debugger is gone.
    Primary,
    /// Debugger stderr, merged into the same channel.
    Secondary,
}

/// Forwards every complete line of `output` into `lines`. A partial final
/// line (no trailing newline at end of stream) is discarded.
pub(crate) fn spawn_line_reader<R>(
    output: R,
    lines: mpsc::UnboundedSender<LineEvent>,
    source: LineSource,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_lines(output, lines, source))
}

async fn read_lines<R>(output: R, lines: mpsc::UnboundedSender<LineEvent>, source: LineSource)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) if buf.last() != Some(&b'\n') => {
                tracing::debug!("Discarding partial final line from {:?} output", source);
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if lines.send(LineEvent::Line(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("Failed reading debugger {:?} output: {}", source, e);
                break;
            }
        }
    }

    if source == LineSource::Primary {
        let _ = lines.send(LineEvent::Closed);
    }
}
