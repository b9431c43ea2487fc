use std::{ffi::OsStr, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::mpsc,
};
use tracing::{debug, warn};

use crate::{
    error::EngineError,
    uci::{parse_line, EngineEvent, UciCommand},
};

/// The outgoing half of an analysis engine connection.
///
/// Sending never waits for the engine: commands are queued and delivered in order.
/// The engine's answers come back separately as [`EngineEvent`]s on a channel.
pub trait EngineTransport: Send {
    fn send(&mut self, command: &UciCommand) -> Result<(), EngineError>;
}

/// Hands commands to an in-process engine over a channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    commands: mpsc::UnboundedSender<UciCommand>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UciCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (ChannelTransport { commands }, rx)
    }
}

impl EngineTransport for ChannelTransport {
    fn send(&mut self, command: &UciCommand) -> Result<(), EngineError> {
        self.commands
            .send(command.clone())
            .map_err(|_| EngineError::Disconnected)
    }
}

/// A UCI engine running as a child process.
///
/// Must be created inside a tokio runtime: a writer task feeds the child's stdin and a
/// reader task turns its stdout into events. The child is killed when this is dropped.
#[derive(Debug)]
pub struct UciProcess {
    commands: mpsc::UnboundedSender<String>,
    _child: Child,
}

impl UciProcess {
    pub fn spawn(
        program: impl AsRef<OsStr>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), EngineError> {
        Self::spawn_with_args(program, std::iter::empty::<&OsStr>())
    }

    pub fn spawn_with_args<I, A>(
        program: impl AsRef<OsStr>,
        args: I,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), EngineError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdin = child.stdin.take().ok_or(EngineError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(EngineError::MissingPipe("stdout"))?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(write_commands(stdin, command_rx));
        tokio::spawn(read_events(stdout, event_tx));

        Ok((
            UciProcess {
                commands,
                _child: child,
            },
            events,
        ))
    }
}

impl EngineTransport for UciProcess {
    fn send(&mut self, command: &UciCommand) -> Result<(), EngineError> {
        self.commands
            .send(command.to_string())
            .map_err(|_| EngineError::Disconnected)
    }
}

async fn write_commands(mut stdin: ChildStdin, mut commands: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = commands.recv().await {
        debug!(command = %line, "to engine");
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        if let Err(why) = written.await {
            warn!(error = %why, "could not write to the analysis engine");
            break;
        }
    }
}

async fn read_events(stdout: ChildStdout, events: mpsc::UnboundedSender<EngineEvent>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Some(event) => {
                    if events.send(event).is_err() {
                        return;
                    }
                }
                None => debug!(line = %line, "ignored engine output"),
            },
            Ok(None) => break,
            Err(why) => {
                warn!(error = %why, "could not read from the analysis engine");
                break;
            }
        }
    }
    let _ = events.send(EngineEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rules::MoveRequest, uci::RawScore};
    use shakmaty::Square;

    #[test]
    fn channel_transport_forwards_in_order() {
        let (mut transport, mut rx) = ChannelTransport::new();
        transport.send(&UciCommand::Uci).unwrap();
        transport.send(&UciCommand::GoDepth(3)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), UciCommand::Uci);
        assert_eq!(rx.try_recv().unwrap(), UciCommand::GoDepth(3));
        drop(rx);
        assert!(matches!(
            transport.send(&UciCommand::Stop),
            Err(EngineError::Disconnected)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_process_output_becomes_events() {
        let script = r#"read cmd; echo "id name fake"; echo uciok; echo "info depth 1 score cp 15 pv e2e4"; echo "bestmove e2e4""#;
        let (mut engine, mut events) = UciProcess::spawn_with_args("sh", ["-c", script]).unwrap();
        engine.send(&UciCommand::Uci).unwrap();

        assert_eq!(events.recv().await, Some(EngineEvent::UciOk));
        assert_eq!(
            events.recv().await,
            Some(EngineEvent::Score(RawScore::Centipawns(15)))
        );
        assert_eq!(
            events.recv().await,
            Some(EngineEvent::BestMove(Some(MoveRequest::new(Square::E2, Square::E4))))
        );
        assert_eq!(events.recv().await, Some(EngineEvent::Disconnected));
    }

    #[tokio::test]
    async fn missing_engine_fails_to_spawn() {
        let result = UciProcess::spawn("/definitely/not/a/chess/engine");
        assert!(matches!(result, Err(EngineError::Spawn(_))));
    }
}
