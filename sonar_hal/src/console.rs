//! Line-oriented operator console.
//!
//! One command per line, mirroring the scanner's button panel:
//!
//! | Command | Action |
//! |---------|--------|
//! | `start` / `stop` | continuous rotation on/off |
//! | `faster` / `slower` | shorten / lengthen the step delay |
//! | `left` / `right` | counter-clockwise / clockwise |
//! | `+1` / `-1` | one rotation in that direction |
//! | `sensor` | toggle the rangefinder |
//! | `scan` | 360° scan |
//! | `status` | print a snapshot |
//! | `quit` | shut down |

use crate::core::ScannerCore;
use sonar_common::hal::driver::HalError;
use sonar_common::hal::types::Direction;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver};
use thiserror::Error;
use tracing::debug;

/// Operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Continuous rotation.
    Start,
    /// Stop the motor.
    Stop,
    /// Shorter step delay.
    Faster,
    /// Longer step delay.
    Slower,
    /// Counter-clockwise.
    Left,
    /// Clockwise.
    Right,
    /// One rotation, +1 or -1.
    Nudge(i8),
    /// Toggle the rangefinder.
    Sensor,
    /// 360° scan.
    Scan,
    /// Print a snapshot.
    Status,
    /// List commands.
    Help,
    /// Shut down.
    Quit,
}

/// Unrecognized console input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown command '{0}' (try 'help')")]
pub struct ParseCommandError(pub String);

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s.trim().to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "faster" | "speed+" => Command::Faster,
            "slower" | "speed-" => Command::Slower,
            "left" | "ccw" => Command::Left,
            "right" | "cw" => Command::Right,
            "+1" => Command::Nudge(1),
            "-1" => Command::Nudge(-1),
            "sensor" => Command::Sensor,
            "scan" => Command::Scan,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseCommandError(other.to_string())),
        };
        Ok(cmd)
    }
}

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to print; results arrive on the status stream.
    Ack,
    /// Text to print.
    Text(String),
    /// Leave the console loop.
    Quit,
}

/// Help text listing every command.
pub const HELP: &str = "start stop faster slower left right +1 -1 sensor scan status help quit";

/// Run `cmd` against `core`.
///
/// # Errors
/// Propagates the core's refusal (`MotorBusy`) or I/O failures.
pub fn dispatch(core: &ScannerCore, cmd: Command) -> Result<Reply, HalError> {
    match cmd {
        Command::Start => core.start()?,
        Command::Stop => core.stop()?,
        Command::Faster => {
            core.increase_speed();
        }
        Command::Slower => {
            core.decrease_speed();
        }
        Command::Left => core.set_direction(Direction::CounterClockwise),
        Command::Right => core.set_direction(Direction::Clockwise),
        Command::Nudge(direction) => core.nudge_rotation(direction)?,
        Command::Sensor => {
            core.toggle_sensor();
        }
        Command::Scan => core.run_scan()?,
        Command::Status => return Ok(Reply::Text(core.snapshot().to_string())),
        Command::Help => return Ok(Reply::Text(HELP.to_string())),
        Command::Quit => return Ok(Reply::Quit),
    }
    Ok(Reply::Ack)
}

/// Forward lines from `input` to the returned receiver on a detached thread.
///
/// The channel disconnects at end of input, on a read error, or once the
/// receiver is dropped.
///
/// # Errors
/// Returns error if the reader thread cannot be spawned.
pub fn spawn_line_reader<R>(input: R) -> std::io::Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("sonar-stdin".to_string())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        debug!("Console input closed: {}", e);
                        break;
                    }
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn parse_commands() {
        assert_eq!("start".parse::<Command>(), Ok(Command::Start));
        assert_eq!("  STOP \n".parse::<Command>(), Ok(Command::Stop));
        assert_eq!("left".parse::<Command>(), Ok(Command::Left));
        assert_eq!("right".parse::<Command>(), Ok(Command::Right));
        assert_eq!("+1".parse::<Command>(), Ok(Command::Nudge(1)));
        assert_eq!("-1".parse::<Command>(), Ok(Command::Nudge(-1)));
        assert_eq!("sensor".parse::<Command>(), Ok(Command::Sensor));
        assert_eq!("quit".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn parse_unknown() {
        let err = "+2".parse::<Command>().unwrap_err();
        assert_eq!(err, ParseCommandError("+2".to_string()));
        assert!(err.to_string().contains("help"));
    }

    #[test]
    fn help_lists_every_command() {
        for word in HELP.split_whitespace() {
            assert!(word.parse::<Command>().is_ok(), "{word}");
        }
    }

    #[test]
    fn line_reader_forwards_lines_then_disconnects() {
        let rx = spawn_line_reader(Cursor::new("start\n+1\n\nquit\n")).unwrap();
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, ["start", "+1", "", "quit"]);
    }

    #[test]
    fn line_reader_stops_when_receiver_dropped() {
        let rx = spawn_line_reader(Cursor::new("scan\nscan\nscan\n")).unwrap();
        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.parse::<Command>(), Ok(Command::Scan));
        drop(rx);
    }
}
