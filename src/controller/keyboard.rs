// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::path::PathBuf;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const START: &str = "start";
const STOP: &str = "stop";
const TOGGLE: &str = "toggle";
const BPM: &str = "bpm";
const SAMPLE: &str = "sample";
const DEFAULT: &str = "default";
const QUIT: &str = "quit";

/// A controller that controls a metronome using the keyboard. An empty line
/// toggles playback.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {}, {} <n>, {} <path>, {}, {}): ",
            START, STOP, TOGGLE, BPM, SAMPLE, DEFAULT, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let event = match Self::parse(input.trim()) {
            Ok(event) => event,
            Err(reason) => {
                warn!(input = input.trim(), reason, "Unrecognized input");
                return Ok(true);
            }
        };
        let quit = event == Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(!quit)
    }

    fn parse(input: &str) -> Result<Event, &'static str> {
        let (command, argument) = match input.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (input, ""),
        };

        match (command.to_lowercase().as_str(), argument) {
            ("", _) | (TOGGLE, "") => Ok(Event::Toggle),
            (START, "") => Ok(Event::Start),
            (STOP, "") => Ok(Event::Stop),
            (DEFAULT, "") => Ok(Event::DefaultSample),
            (QUIT, "") => Ok(Event::Quit),
            (BPM, bpm) => bpm
                .parse::<u32>()
                .map(Event::SetBpm)
                .map_err(|_| "bpm needs a whole number"),
            (SAMPLE, "") => Err("sample needs a path"),
            (SAMPLE, path) => Ok(Event::SetSample(PathBuf::from(path))),
            _ => Err("unknown command"),
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}
