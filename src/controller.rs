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
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::engine::{EngineError, Metronome};

pub mod keyboard;

/// Controller events that will trigger behavior in the metronome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Starts playing. If already playing, the next beat sounds immediately.
    Start,

    /// Stops playing. If already stopped, does nothing.
    Stop,

    /// Starts when stopped, stops when playing.
    Toggle,

    /// Changes the tempo.
    SetBpm(u32),

    /// Loads a sample file.
    SetSample(PathBuf),

    /// Switches back to the built-in click.
    DefaultSample,

    /// Ends the session.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Controls a metronome.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(metronome: Arc<Metronome>, driver: Arc<dyn Driver>) -> Controller {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(Controller::trigger_events(metronome, driver).instrument(span)),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Stops the controller if it is still running and waits until it has
    /// released the metronome.
    pub async fn shutdown(mut self) {
        if self.handle.is_finished() {
            return;
        }
        self.handle.abort();
        if let Err(e) = (&mut self.handle).await {
            if !e.is_cancelled() {
                error!(err = %e, "Controller failed");
            }
        }
    }

    /// Triggers metronome events by watching the driver and getting events from it.
    async fn trigger_events(metronome: Arc<Metronome>, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(bpm = metronome.bpm(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");
            if event == Event::Quit {
                break;
            }

            // Loading a sample decodes a file, so keep it off the runtime.
            let target = metronome.clone();
            match tokio::task::spawn_blocking(move || Controller::apply(&target, event)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(err = %e, "Error talking to metronome"),
                Err(e) => error!(err = %e, "Event handler failed"),
            }
        }

        info!("Controller closing.");
        // The driver may be blocked on input, so it is not waited for on quit.
        if join_handle.is_finished() {
            if let Err(e) = join_handle.await {
                error!("Error waiting for event monitor to stop: {}", e);
            }
        }
    }

    fn apply(metronome: &Metronome, event: Event) -> Result<(), EngineError> {
        match event {
            Event::Start => metronome.start(),
            Event::Stop => metronome.stop(),
            Event::Toggle => metronome.toggle(),
            Event::SetBpm(bpm) => metronome.set_bpm(bpm)?,
            Event::SetSample(path) => metronome.set_sample_path(&path)?,
            Event::DefaultSample => metronome.use_default_sample()?,
            Event::Quit => {}
        }
        Ok(())
    }
}
