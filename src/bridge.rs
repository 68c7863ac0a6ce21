//! Worker thread between the board's event loop and the blocking API client.
//! The UI thread owns the `Pipeline`; the worker only performs calls and
//! hands results back tagged with the pending state they belong to.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread;

use crate::api::JobTrackerApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{Application, Interview, RecordId};
use crate::pipeline::{PendingLoad, PendingMove, Pipeline};

const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum BoardCommand {
    Load(PendingLoad),
    UpdateStatus(PendingMove),
    SaveNotes { id: RecordId, notes: String },
    ScheduleInterview { id: RecordId, interview: Interview },
    Delete { id: RecordId },
}

impl BoardCommand {
    fn name(&self) -> &'static str {
        match self {
            BoardCommand::Load(_) => "load",
            BoardCommand::UpdateStatus(_) => "update_status",
            BoardCommand::SaveNotes { .. } => "save_notes",
            BoardCommand::ScheduleInterview { .. } => "schedule_interview",
            BoardCommand::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug)]
pub enum BoardEvent {
    Loaded(PendingLoad, ApiResult<Vec<Application>>),
    StatusUpdated(PendingMove, ApiResult<()>),
    NotesSaved(ApiResult<()>),
    InterviewScheduled(ApiResult<()>),
    Deleted(RecordId, ApiResult<()>),
}

pub fn execute(api: &dyn JobTrackerApi, command: BoardCommand) -> BoardEvent {
    match command {
        BoardCommand::Load(pending) => BoardEvent::Loaded(pending, api.applications()),
        BoardCommand::UpdateStatus(pending) => {
            let result = api.update_status(&pending.application_id, pending.status);
            BoardEvent::StatusUpdated(pending, result)
        }
        BoardCommand::SaveNotes { id, notes } => BoardEvent::NotesSaved(api.update_notes(&id, &notes)),
        BoardCommand::ScheduleInterview { id, interview } => {
            BoardEvent::InterviewScheduled(api.schedule_interview(&id, &interview))
        }
        BoardCommand::Delete { id } => {
            let result = api.delete_application(&id);
            BoardEvent::Deleted(id, result)
        }
    }
}

/// The completion a command would have produced had the worker failed it.
fn rejected(command: BoardCommand, error: ApiError) -> BoardEvent {
    match command {
        BoardCommand::Load(pending) => BoardEvent::Loaded(pending, Err(error)),
        BoardCommand::UpdateStatus(pending) => BoardEvent::StatusUpdated(pending, Err(error)),
        BoardCommand::SaveNotes { .. } => BoardEvent::NotesSaved(Err(error)),
        BoardCommand::ScheduleInterview { .. } => BoardEvent::InterviewScheduled(Err(error)),
        BoardCommand::Delete { id } => BoardEvent::Deleted(id, Err(error)),
    }
}

/// Queues a command, or settles it as failed if the queue refuses it so the
/// pipeline never waits on a request that was not sent. A follow-up reload
/// gets one attempt; if that is refused too the board keeps what it shows.
fn send(tx: &Sender<BoardCommand>, pipeline: &mut Pipeline, command: BoardCommand) {
    let mut next = Some(command);
    while let Some(command) = next.take() {
        let name = command.name();
        let (command, error) = match tx.try_send(command) {
            Ok(()) => {
                tracing::debug!(command = name, "queued board command");
                continue;
            }
            Err(TrySendError::Full(command)) => {
                (command, ApiError::NotSent("Too many pending requests; please retry"))
            }
            Err(TrySendError::Disconnected(command)) => {
                (command, ApiError::NotSent("Background worker stopped; restart the board"))
            }
        };
        tracing::warn!(command = name, error = %error, "board command not queued");
        next = apply(pipeline, rejected(command, error));
    }
}

/// Feeds a completion into the pipeline. Returns the re-fetch to issue when
/// the pipeline owes one.
pub fn apply(pipeline: &mut Pipeline, event: BoardEvent) -> Option<BoardCommand> {
    match event {
        BoardEvent::Loaded(pending, result) => {
            pipeline.finish_load(pending, result);
        }
        BoardEvent::StatusUpdated(pending, result) => {
            pipeline.finish_move(&pending, result);
        }
        BoardEvent::NotesSaved(result) => pipeline.finish_notes(result),
        BoardEvent::InterviewScheduled(result) => pipeline.finish_interview(result),
        BoardEvent::Deleted(id, result) => pipeline.finish_delete(&id, result),
    }
    pipeline
        .take_reload()
        .then(|| BoardCommand::Load(pipeline.begin_load()))
}

pub struct Bridge {
    cmd_tx: Sender<BoardCommand>,
    event_rx: Receiver<BoardEvent>,
}

impl Bridge {
    /// Dropping the bridge closes the command queue and the worker exits
    /// after its current call.
    pub fn start(api: Arc<dyn JobTrackerApi>) -> Result<Self> {
        let (cmd_tx, cmd_rx) = bounded::<BoardCommand>(QUEUE_DEPTH);
        let (event_tx, event_rx) = bounded::<BoardEvent>(QUEUE_DEPTH);

        thread::Builder::new()
            .name("jobtrack-worker".to_string())
            .spawn(move || {
                tracing::debug!("board worker started");
                while let Ok(command) = cmd_rx.recv() {
                    let name = command.name();
                    let event = execute(api.as_ref(), command);
                    tracing::debug!(command = name, "board command finished");
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                tracing::debug!("board worker stopped");
            })
            .context("Failed to start board worker")?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn dispatch(&self, pipeline: &mut Pipeline, command: BoardCommand) {
        send(&self.cmd_tx, pipeline, command);
    }

    /// Everything that completed since the last call, without blocking.
    pub fn drain(&self) -> Vec<BoardEvent> {
        self.event_rx.try_iter().collect()
    }
}
