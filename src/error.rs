//! Error types for run lifecycle misuse

use thiserror::Error;

/// Misuse of the [`crate::sequencer::Sequencer`] state machine
///
/// Request failures are never errors; they are counted and fed to the
/// failure chain. These variants only cover calling the lifecycle
/// operations out of order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerError {
    /// `start` called on a sequencer that already left `Idle`
    #[error("sequencer already started")]
    AlreadyStarted,

    /// `wait_for_completion` called before `start`
    #[error("sequencer not started")]
    NotStarted,

    /// The driving loop thread panicked
    #[error("sequencer loop panicked")]
    LoopPanicked,
}
