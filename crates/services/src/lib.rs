#![forbid(unsafe_code)]

pub mod controller;
pub mod error;
pub mod gateway;
pub mod pacing;
pub mod view;

pub use learncheck_core::Clock;

pub use controller::{ActionOutcome, Notice, QuizController};
pub use error::GatewayError;
pub use gateway::{
    GatewayConfig, HintRequest, HttpQuizGateway, QuizGateway, QuizMetadata, QuizPayload,
};
pub use pacing::{ActionKind, Pacing};
pub use view::{QuizSnapshot, Screen, ViewState};
