mod ids;
mod preferences;
mod question;
mod session;

pub use ids::{OptionId, QuestionId, SessionKey, TutorialId, UserId};
pub use preferences::UserPreferences;
pub use question::{Question, QuestionOption};
pub use session::{CheckedStatus, Session, SessionError};
