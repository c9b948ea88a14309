mod progress;
mod sentences;
mod status;

pub use progress::ProgressPane;
pub use sentences::SentencesPane;
pub use status::StatusBarPane;
