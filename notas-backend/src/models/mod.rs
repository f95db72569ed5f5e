mod note;
mod session;
mod user;

pub use note::{Note, NoteForm};
pub use session::{AuthSession, Session};
pub use user::{User, UserInfo};
