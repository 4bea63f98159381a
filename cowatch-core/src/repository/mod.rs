pub mod chat;
pub mod content;
pub mod playback;
pub mod session;
pub mod viewer;

pub use chat::ChatRepository;
pub use content::ContentRepository;
pub use playback::PlaybackStateRepository;
pub use session::SessionRepository;
pub use viewer::ViewerRepository;
