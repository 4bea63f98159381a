pub mod chat;
pub mod content;
pub mod playback;
pub mod session;
pub mod viewer;


pub use chat::ChatService;
pub use content::ContentService;
pub use playback::PlaybackService;
pub use session::SessionService;
pub use viewer::ViewerService;
