pub mod app;
pub mod availability;
pub mod clock;
pub mod compactor;
pub mod config;
pub mod error;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod wal;

pub use app::App;
pub use availability::{AvailableSlot, OverrunPolicy};
pub use error::BookingError;
pub use scheduler::Scheduler;
pub use session::BookingSession;
pub use store::{AccountService, DocumentStore, GroomingStore, SessionAccount};
