// Application layer - Use case interactors

pub mod channel;
pub mod container;
pub mod inspect_interactor;
pub mod merge_interactor;
pub mod verify_interactor;

// Re-export interactors
pub use channel::{ChannelHandler, ChannelResponse, MethodCall};
pub use container::{AppContainer, DefaultAppContainer};
pub use inspect_interactor::InspectInteractor;
pub use merge_interactor::{MergeInteractor, MergeResponse};
pub use verify_interactor::VerifyInteractor;
