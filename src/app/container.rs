use std::sync::Arc;

use crate::adapters::{LibavToolkit, TomlConfigAdapter, TracingLogAdapter};
use crate::app::{
    channel::ChannelHandler, inspect_interactor::InspectInteractor,
    merge_interactor::MergeInteractor, verify_interactor::VerifyInteractor,
};
use crate::domain::model::MergeSettings;
use crate::engine::MergeEngine;
use crate::error::MediaResult;
use crate::ports::{ConfigPort, LogLevel, LogPort, MediaToolkit};

pub trait AppContainer<T: MediaToolkit>: Send + Sync {
    fn merge_interactor(&self) -> Arc<MergeInteractor<T>>;
    fn inspect_interactor(&self) -> Arc<InspectInteractor<T>>;
    fn verify_interactor(&self) -> Arc<VerifyInteractor<T>>;
    fn channel_handler(&self) -> Arc<ChannelHandler<T>>;
}

pub struct DefaultAppContainer<T: MediaToolkit> {
    merge_interactor: Arc<MergeInteractor<T>>,
    inspect_interactor: Arc<InspectInteractor<T>>,
    verify_interactor: Arc<VerifyInteractor<T>>,
    channel_handler: Arc<ChannelHandler<T>>,
}

impl DefaultAppContainer<LibavToolkit> {
    /// Wire the application against FFmpeg
    pub fn new(settings: &MergeSettings) -> MediaResult<Self> {
        let toolkit = Arc::new(LibavToolkit::new(settings)?);
        Ok(Self::with_toolkit(toolkit, settings))
    }
}

impl<T: MediaToolkit + 'static> DefaultAppContainer<T> {
    pub fn with_toolkit(toolkit: Arc<T>, settings: &MergeSettings) -> Self {
        let level = LogLevel::parse(&settings.logging.level).unwrap_or(LogLevel::Info);
        let log_port = Arc::new(TracingLogAdapter::new(level));
        let config_port = Arc::new(TomlConfigAdapter::with_settings(settings.clone()));
        let engine = Arc::new(MergeEngine::new(
            Arc::clone(&toolkit),
            settings.output.clone(),
        ));

        let merge_interactor = Arc::new(MergeInteractor::new(
            engine,
            Arc::clone(&log_port) as Arc<dyn LogPort>,
        ));

        let inspect_interactor = Arc::new(InspectInteractor::new(
            Arc::clone(&toolkit),
            Arc::clone(&log_port) as Arc<dyn LogPort>,
        ));

        let verify_interactor = Arc::new(VerifyInteractor::new(
            Arc::clone(&toolkit),
            Arc::clone(&log_port) as Arc<dyn LogPort>,
        ));

        let channel_handler = Arc::new(ChannelHandler::new(
            Arc::clone(&merge_interactor),
            config_port as Arc<dyn ConfigPort>,
        ));

        Self {
            merge_interactor,
            inspect_interactor,
            verify_interactor,
            channel_handler,
        }
    }
}

impl<T: MediaToolkit + 'static> AppContainer<T> for DefaultAppContainer<T> {
    fn merge_interactor(&self) -> Arc<MergeInteractor<T>> {
        Arc::clone(&self.merge_interactor)
    }

    fn inspect_interactor(&self) -> Arc<InspectInteractor<T>> {
        Arc::clone(&self.inspect_interactor)
    }

    fn verify_interactor(&self) -> Arc<VerifyInteractor<T>> {
        Arc::clone(&self.verify_interactor)
    }

    fn channel_handler(&self) -> Arc<ChannelHandler<T>> {
        Arc::clone(&self.channel_handler)
    }
}
