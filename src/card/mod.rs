pub mod config;
pub mod controller;
pub mod payload;
pub mod pipeline;
pub mod ports;
pub mod render;
pub mod sync;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use config::CardConfig;
pub use controller::CardController;
pub use payload::DisplayPayload;
pub use pipeline::{RefreshPipeline, RefreshReport};
pub use ports::{
    CardRenderer, Clock, DisplayUnit, ReadingSource, RecordStore, RecordStoreError,
    RenderRequest, SystemClock,
};
pub use render::PngCardRenderer;
pub use sync::SyncAction;
pub use trigger::RefreshTrigger;
