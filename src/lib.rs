pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod frame;
pub mod logging;
pub mod rl;

pub use adapters::{
    InMemoryMarketStore, PgMarketStore, PredictionLog, PriceStore, RetryPolicy, RetryingStore,
};
pub use config::AppConfig;
pub use domain::{PredictionRecord, PricePoint, Timestamp};
pub use error::{A3cError, Result};
pub use frame::{build_frame, Frame, FrameBuilder, FrameService};
pub use logging::init_logging;
pub use rl::{
    ActorCriticConfig, ActorCriticNetwork, FileModelStore, GradientMap, InferenceBackend,
    ModelHandle, ModelLifecycle, ModelStore, Prediction, Predictor, Trade, TradeAction,
    TradeStep, Trainer, TrainerConfig, TrainingBackend, TrainingReport,
};
