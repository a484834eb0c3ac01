pub mod broker;

pub use broker::{LogBroker, LogFrame, LogObserver};
