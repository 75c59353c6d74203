pub mod mock_processor;
pub mod prepare_env;
pub mod seed;

pub use mock_processor::{MockProcessor, MockSession};
