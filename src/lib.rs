pub mod linear_algebra;
pub mod loss;
pub mod optimizer;

mod activation;
mod classifier;
mod engine;
mod error;
mod layout;
mod model;
mod standardize;
mod train;

pub use self::classifier::NeuralNetworkClassifier;
pub use self::error::NetworkError;
pub use self::layout::{HiddenLayers, WeightLayout};
pub use self::model::NeuralNetwork;
pub use self::standardize::Stats;
pub use self::train::{TrainOptions, TrainingResult};
