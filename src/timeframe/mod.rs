// Multi-timeframe alignment module
pub mod aligner;
pub mod resample;

pub use aligner::{
    Bias, Horizon, TimeframeAligner, TimeframeAnalysis, TimeframeConfig, TimeframeSignal,
};
pub use resample::resample;
