// Technical indicators module
// Pure functions over candle/price slices (most recent last)

pub mod adx;
pub mod atr;
pub mod moving_average;
pub mod rsi;

pub use adx::{calculate_adx, DirectionalIndex};
pub use atr::{calculate_atr, calculate_atr_series, calculate_normalized_atr};
pub use moving_average::{
    calculate_ema, calculate_roc, calculate_sma, calculate_std_dev,
};
pub use rsi::calculate_rsi;
