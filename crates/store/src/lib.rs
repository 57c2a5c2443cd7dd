pub mod candle;
pub mod ledger;
