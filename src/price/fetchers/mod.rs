mod coinmarketcap;
pub use coinmarketcap::CoinMarketCap;

mod constant;
pub use constant::ConstantRate;
