mod helpers;
mod money;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{Money, MoneyParseError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
