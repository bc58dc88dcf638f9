mod filter;
mod tender;

pub use filter::{OnboardingState, SubscriberFilter, SubscriberId, ANY_REGION};
pub use tender::{parse_price, TenderRecord};
