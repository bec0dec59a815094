pub mod challenge;
pub mod contact;
pub mod message;
pub mod profile;
pub mod prospect;
pub mod quota;
pub mod usage;

pub use challenge::Challenge;
pub use contact::MatchSelection;
pub use message::{GeneratedMessage, MessageDetail};
pub use profile::CandidateProfile;
pub use prospect::Prospect;
pub use quota::DailyQuota;
pub use usage::FeatureUsage;
