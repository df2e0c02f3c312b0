use std::{fmt, str::FromStr};

use anyhow::{Error, anyhow};

/// Database holding every proposal-tool collection.
pub const DEFAULT_DATABASE: &str = "proposal_tool";

/// A named extraction target: one schema and one source collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stream {
    AdvertiserData,
    BatchJob,
    Dashboard,
    GoogleMyBusinessData,
    ManageKeywordsAction,
    MarketingAttributesData,
    PotentialLead,
    TargetedEmailPriceSheet,
    UserProfile,
    SilktideData,
    Proposal,
}

impl Stream {
    pub const ALL: [Stream; 11] = [
        Stream::AdvertiserData,
        Stream::BatchJob,
        Stream::Dashboard,
        Stream::GoogleMyBusinessData,
        Stream::ManageKeywordsAction,
        Stream::MarketingAttributesData,
        Stream::PotentialLead,
        Stream::TargetedEmailPriceSheet,
        Stream::UserProfile,
        Stream::SilktideData,
        Stream::Proposal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stream::AdvertiserData => "advertiser_data",
            Stream::BatchJob => "batch_job",
            Stream::Dashboard => "dashboard",
            Stream::GoogleMyBusinessData => "google_my_business_data",
            Stream::ManageKeywordsAction => "manage_keywords_action",
            Stream::MarketingAttributesData => "marketing_attributes_data",
            Stream::PotentialLead => "potential_lead",
            Stream::TargetedEmailPriceSheet => "targeted_email_price_sheet",
            Stream::UserProfile => "user_profile",
            Stream::SilktideData => "silktide_data",
            Stream::Proposal => "proposal",
        }
    }

    /// Source collection scanned for this stream.
    pub fn collection(self) -> &'static str {
        match self {
            Stream::AdvertiserData => "AdvertiserData",
            Stream::BatchJob => "BatchJob",
            Stream::Dashboard => "Dashboard",
            Stream::GoogleMyBusinessData => "GoogleMyBusinessData",
            Stream::ManageKeywordsAction => "ManageKeywordsAction",
            Stream::MarketingAttributesData => "MarketingAttributesData",
            Stream::PotentialLead => "PotentialLead",
            Stream::TargetedEmailPriceSheet => "TargetedEmailPriceSheet",
            Stream::UserProfile => "UserProfile",
            Stream::SilktideData => "SilktideData",
            Stream::Proposal => "Proposal",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stream {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Stream::ALL
            .into_iter()
            .find(|stream| stream.as_str() == trimmed)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown stream '{trimmed}'. Expected one of: {}",
                    Stream::ALL.map(Stream::as_str).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_round_trip_through_from_str() {
        for stream in Stream::ALL {
            assert_eq!(stream.as_str().parse::<Stream>().unwrap(), stream);
        }
        assert!("proposals".parse::<Stream>().is_err());
    }

    #[test]
    fn every_stream_has_a_distinct_collection() {
        let collections = Stream::ALL
            .iter()
            .map(|stream| stream.collection())
            .collect::<HashSet<_>>();
        assert_eq!(collections.len(), 11);
        assert_eq!(Stream::AdvertiserData.collection(), "AdvertiserData");
    }
}
