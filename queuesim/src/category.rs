//! The service paths a customer can take.

use queuesim_metrics::MetricKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Leaves without ordering; never queues.
    NoService,
    SelfDecision,
    AssistedPickup,
    FullMenu,
}

impl Category {
    /// Every category, in the order choice weights are given.
    pub const ALL: [Category; 4] = [
        Category::NoService,
        Category::SelfDecision,
        Category::AssistedPickup,
        Category::FullMenu,
    ];

    /// Categories that queue for a staffed station.
    pub const QUEUED: [Category; 3] = [Category::SelfDecision, Category::AssistedPickup, Category::FullMenu];

    pub fn is_queued(self) -> bool {
        self != Category::NoService
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::NoService => "no_service",
            Category::SelfDecision => "self_decision",
            Category::AssistedPickup => "assisted_pickup",
            Category::FullMenu => "full_menu",
        }
    }
}

impl MetricKey for Category {
    fn label(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_excludes_no_service() {
        assert!(!Category::QUEUED.contains(&Category::NoService));
        assert!(Category::QUEUED.iter().all(|c| c.is_queued()));
        assert_eq!(
            Category::ALL.iter().filter(|c| c.is_queued()).count(),
            Category::QUEUED.len()
        );
    }

    #[test]
    fn test_labels_match_serde_names() {
        for category in Category::ALL {
            let name = toml_name(category);
            assert_eq!(name, category.label());
        }
    }

    fn toml_name(category: Category) -> String {
        #[derive(Serialize)]
        struct Wrapper {
            category: Category,
        }
        let rendered = toml::to_string(&Wrapper { category }).unwrap();
        rendered
            .trim()
            .trim_start_matches("category = ")
            .trim_matches('"')
            .to_string()
    }
}
