use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// Navigation tabs the desktop shell knows how to render. Roles may carry identifiers outside this list; they are
/// stored and returned as-is, the shell just has nothing to show for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Tab {
    Manager,
    Reports,
    Backups,
    Tables,
    ImportUsers,
    Shtatni,
    Instructions,
    Admin,
    Reminders,
}

/// A duplicate free collection of tab identifiers.
///
/// Insertion order is kept so the shell can render navigation in the order the role author chose, but two values
/// compare equal whenever they hold the same identifiers.
#[derive(Debug, Clone, Default, Eq, Serialize)]
#[serde(transparent)]
pub struct AllowedTabs(Vec<String>);

impl AllowedTabs {
    pub fn new<I, S>(tabs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected: Vec<String> = vec![];

        for tab in tabs {
            let tab = tab.into();
            if !collected.contains(&tab) {
                collected.push(tab);
            }
        }

        Self(collected)
    }

    /// Decodes the storage representation. Never fails: anything other than a JSON array is treated as no tabs at
    /// all and array elements that aren't strings are skipped.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Self::new(items.into_iter().filter_map(|item| match item {
                Value::String(tab) => Some(tab),
                _ => None,
            })),
            _ => Self::default(),
        }
    }

    /// Encodes into the JSON array stored in the `allowed_tabs` column.
    pub fn encode(&self) -> String {
        Value::from(self.0.clone()).to_string()
    }

    pub fn contains(&self, tab: &str) -> bool {
        self.0.iter().any(|allowed| allowed == tab)
    }

    pub fn can_access(&self, tab: Tab) -> bool {
        self.contains(&tab.to_string())
    }

    /// The subset of identifiers that map to a [`Tab`], in stored order.
    pub fn known(&self) -> Vec<Tab> {
        self.0
            .iter()
            .filter_map(|tab| Tab::from_str(tab).ok())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl PartialEq for AllowedTabs {
    fn eq(&self, other: &Self) -> bool {
        // Both sides are duplicate free so equal length plus containment is set equality.
        self.len() == other.len() && self.iter().all(|tab| other.contains(tab))
    }
}

impl From<&[Tab]> for AllowedTabs {
    fn from(tabs: &[Tab]) -> Self {
        Self::new(tabs.iter().map(|tab| tab.to_string()))
    }
}

impl<const N: usize> From<[Tab; N]> for AllowedTabs {
    fn from(tabs: [Tab; N]) -> Self {
        Self::from(&tabs[..])
    }
}
