//! Front-end preference payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Preference name to serialized value, as the front-end stores them.
pub type Preferences = BTreeMap<String, String>;

/// One preference write from `setState:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
	pub name: String,
	pub value: String,
}

impl PreferenceUpdate {
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
		}
	}

	/// Merges this write into `prefs`, leaving every other key untouched.
	pub fn apply(&self, prefs: &mut Preferences) {
		prefs.insert(self.name.clone(), self.value.clone());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn apply_keeps_untouched_keys() {
		let mut prefs = Preferences::new();
		prefs.insert("uiTheme".into(), "dark".into());

		PreferenceUpdate::new("screencastEnabled", "true").apply(&mut prefs);

		assert_eq!(prefs.len(), 2);
		assert_eq!(prefs["uiTheme"], "dark");
		assert_eq!(prefs["screencastEnabled"], "true");
	}

	#[test]
	fn apply_overwrites_same_key() {
		let mut prefs = Preferences::new();
		prefs.insert("uiTheme".into(), "dark".into());

		PreferenceUpdate::new("uiTheme", "light").apply(&mut prefs);

		assert_eq!(prefs["uiTheme"], "light");
	}
}
